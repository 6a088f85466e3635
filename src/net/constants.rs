//! Wire protocol constants shared by the viewer and the mock server

/// Packet identifiers. 0-6 are reserved by the debug server.
pub mod packet_id {
    pub const INIT: i16 = 0;

    // one time packets sent on login
    pub const BIOMES: i16 = 1;
    pub const ZONES: i16 = 2;
    pub const HEAT: i16 = 3;

    // continuous packets
    pub const PLAYERS: i16 = 4;
    pub const CLUSTERS: i16 = 5;
    pub const EVENT: i16 = 6;
}

/// Frame header: i16 packet id + i32 payload length
pub const FRAME_HEADER_SIZE: usize = 2 + 4;

/// Default debug server address
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9000;

/// Payloads above this are skipped instead of buffered
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Upper bound on terrain image pixels (width * height)
pub const MAX_TERRAIN_PIXELS: usize = 64 * 1024 * 1024;

/// Give up on a connect attempt after this long
pub const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
