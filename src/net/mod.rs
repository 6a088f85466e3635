pub mod codec;
pub mod connection;
pub mod constants;
pub mod framing;
pub mod packets;
pub mod session;
pub mod stats;

pub use connection::{ConnectionManager, FrameOutcome};
pub use packets::{Packet, PacketRegistry};
pub use session::{ConnectionState, ViewerSession};
