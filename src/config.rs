use std::str::FromStr;
use std::time::Duration;

use crate::net::constants::{DEFAULT_HOST, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_PORT};
use crate::util::vec::Vector2i;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Port cannot be 0")]
    ZeroPort,
    #[error("Host cannot be empty")]
    EmptyHost,
    #[error("Viewport must be positive, got {0}")]
    InvalidViewport(Vector2i),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("Backoff initial delay {initial:?} exceeds maximum {max:?}")]
    BackoffRange { initial: Duration, max: Duration },
    #[error("{0} must be at least 1")]
    TooSmall(&'static str),
}

/// Viewer configuration
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Debug server host
    pub host: String,
    /// Debug server port
    pub port: u16,
    /// Size of the drawing surface in pixels
    pub viewport: Vector2i,
    /// How often the idle connection loop checks for a reconnect request
    pub idle_poll_interval: Duration,
    /// Upper bound between two presentation refreshes
    pub render_interval: Duration,
    /// Retry failed connections with capped exponential backoff
    pub auto_reconnect: bool,
    pub reconnect_backoff_initial: Duration,
    pub reconnect_backoff_max: Duration,
    /// Larger payloads are skipped instead of buffered
    pub max_payload_size: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            viewport: Vector2i::splat(1000),
            idle_poll_interval: Duration::from_millis(1000),
            render_interval: Duration::from_millis(500),
            auto_reconnect: false,
            reconnect_backoff_initial: Duration::from_millis(500),
            reconnect_backoff_max: Duration::from_secs(30),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl ViewerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparsable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("VIEWER_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "VIEWER_PORT") {
            config.port = port;
        }
        if let Some(width) = parse_var(&lookup, "VIEWER_WIDTH") {
            config.viewport.x = width;
        }
        if let Some(height) = parse_var(&lookup, "VIEWER_HEIGHT") {
            config.viewport.y = height;
        }
        if let Some(ms) = parse_var(&lookup, "VIEWER_IDLE_POLL_MS") {
            config.idle_poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "VIEWER_RENDER_MS") {
            config.render_interval = Duration::from_millis(ms);
        }
        if let Some(enabled) = parse_var(&lookup, "VIEWER_AUTO_RECONNECT") {
            config.auto_reconnect = enabled;
        }
        if let Some(ms) = parse_var(&lookup, "VIEWER_BACKOFF_INITIAL_MS") {
            config.reconnect_backoff_initial = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "VIEWER_BACKOFF_MAX_MS") {
            config.reconnect_backoff_max = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var(&lookup, "VIEWER_MAX_PAYLOAD") {
            config.max_payload_size = max;
        }

        config
    }

    /// `host:port` for `TcpStream::connect`
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if !self.viewport.is_positive() {
            return Err(ConfigError::InvalidViewport(self.viewport));
        }
        if self.idle_poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("idle_poll_interval"));
        }
        if self.render_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("render_interval"));
        }
        if self.auto_reconnect {
            if self.reconnect_backoff_initial.is_zero() {
                return Err(ConfigError::ZeroDuration("reconnect_backoff_initial"));
            }
            if self.reconnect_backoff_initial > self.reconnect_backoff_max {
                return Err(ConfigError::BackoffRange {
                    initial: self.reconnect_backoff_initial,
                    max: self.reconnect_backoff_max,
                });
            }
        }
        if self.max_payload_size == 0 {
            return Err(ConfigError::TooSmall("max_payload_size"));
        }
        Ok(())
    }
}

/// Mock debug server configuration
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    pub port: u16,
    /// World edge length in blocks
    pub world_size: i32,
    pub view_distance: i32,
    pub tick_interval: Duration,
    pub players: usize,
    pub clusters: usize,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            world_size: 6144,
            view_distance: 12,
            tick_interval: Duration::from_millis(250),
            players: 4,
            clusters: 24,
        }
    }
}

impl MockServerConfig {
    pub fn load_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parse_var(&lookup, "MOCK_PORT") {
            config.port = port;
        }
        if let Some(size) = parse_var(&lookup, "MOCK_WORLD_SIZE") {
            config.world_size = size;
        }
        if let Some(distance) = parse_var(&lookup, "MOCK_VIEW_DISTANCE") {
            config.view_distance = distance;
        }
        if let Some(ms) = parse_var(&lookup, "MOCK_TICK_MS") {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(players) = parse_var(&lookup, "MOCK_PLAYERS") {
            config.players = players;
        }
        if let Some(clusters) = parse_var(&lookup, "MOCK_CLUSTERS") {
            config.clusters = clusters;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.world_size < 1 {
            return Err(ConfigError::TooSmall("world_size"));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("tick_interval"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}
