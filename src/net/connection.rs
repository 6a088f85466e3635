//! Connection loop: connect, read frames, dispatch onto the shared world
//!
//! The world lock is only ever taken around decode+apply, never while
//! waiting on the socket. When the presentation side holds the lock the
//! frame is dropped so the read loop never stalls.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::config::ViewerConfig;
use crate::net::constants::CONNECT_TIMEOUT;
use crate::net::framing::{self, FrameHeader, FramingError};
use crate::net::packets::{packet_name, DispatchError, PacketRegistry};
use crate::net::session::{ConnectionState, ViewerSession};
use crate::net::stats::ConnectionStats;

/// What happened to one frame. Every variant keeps the connection open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Applied(&'static str),
    /// The world lock was busy, payload discarded undecoded
    Dropped,
    Unknown,
    /// Decoded badly or arrived before Init
    Rejected,
    /// Larger than the configured limit, skipped unread
    Oversize,
}

/// Capped exponential delay between automatic reconnect attempts
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; doubles the next one up to the cap
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        self.current = self.current.checked_mul(2).unwrap_or(self.max).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub struct ConnectionManager {
    config: ViewerConfig,
    session: Arc<ViewerSession>,
    registry: PacketRegistry,
}

impl ConnectionManager {
    pub fn new(config: ViewerConfig, session: Arc<ViewerSession>) -> Self {
        let registry = PacketRegistry::new();
        info!("Registered {} packet kinds", registry.len());
        Self {
            config,
            session,
            registry,
        }
    }

    pub fn session(&self) -> &Arc<ViewerSession> {
        &self.session
    }

    /// Drive the state machine forever
    pub async fn run(&self) {
        let mut backoff = Backoff::new(
            self.config.reconnect_backoff_initial,
            self.config.reconnect_backoff_max,
        );

        loop {
            if self.session.state() != ConnectionState::Reconnecting {
                tokio::time::sleep(self.config.idle_poll_interval).await;
                continue;
            }

            let addr = self.config.server_addr();
            info!("Connecting to {}", addr);

            let error = match self.connect(&addr).await {
                Ok(mut stream) => {
                    backoff.reset();
                    self.on_connected(&addr).await;
                    self.serve(&mut stream).await
                }
                Err(e) => e,
            };
            self.on_lost(&error);

            if self.config.auto_reconnect {
                let delay = backoff.next_delay();
                info!("Retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                self.session.request_reconnect();
            }
        }
    }

    async fn connect(&self, addr: &str) -> Result<TcpStream, FramingError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")
            })??;
        // packets are small and frequent
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn on_connected(&self, addr: &str) {
        ConnectionStats::incr(&self.session.stats().connections_opened);
        // the presenter may be mid-capture, wait for it on the blocking pool
        let session = self.session.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || session.reset_world()).await {
            warn!("World reset task failed: {}", e);
            self.session.reset_world();
        }
        self.session.set_last_error(None);
        self.session.set_state(ConnectionState::Connected);
        info!("Connected to {}", addr);
    }

    fn on_lost(&self, error: &FramingError) {
        match error {
            FramingError::ConnectionClosed => info!("Server closed the connection"),
            other => error!("Connection error: {}", other),
        }
        self.session.set_last_error(Some(error.to_string()));
        self.session.set_state(ConnectionState::LostConnection);
        info!(stats = %self.session.stats().snapshot().to_json(), "Session ended");
    }

    /// Process frames until the stream fails. Returns the error that ended it.
    pub async fn serve<R: AsyncRead + Unpin>(&self, stream: &mut R) -> FramingError {
        loop {
            if let Err(e) = self.process_frame(stream).await {
                return e;
            }
        }
    }

    /// Read and handle exactly one frame
    pub async fn process_frame<R: AsyncRead + Unpin>(
        &self,
        stream: &mut R,
    ) -> Result<FrameOutcome, FramingError> {
        let header = framing::read_header(stream).await?;
        let stats = self.session.stats();
        stats.record_frame(header.payload_len);

        if header.payload_len > self.config.max_payload_size {
            warn!(
                packet = packet_name(header.packet_id),
                id = header.packet_id,
                len = header.payload_len,
                "Payload exceeds limit, skipping"
            );
            framing::skip_payload(stream, header.payload_len).await?;
            ConnectionStats::incr(&stats.payloads_oversize);
            return Ok(FrameOutcome::Oversize);
        }

        if !self.registry.is_registered(header.packet_id) {
            warn!(
                id = header.packet_id,
                len = header.payload_len,
                "Unrecognized packet, skipping"
            );
            framing::skip_payload(stream, header.payload_len).await?;
            ConnectionStats::incr(&stats.packets_unknown);
            return Ok(FrameOutcome::Unknown);
        }

        let payload = framing::read_payload(stream, header.payload_len).await?;
        Ok(self.apply(header, &payload))
    }

    fn apply(&self, header: FrameHeader, payload: &[u8]) -> FrameOutcome {
        let stats = self.session.stats();

        let result = {
            let Some(mut world) = self.session.try_world() else {
                debug!(
                    packet = packet_name(header.packet_id),
                    len = header.payload_len,
                    "World busy, dropping packet"
                );
                ConnectionStats::incr(&stats.packets_dropped_contended);
                return FrameOutcome::Dropped;
            };
            self.registry.dispatch(header.packet_id, payload, &mut world)
        };

        match result {
            Ok(name) => {
                debug!(packet = name, len = header.payload_len, "Applied packet");
                ConnectionStats::incr(&stats.packets_applied);
                self.session.notify_refresh();
                FrameOutcome::Applied(name)
            }
            Err(DispatchError::UnknownPacket(id)) => {
                warn!(id, len = header.payload_len, "Unrecognized packet");
                ConnectionStats::incr(&stats.packets_unknown);
                FrameOutcome::Unknown
            }
            Err(e) => {
                warn!(len = header.payload_len, "{}", e);
                ConnectionStats::incr(&stats.decode_failures);
                FrameOutcome::Rejected
            }
        }
    }
}
