//! Shared viewer session: connection state, the live world and its lock
//!
//! One `ViewerSession` is created at startup and shared (via `Arc`) by the
//! connection loop, which is the only writer of the world, and the
//! presentation loop, which only reads it.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use crate::net::stats::ConnectionStats;
use crate::world::WorldSnapshot;

/// Connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected, idle until a reconnect is requested
    NotConnected,
    /// A connect attempt is due or in progress
    Reconnecting,
    /// Reading frames
    Connected,
    /// The last session failed, idle until a reconnect is requested
    LostConnection,
}

impl ConnectionState {
    /// States from which a user may request a reconnect
    pub fn can_reconnect(self) -> bool {
        matches!(
            self,
            ConnectionState::NotConnected | ConnectionState::LostConnection
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::NotConnected => "NotConnected",
            ConnectionState::Reconnecting => "Reconnecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::LostConnection => "LostConnection",
        };
        f.write_str(name)
    }
}

pub struct ViewerSession {
    state: RwLock<ConnectionState>,
    world: Mutex<Option<WorldSnapshot>>,
    last_error: Mutex<Option<String>>,
    stats: ConnectionStats,
    refresh_tx: Sender<()>,
    refresh_rx: Receiver<()>,
}

impl ViewerSession {
    pub fn new(initial: ConnectionState) -> Self {
        let (refresh_tx, refresh_rx) = crossbeam_channel::bounded(1);
        Self {
            state: RwLock::new(initial),
            world: Mutex::new(None),
            last_error: Mutex::new(None),
            stats: ConnectionStats::new(),
            refresh_tx,
            refresh_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
            self.notify_refresh();
        }
    }

    /// Move to `Reconnecting` if the connection is idle. Returns whether the
    /// request was accepted.
    pub fn request_reconnect(&self) -> bool {
        {
            let mut state = self.state.write();
            if !state.can_reconnect() {
                return false;
            }
            *state = ConnectionState::Reconnecting;
        }
        info!("Reconnect requested");
        self.notify_refresh();
        true
    }

    /// Writer side: take the world lock only if it is free
    pub fn try_world(&self) -> Option<MutexGuard<'_, Option<WorldSnapshot>>> {
        self.world.try_lock()
    }

    /// Reader side: wait at most `timeout` for the world lock
    pub fn lock_world_for(
        &self,
        timeout: Duration,
    ) -> Option<MutexGuard<'_, Option<WorldSnapshot>>> {
        self.world.try_lock_for(timeout)
    }

    /// Drop the current world so a new connection never shows stale data
    pub fn reset_world(&self) {
        *self.world.lock() = None;
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock() = error;
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Wake the presentation loop. A pending signal is enough, so a full
    /// channel is not an error.
    pub fn notify_refresh(&self) {
        match self.refresh_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                debug!("Refresh channel disconnected");
            }
        }
    }

    /// Receiving end of the refresh signal
    pub fn refresh_receiver(&self) -> Receiver<()> {
        self.refresh_rx.clone()
    }
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new(ConnectionState::NotConnected)
    }
}
