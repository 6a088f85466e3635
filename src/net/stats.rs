//! Connection counters shared between the network loop and the viewer

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for the lifetime of the process
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connections_opened: AtomicU64,
    pub frames_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub packets_applied: AtomicU64,
    /// Payloads discarded because the renderer held the world lock
    pub packets_dropped_contended: AtomicU64,
    pub packets_unknown: AtomicU64,
    pub decode_failures: AtomicU64,
    pub payloads_oversize: AtomicU64,
}

/// Point-in-time copy of [`ConnectionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub connections_opened: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub packets_applied: u64,
    pub packets_dropped_contended: u64,
    pub packets_unknown: u64,
    pub decode_failures: u64,
    pub payloads_oversize: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one frame header plus its payload bytes
    pub fn record_frame(&self, payload_len: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_applied: self.packets_applied.load(Ordering::Relaxed),
            packets_dropped_contended: self.packets_dropped_contended.load(Ordering::Relaxed),
            packets_unknown: self.packets_unknown.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            payloads_oversize: self.payloads_oversize.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Single-line JSON for logs and the stats command
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_frame() {
        let stats = ConnectionStats::new();
        stats.record_frame(100);
        stats.record_frame(37);
        ConnectionStats::incr(&stats.packets_applied);

        let snap = stats.snapshot();
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.bytes_received, 137);
        assert_eq!(snap.packets_applied, 1);
        assert_eq!(snap.packets_unknown, 0);
    }

    #[test]
    fn test_to_json() {
        let snap = StatsSnapshot {
            packets_unknown: 3,
            ..Default::default()
        };
        let json: serde_json::Value = serde_json::from_str(&snap.to_json()).unwrap();
        assert_eq!(json["packets_unknown"], 3);
        assert_eq!(json["frames_received"], 0);
    }
}
