//! Observer channels: the free-text event log and structured reports.
//!
//! Both are `tokio::sync::broadcast` channels. Publishing with nobody
//! subscribed is not an error.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::governor::RateReport;

const CHANNEL_CAPACITY: usize = 256;

// ── Report ───────────────────────────────────────────────────────

/// Which part of a run is draining its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "round")]
pub enum RunPhase {
    ColdFill,
    Correction(u64),
}

/// A structured message on the reporting channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Report {
    /// Per-window rates and buffer depth.
    Rates(RateReport),
    /// Queue progress of the active run.
    Progress {
        phase: RunPhase,
        total: usize,
        position: usize,
    },
}

/// Create the reporting channel.
pub fn report_channel() -> broadcast::Sender<Report> {
    broadcast::channel(CHANNEL_CAPACITY).0
}

// ── EventLog ─────────────────────────────────────────────────────

/// One diagnostic per event, mirrored to `tracing` and to subscribers.
#[derive(Debug, Clone)]
pub struct EventLog {
    tx: broadcast::Sender<String>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        let _ = self.tx.send(message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        let _ = self.tx.send(message);
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_without_subscribers_is_fine() {
        let log = EventLog::new();
        log.info("nobody listening");
    }

    #[tokio::test]
    async fn subscribers_receive_messages() {
        let log = EventLog::new();
        let mut rx = log.subscribe();
        log.warn("socket closed");
        assert_eq!(rx.recv().await.unwrap(), "socket closed");
    }

    #[test]
    fn progress_serializes_tagged() {
        let report = Report::Progress {
            phase: RunPhase::Correction(3),
            total: 10,
            position: 4,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["phase"]["kind"], "correction");
        assert_eq!(json["phase"]["round"], 3);
        assert_eq!(json["total"], 10);
    }
}
