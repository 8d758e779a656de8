//! Rate governor: windowed counters turned into per-second rates.

use std::time::Duration;

use serde::Serialize;

/// Default reporting window.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(3);

/// Raw event counts for the current window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateCounters {
    /// Paint requests issued (cold fill, correction and defense).
    pub attempted: u64,
    /// Corrective paints issued by the real-time defense path.
    pub defended: u64,
    /// Submission acks received.
    pub acked: u64,
    /// Acks reporting a successfully colored pixel.
    pub colored: u64,
}

impl RateCounters {
    /// Convert to per-second rates over `window` and reset.
    pub fn drain(&mut self, window: Duration, buffer_bytes: usize) -> RateReport {
        let secs = window.as_secs_f64().max(f64::EPSILON);
        let report = RateReport {
            paint_rate: self.attempted as f64 / secs,
            defend_rate: self.defended as f64 / secs,
            ack_rate: self.acked as f64 / secs,
            colored_rate: self.colored as f64 / secs,
            buffer_bytes,
        };
        *self = Self::default();
        report
    }
}

/// One reporting-window summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateReport {
    pub paint_rate: f64,
    pub defend_rate: f64,
    pub ack_rate: f64,
    pub colored_rate: f64,
    pub buffer_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_computes_rates_and_resets() {
        let mut c = RateCounters {
            attempted: 30,
            defended: 6,
            acked: 27,
            colored: 3,
        };
        let r = c.drain(Duration::from_secs(3), 128);
        assert_eq!(r.paint_rate, 10.0);
        assert_eq!(r.defend_rate, 2.0);
        assert_eq!(r.ack_rate, 9.0);
        assert_eq!(r.colored_rate, 1.0);
        assert_eq!(r.buffer_bytes, 128);
        assert_eq!(c, RateCounters::default());
    }

    #[test]
    fn report_serializes_camel_case() {
        let r = RateCounters::default().drain(Duration::from_secs(3), 0);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("paintRate"));
        assert!(json.contains("bufferBytes"));
    }
}
