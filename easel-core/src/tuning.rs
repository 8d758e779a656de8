//! Operator-tunable knobs, adjustable while a run is active.

use serde::{Deserialize, Serialize};

use crate::error::PaintError;

/// Default similarity threshold (Euclidean RGB distance).
pub const DEFAULT_THRESHOLD: f64 = 5.0;
/// Default pacing divisor: pause once every this many queued paints.
pub const DEFAULT_PACING_DIVISOR: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunables {
    /// Credentials in the round-robin window. `0` means "whole pool".
    pub active_count: usize,
    /// Colors within this distance of the target count as correct.
    pub threshold: f64,
    /// Paints between pacing pauses.
    pub pacing_divisor: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            active_count: 0,
            threshold: DEFAULT_THRESHOLD,
            pacing_divisor: DEFAULT_PACING_DIVISOR,
        }
    }
}

/// Validate a similarity threshold.
pub fn check_threshold(threshold: f64) -> Result<f64, PaintError> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(PaintError::InvalidTunable {
            name: "threshold",
            value: threshold.to_string(),
        });
    }
    Ok(threshold)
}

/// Validate a pacing divisor.
pub fn check_pacing_divisor(divisor: u32) -> Result<u32, PaintError> {
    if divisor == 0 {
        return Err(PaintError::InvalidTunable {
            name: "pacing_divisor",
            value: divisor.to_string(),
        });
    }
    Ok(divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert!(check_threshold(0.0).is_ok());
        assert!(check_threshold(-0.1).is_err());
        assert!(check_threshold(f64::NAN).is_err());
        assert!(check_pacing_divisor(1).is_ok());
        assert!(check_pacing_divisor(0).is_err());
    }
}
