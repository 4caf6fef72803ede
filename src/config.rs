use std::time::Duration;

use crate::error::{TrackerError, TrackerResult};

/// Measurements per session before sampling stops on its own.
pub const DEFAULT_MEASUREMENT_CAP: u32 = 100;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    // ── Scheduling ──
    /// Period of the timer that re-arms sensor subscriptions.
    pub rearm_interval: Duration,
    pub measurement_cap: u32,

    // ── Queues ──
    /// Samples buffered between the sensors and the fusion state.
    pub sample_queue_depth: usize,
    /// Frames buffered between the fusion state and the inference worker.
    pub frame_queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rearm_interval: Duration::from_secs(1),
            measurement_cap: DEFAULT_MEASUREMENT_CAP,
            sample_queue_depth: 256,
            frame_queue_depth: 16,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> TrackerResult<()> {
        if self.rearm_interval.is_zero() {
            return Err(TrackerError::InvalidParameters(
                "rearm interval must be positive".to_string(),
            ));
        }
        if self.measurement_cap == 0 {
            return Err(TrackerError::InvalidParameters(
                "measurement cap must be at least 1".to_string(),
            ));
        }
        if self.sample_queue_depth == 0 || self.frame_queue_depth == 0 {
            return Err(TrackerError::InvalidParameters(
                "queue depths must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
