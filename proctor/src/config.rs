use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for per-execution log streaming channels.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogStreamConfig {
    /// Broadcast buffer size per execution. Subscribers that fall more
    /// than this many chunks behind observe a gap instead of blocking
    /// the publisher.
    pub channel_capacity: usize,
    /// Seconds of silence (no chunk, no completion) after which an
    /// attached subscription detaches itself.
    pub idle_timeout_secs: u64,
}

impl LogStreamConfig {
    /// Set the per-execution broadcast buffer size.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the subscriber idle timeout.
    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for LogStreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            // 30 minutes, matching the streaming timeout clients expect.
            idle_timeout_secs: 30 * 60,
        }
    }
}
