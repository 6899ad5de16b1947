use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Base URL of the config API.
    pub api_base: String,
    /// Status poll period. The daemon state rarely changes faster than this.
    pub poll_interval_secs: u64,
    /// Wait after a service restart before trusting freshly polled status.
    pub settle_delay_ms: u64,
    /// Per-request timeout on every gateway call.
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            api_base: "http://localhost:8001".to_string(),
            poll_interval_secs: 1,
            settle_delay_ms: 2000,
            request_timeout_secs: 5,
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
