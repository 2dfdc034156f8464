//! `[watch]` section configuration.
//!
//! ```toml
//! [watch]
//! debounce_ms = 300
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// File watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period before a batch of changes triggers a rebuild.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl WatchConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use std::time::Duration;

    #[test]
    fn test_watch_config() {
        assert_eq!(test_parse_config("").watch.debounce(), Duration::from_millis(300));
        let config = test_parse_config("[watch]\ndebounce_ms = 50");
        assert_eq!(config.watch.debounce(), Duration::from_millis(50));
    }
}
