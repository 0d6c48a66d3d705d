//! Configuration for the editor bridge.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Quiet period after the last edit before a block is submitted.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_secs(3);

/// Bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Trailing-edge debounce delay.
    pub quiescence: Duration,
}

impl BridgeConfig {
    /// Set the debounce delay.
    pub fn with_quiescence(mut self, quiescence: Duration) -> Self {
        self.quiescence = quiescence;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            quiescence: DEFAULT_QUIESCENCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quiescence() {
        assert_eq!(BridgeConfig::default().quiescence, Duration::from_secs(3));
        let config = BridgeConfig::default().with_quiescence(Duration::from_millis(500));
        assert_eq!(config.quiescence, Duration::from_millis(500));
    }
}
