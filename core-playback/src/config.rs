//! Engine configuration.

use std::time::Duration;

/// Configuration for the playback engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a load may sit in `Loading` before the watchdog stops it.
    pub load_timeout: Duration,
    /// Delay between a finish notification and the automatic stop, so the
    /// final playhead frame is observable by listeners.
    pub finish_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(30),
            finish_grace: Duration::from_millis(250),
        }
    }
}

impl EngineConfig {
    /// Set the load watchdog timeout.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Set the end-of-stream grace delay.
    pub fn with_finish_grace(mut self, grace: Duration) -> Self {
        self.finish_grace = grace;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.load_timeout.is_zero() {
            return Err("load_timeout must be greater than zero".to_string());
        }

        if self.finish_grace > self.load_timeout {
            return Err("finish_grace must not exceed load_timeout".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = EngineConfig::default().with_load_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_grace_is_rejected() {
        let config = EngineConfig::default()
            .with_load_timeout(Duration::from_millis(100))
            .with_finish_grace(Duration::from_secs(1));
        assert!(config.validate().is_err());
    }
}
