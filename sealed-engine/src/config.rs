//! Engine configuration.
//!
//! ```json
//! { "host": "0x5ea1ed0000000000000000000000000000000000",
//!   "max_reveal_handles": 16,
//!   "reveal_timeout": 100 }
//! ```
//!
//! Only `host` is mandatory.

use crate::value::Party;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_MAX_REVEAL_HANDLES: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the host identity cannot be the zero address")]
    UnsetHost,
    #[error("a reveal must be allowed at least one handle")]
    ZeroRevealHandles,
    #[error("a reveal timeout of zero would expire every request immediately")]
    ZeroTimeout,
    #[error("a committee needs at least one member")]
    NoMembers,
    #[error("a threshold of zero accepts any proof")]
    ZeroThreshold,
    #[error("threshold {threshold} exceeds the {members} committee members")]
    ThresholdAboveMembers { threshold: usize, members: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// identity the engine grants itself under
    pub host: Party,
    /// largest number of handles in one reveal request
    #[serde(default = "default_max_reveal_handles")]
    pub max_reveal_handles: usize,
    /// how long, in host time units, a reveal stays pending; forever if unset
    #[serde(default)]
    pub reveal_timeout: Option<u64>,
}

fn default_max_reveal_handles() -> usize {
    DEFAULT_MAX_REVEAL_HANDLES
}

impl EngineConfig {
    pub fn new(host: Party) -> Self {
        EngineConfig {
            host,
            max_reveal_handles: DEFAULT_MAX_REVEAL_HANDLES,
            reveal_timeout: None,
        }
    }

    pub fn with_max_reveal_handles(mut self, max: usize) -> Self {
        self.max_reveal_handles = max;
        self
    }

    pub fn with_reveal_timeout(mut self, timeout: u64) -> Self {
        self.reveal_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_zero() {
            return Err(ConfigError::UnsetHost);
        }
        if self.max_reveal_handles == 0 {
            return Err(ConfigError::ZeroRevealHandles);
        }
        if self.reveal_timeout == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// deadline of a reveal requested at `now`
    pub(crate) fn deadline(&self, now: u64) -> Option<u64> {
        self.reveal_timeout.map(|timeout| now.saturating_add(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "0x5ea1ed0000000000000000000000000000000000";

    #[test]
    fn defaults_fill_missing_fields() {
        let config: EngineConfig =
            serde_json::from_str(&format!(r#"{{ "host": "{}" }}"#, HOST)).expect("valid config");
        assert_eq!(config.max_reveal_handles, DEFAULT_MAX_REVEAL_HANDLES);
        assert_eq!(config.reveal_timeout, None);
        assert_eq!(config.host.to_string(), HOST);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn full_config() {
        let config: EngineConfig = serde_json::from_str(&format!(
            r#"{{ "host": "{}", "max_reveal_handles": 4, "reveal_timeout": 100 }}"#,
            HOST
        ))
        .expect("valid config");
        let host: Party = HOST.parse().expect("valid host");
        assert_eq!(
            config,
            EngineConfig::new(host)
                .with_max_reveal_handles(4)
                .with_reveal_timeout(100)
        );
        assert_eq!(config.deadline(10), Some(110));
        assert_eq!(config.deadline(u64::MAX), Some(u64::MAX));
    }

    #[test]
    fn malformed_host_and_unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<EngineConfig>(r#"{ "host": "0x12" }"#).is_err());
        assert!(serde_json::from_str::<EngineConfig>(&format!(
            r#"{{ "host": "{}", "verbose": true }}"#,
            HOST
        ))
        .is_err());
    }

    #[test]
    fn validation() {
        let host: Party = HOST.parse().expect("valid host");
        assert_eq!(
            EngineConfig::new(Party::new([0; 20])).validate(),
            Err(ConfigError::UnsetHost)
        );
        assert_eq!(
            EngineConfig::new(host).with_max_reveal_handles(0).validate(),
            Err(ConfigError::ZeroRevealHandles)
        );
        assert_eq!(
            EngineConfig::new(host).with_reveal_timeout(0).validate(),
            Err(ConfigError::ZeroTimeout)
        );
    }
}
