//! Output path configuration.
//!
//! ```
//! use xwire_client::OutputConfig;
//!
//! let config: OutputConfig = serde_json::from_str(r#"{ "queue_capacity": 4096 }"#).unwrap();
//! assert_eq!(config.queue_capacity, 4096);
//! assert_eq!(config.wrap_threshold, 65530);
//! config.validate().unwrap();
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, XwireError};
use crate::sequence::DEFAULT_WRAP_THRESHOLD;

/// Default output queue capacity in bytes.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16384;

/// Default cap on iovecs handed to one vectored write (`IOV_MAX` on Linux).
pub const DEFAULT_MAX_IOVECS: usize = 1024;

/// Smallest accepted queue capacity.
pub const MIN_QUEUE_CAPACITY: usize = 32;

/// Configuration for the request output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Size of the coalescing buffer in bytes.
    pub queue_capacity: usize,
    /// Issued-minus-read distance that forces a sync before a reply-less request.
    pub wrap_threshold: u32,
    /// Maximum fragments per vectored write call.
    pub max_iovecs: usize,
}

impl OutputConfig {
    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| XwireError::Config(format!("invalid output config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity < MIN_QUEUE_CAPACITY {
            return Err(XwireError::Config(format!(
                "queue_capacity {} is below minimum {}",
                self.queue_capacity, MIN_QUEUE_CAPACITY
            )));
        }
        if self.wrap_threshold == 0 {
            return Err(XwireError::Config(
                "wrap_threshold must be positive".to_string(),
            ));
        }
        if self.max_iovecs == 0 {
            return Err(XwireError::Config(
                "max_iovecs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            wrap_threshold: DEFAULT_WRAP_THRESHOLD,
            max_iovecs: DEFAULT_MAX_IOVECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OutputConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.wrap_threshold, 65530);
        assert_eq!(config.max_iovecs, DEFAULT_MAX_IOVECS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json_partial() {
        let config: OutputConfig = serde_json::from_str(r#"{"max_iovecs": 16}"#).unwrap();
        assert_eq!(config.max_iovecs, 16);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_from_json_validates() {
        let config = OutputConfig::from_json(r#"{"wrap_threshold": 1000}"#).unwrap();
        assert_eq!(config.wrap_threshold, 1000);

        let err = OutputConfig::from_json(r#"{"queue_capacity": 1}"#).unwrap_err();
        assert!(matches!(err, XwireError::Config(_)));

        let err = OutputConfig::from_json("not json").unwrap_err();
        assert!(err.to_string().contains("invalid output config"));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = OutputConfig {
            queue_capacity: 64,
            wrap_threshold: 100,
            max_iovecs: 4,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: OutputConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validate_rejects_tiny_queue() {
        let config = OutputConfig {
            queue_capacity: 8,
            ..OutputConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = OutputConfig {
            wrap_threshold: 0,
            ..OutputConfig::default()
        };
        assert!(matches!(config.validate(), Err(XwireError::Config(_))));

        let config = OutputConfig {
            max_iovecs: 0,
            ..OutputConfig::default()
        };
        assert!(matches!(config.validate(), Err(XwireError::Config(_))));
    }
}
