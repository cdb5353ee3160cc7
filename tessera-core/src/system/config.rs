//! System configuration with sensible defaults.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Default number of messages an actor may drain per scheduler resume.
pub const DEFAULT_MAX_THROUGHPUT: usize = 300;

/// Default instance label.
pub const DEFAULT_LABEL: &str = "tessera";

/// System-wide configuration for the actor substrate.
///
/// # Examples
///
/// ```rust
/// use tessera_core::system::SystemConfig;
///
/// // Use default configuration
/// let config = SystemConfig::default();
/// assert_eq!(config.max_throughput, 300);
///
/// // Use builder for custom configuration
/// let config = SystemConfig::builder()
///     .with_max_throughput(64)
///     .with_label("worker-node")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_throughput, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Human-readable instance label, surfaced in logs.
    pub label: String,

    /// Messages an actor may drain per scheduler resume before yielding;
    /// 0 means unlimited.
    pub max_throughput: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            max_throughput: DEFAULT_MAX_THROUGHPUT,
        }
    }
}

impl SystemConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.label.is_empty() {
            return Err("label must not be empty".to_string());
        }
        Ok(())
    }
}

/// Builder for [`SystemConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct SystemConfigBuilder {
    label: Option<String>,
    max_throughput: Option<usize>,
}

impl SystemConfigBuilder {
    /// Set the instance label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the per-resume message budget.
    pub fn with_max_throughput(mut self, max_throughput: usize) -> Self {
        self.max_throughput = Some(max_throughput);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<SystemConfig, String> {
        let defaults = SystemConfig::default();
        let config = SystemConfig {
            label: self.label.unwrap_or(defaults.label),
            max_throughput: self.max_throughput.unwrap_or(defaults.max_throughput),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SystemConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.label, DEFAULT_LABEL);
        assert_eq!(config.max_throughput, DEFAULT_MAX_THROUGHPUT);
    }

    #[test]
    fn test_builder_overrides() {
        let config = SystemConfig::builder()
            .with_label("edge")
            .with_max_throughput(0)
            .build()
            .unwrap();
        assert_eq!(config.label, "edge");
        assert_eq!(config.max_throughput, 0);
    }

    #[test]
    fn test_empty_label_is_rejected() {
        let result = SystemConfig::builder().with_label("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = SystemConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.label, config.label);
        assert_eq!(back.max_throughput, config.max_throughput);
    }
}
