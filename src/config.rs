//! Broker configuration with sensible defaults (§6 EXTERNAL INTERFACES
//! "Configuration").

// Layer 1: Standard library
use std::time::Duration;

// Layer 2: Third-party
use serde::{Deserialize, Serialize};

// Layer 3: Internal
// (none)

/// Default maximum number of concurrently connected Services.
pub const DEFAULT_MAX_SERVICES: usize = 64;

/// Default maximum vendor parameter groups (always equal to max Services, §6).
pub const DEFAULT_MAX_PARAMETER_GROUPS: usize = DEFAULT_MAX_SERVICES;

/// Default maximum compound-key components per correlation table.
pub const DEFAULT_MAX_COMPOUND_KEY_COMPONENTS: usize = 4;

/// Default response timeout for Operation Adapter round-trips (§4.4, §5).
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default instance-cache expiry: -1 seconds means "valid for the current
/// message only" (§4.4 GetInstances, §6). Modeled as `None` rather than a
/// signed duration since "negative seconds" has no meaning outside this one
/// sentinel.
pub const DEFAULT_INSTANCE_CACHE_PER_MESSAGE_ONLY: bool = true;

/// Default recursive-permission-check depth used by the Passthrough Router
/// for Get/GetInstances eligibility (§4.7).
pub const DEFAULT_PASSTHROUGH_RECURSIVE_DEPTH: u32 = 8;

/// Broker-wide configuration.
///
/// Covers both the compile-time caps named in spec §6 (exposed here as
/// runtime-tunable fields so a host process can adjust them without
/// recompiling) and the two Broker-specific additions: the passthrough
/// recursive permission-check depth, and the Broker's own endpoint id.
///
/// # Examples
///
/// ```
/// use usp_broker::config::BrokerConfig;
///
/// let config = BrokerConfig::builder()
///     .with_endpoint_id("broker-1")
///     .with_max_services(128)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_services, 128);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// The Broker's own USP endpoint identifier, used when it must identify
    /// itself (e.g. as the Controller side of an outbound request).
    pub endpoint_id: String,

    /// Maximum number of concurrently connected Services (§4.1 `Add`
    /// capacity check, §6).
    pub max_services: usize,

    /// Maximum vendor parameter groups; always equal to `max_services` (§6).
    pub max_parameter_groups: usize,

    /// Maximum compound-key components per correlation-table entry (§6).
    pub max_compound_key_components: usize,

    /// Deadline for Operation Adapter round-trips (§4.4, §5).
    pub response_timeout: Duration,

    /// Recursive permission-check depth for Passthrough Router Get/GetInstances
    /// eligibility (§4.7).
    pub passthrough_recursive_depth: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoint_id: "usp-broker".to_string(),
            max_services: DEFAULT_MAX_SERVICES,
            max_parameter_groups: DEFAULT_MAX_PARAMETER_GROUPS,
            max_compound_key_components: DEFAULT_MAX_COMPOUND_KEY_COMPONENTS,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            passthrough_recursive_depth: DEFAULT_PASSTHROUGH_RECURSIVE_DEPTH,
        }
    }
}

impl BrokerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint_id.is_empty() {
            return Err("endpoint_id must not be empty".to_string());
        }

        if self.max_services == 0 {
            return Err("max_services must be > 0".to_string());
        }

        if self.max_parameter_groups < self.max_services {
            return Err("max_parameter_groups must be >= max_services".to_string());
        }

        if self.max_compound_key_components == 0 {
            return Err("max_compound_key_components must be > 0".to_string());
        }

        if self.response_timeout.is_zero() {
            return Err("response_timeout must be > 0".to_string());
        }

        Ok(())
    }
}

/// Builder for [`BrokerConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct BrokerConfigBuilder {
    config: BrokerConfig,
}

impl BrokerConfigBuilder {
    /// Set the Broker's own endpoint identifier.
    pub fn with_endpoint_id(mut self, endpoint_id: impl Into<String>) -> Self {
        self.config.endpoint_id = endpoint_id.into();
        self
    }

    /// Set the maximum number of concurrently connected Services.
    pub fn with_max_services(mut self, max: usize) -> Self {
        self.config.max_services = max;
        self.config.max_parameter_groups = max;
        self
    }

    /// Set the maximum compound-key components per correlation-table entry.
    pub fn with_max_compound_key_components(mut self, max: usize) -> Self {
        self.config.max_compound_key_components = max;
        self
    }

    /// Set the Operation Adapter round-trip response timeout.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Set the Passthrough Router's recursive permission-check depth.
    pub fn with_passthrough_recursive_depth(mut self, depth: u32) -> Self {
        self.config.passthrough_recursive_depth = depth;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<BrokerConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrokerConfig::default();
        assert_eq!(config.max_services, DEFAULT_MAX_SERVICES);
        assert_eq!(config.response_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_empty_endpoint_id() {
        let result = BrokerConfig::builder().with_endpoint_id("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_max_services() {
        let result = BrokerConfig::builder().with_max_services(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = BrokerConfig::builder()
            .with_response_timeout(Duration::from_secs(0))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_multiple_options() {
        let config = BrokerConfig::builder()
            .with_endpoint_id("broker-1")
            .with_max_services(128)
            .with_passthrough_recursive_depth(4)
            .build()
            .expect("valid config");

        assert_eq!(config.endpoint_id, "broker-1");
        assert_eq!(config.max_services, 128);
        assert_eq!(config.max_parameter_groups, 128);
        assert_eq!(config.passthrough_recursive_depth, 4);
    }

    #[test]
    fn test_serialization_json() {
        let config = BrokerConfig::default();
        let json = serde_json::to_string(&config).expect("serializes");
        let deserialized: BrokerConfig = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(config.max_services, deserialized.max_services);
    }
}
