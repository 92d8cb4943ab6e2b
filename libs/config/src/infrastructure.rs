//! Infrastructure Configuration Module
//!
//! Provides configuration loading for the process manager and channel builders.
//! Supports loading from TOML files with environment variable overrides.

use crate::capabilities::detect_capabilities;
use crate::defaults::{channel, manager};
use anyhow::{bail, Context, Result};
use channel_types::{BackendCapabilities, ChannelBackend};
use config_crate::{Config, ConfigBuilder, Environment, File, FileFormat};
use config_crate::builder::DefaultState;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration handed to the process manager at construction
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct InfrastructureConfig {
    /// Ring depth for ports built without an explicit depth
    #[serde(default = "default_depth")]
    pub default_depth: usize,

    /// Backends channel builders may use
    #[serde(default = "detect_capabilities")]
    pub backends: BackendCapabilities,

    /// Per-worker wait during a blocking cleanup
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_depth() -> usize {
    channel::DEFAULT_DEPTH
}

fn default_shutdown_timeout_ms() -> u64 {
    manager::SHUTDOWN_TIMEOUT_MS
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            backends: detect_capabilities(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl InfrastructureConfig {
    /// Load configuration from an optional file with `MSGINFRA__*` overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, manager::ENV_PREFIX)
    }

    /// Load configuration using a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading infrastructure config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        Self::finish(Self::with_env(builder, env_prefix))
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::finish(builder)
    }

    fn with_env(builder: ConfigBuilder<DefaultState>, env_prefix: &str) -> ConfigBuilder<DefaultState> {
        // e.g. MSGINFRA__DEFAULT_DEPTH=64, MSGINFRA__BACKENDS=shared_memory,socket
        builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("backends"),
        )
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()
            .context("Failed to build infrastructure configuration")?
            .try_deserialize()
            .context("Failed to deserialize infrastructure configuration")?;

        config.validate()?;
        debug!(
            default_depth = config.default_depth,
            backends = ?config.backends,
            "Infrastructure configuration loaded"
        );
        Ok(config)
    }

    /// Reject configurations the channel layer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.default_depth == 0 {
            bail!("default_depth must be at least 1");
        }
        if !self.backends.supports(ChannelBackend::SharedMemory) {
            bail!("backends must include the library-internal shared_memory backend");
        }
        Ok(())
    }

    /// Per-worker wait during a blocking cleanup
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_sources() {
        let config = InfrastructureConfig::from_toml_str("").unwrap();
        assert_eq!(config, InfrastructureConfig::default());
        assert_eq!(config.default_depth, 32);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("infra.toml");

        let config_content = r#"
default_depth = 4
backends = ["shared_memory", "socket"]
shutdown_timeout_ms = 250
"#;
        fs::write(&config_path, config_content).unwrap();

        let config =
            InfrastructureConfig::load_with_prefix(Some(&config_path), "MSGINFRA_TEST_FILE").unwrap();
        assert_eq!(config.default_depth, 4);
        assert!(config.backends.supports(ChannelBackend::Socket));
        assert!(!config.backends.supports(ChannelBackend::NativeSharedMemory));
        assert_eq!(config.shutdown_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("MSGINFRA_TEST_ENV__DEFAULT_DEPTH", "64");
        let config = InfrastructureConfig::load_with_prefix(None, "MSGINFRA_TEST_ENV").unwrap();
        std::env::remove_var("MSGINFRA_TEST_ENV__DEFAULT_DEPTH");
        assert_eq!(config.default_depth, 64);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(InfrastructureConfig::load_with_prefix(Some(&missing), "MSGINFRA_TEST_MISSING").is_err());
    }

    #[test]
    fn test_validation() {
        assert!(InfrastructureConfig::from_toml_str("default_depth = 0").is_err());
        assert!(InfrastructureConfig::from_toml_str(r#"backends = ["socket"]"#).is_err());
    }
}
