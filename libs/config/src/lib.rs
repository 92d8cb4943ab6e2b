//! # Infrastructure Configuration
//!
//! Configuration for the message-passing infrastructure that owns actors and
//! the channels between them.
//!
//! ## Features
//!
//! - **Defaults**: ring depth, shutdown timeout
//! - **Capability detection**: which channel backends this process can build,
//!   resolved once per process
//! - **Loading**: TOML file plus `MSGINFRA__*` environment overrides
//!
//! ## Usage
//!
//! ```rust
//! use infra_config::InfrastructureConfig;
//!
//! let config = InfrastructureConfig::from_toml_str("default_depth = 8").unwrap();
//! assert_eq!(config.default_depth, 8);
//! ```

pub mod capabilities;
pub mod defaults;
pub mod infrastructure;

// Re-export commonly used types
pub use capabilities::detect_capabilities;
pub use infrastructure::InfrastructureConfig;
