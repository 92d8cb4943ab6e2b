//! Infrastructure defaults
//!
//! Default values shared by the channel layer and the process manager.

/// Channel defaults
pub mod channel {
    /// Ring depth for ports built without an explicit depth
    pub const DEFAULT_DEPTH: usize = channel_types::DEFAULT_CHANNEL_DEPTH;
}

/// Process manager defaults
pub mod manager {
    /// How long a blocking cleanup waits per worker before detaching it (milliseconds)
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

    /// Environment variable prefix for overrides
    pub const ENV_PREFIX: &str = "MSGINFRA";
}
