//! Backend capability detection
//!
//! Which optional backends exist is a property of the build, not of a single
//! channel, so the answer is computed once and cached for the process.

use channel_types::{BackendCapabilities, ChannelBackend};
use once_cell::sync::Lazy;
use tracing::debug;

static DETECTED: Lazy<BackendCapabilities> = Lazy::new(|| {
    let mut caps = BackendCapabilities::local();
    if cfg!(feature = "rpc") {
        caps = caps.with(ChannelBackend::Rpc);
    }
    if cfg!(feature = "dds") {
        caps = caps.with(ChannelBackend::Dds);
    }
    debug!(backends = ?caps, "Detected channel backend capabilities");
    caps
});

/// Backends available to this process
pub fn detect_capabilities() -> BackendCapabilities {
    DETECTED.clone()
}
