//! Channel backend tags and capability sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Transport backing a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelBackend {
    /// Library-internal shared memory arena
    SharedMemory,
    /// Anonymous memory mapping owned by the allocator
    NativeSharedMemory,
    /// Remote procedure call transport
    Rpc,
    /// Data distribution service transport
    Dds,
    /// Unix domain socket pair
    Socket,
}

impl ChannelBackend {
    pub const ALL: [ChannelBackend; 5] = [
        ChannelBackend::SharedMemory,
        ChannelBackend::NativeSharedMemory,
        ChannelBackend::Rpc,
        ChannelBackend::Dds,
        ChannelBackend::Socket,
    ];

    /// Backends whose data path is a ring of slots in a memory segment
    pub fn is_shared_memory(self) -> bool {
        matches!(
            self,
            ChannelBackend::SharedMemory | ChannelBackend::NativeSharedMemory
        )
    }
}

impl fmt::Display for ChannelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelBackend::SharedMemory => "shared_memory",
            ChannelBackend::NativeSharedMemory => "native_shared_memory",
            ChannelBackend::Rpc => "rpc",
            ChannelBackend::Dds => "dds",
            ChannelBackend::Socket => "socket",
        };
        f.write_str(name)
    }
}

/// Set of backends available in this process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendCapabilities {
    available: BTreeSet<ChannelBackend>,
}

impl BackendCapabilities {
    /// Empty capability set
    pub fn none() -> Self {
        Self {
            available: BTreeSet::new(),
        }
    }

    /// Backends that need no external service: both shared-memory kinds and sockets
    pub fn local() -> Self {
        Self::none()
            .with(ChannelBackend::SharedMemory)
            .with(ChannelBackend::NativeSharedMemory)
            .with(ChannelBackend::Socket)
    }

    pub fn with(mut self, backend: ChannelBackend) -> Self {
        self.available.insert(backend);
        self
    }

    pub fn supports(&self, backend: ChannelBackend) -> bool {
        self.available.contains(&backend)
    }

    pub fn iter(&self) -> impl Iterator<Item = ChannelBackend> + '_ {
        self.available.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self::local()
    }
}

impl FromIterator<ChannelBackend> for BackendCapabilities {
    fn from_iter<I: IntoIterator<Item = ChannelBackend>>(iter: I) -> Self {
        Self {
            available: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_capabilities() {
        let caps = BackendCapabilities::local();
        assert!(caps.supports(ChannelBackend::SharedMemory));
        assert!(caps.supports(ChannelBackend::NativeSharedMemory));
        assert!(caps.supports(ChannelBackend::Socket));
        assert!(!caps.supports(ChannelBackend::Rpc));
        assert!(!caps.supports(ChannelBackend::Dds));
    }

    #[test]
    fn test_capabilities_deserialize_from_list() {
        #[derive(Deserialize)]
        struct Wrapper {
            backends: BackendCapabilities,
        }
        let parsed: Wrapper = toml::from_str(r#"backends = ["shared_memory", "rpc"]"#).unwrap();
        assert!(parsed.backends.supports(ChannelBackend::Rpc));
        assert!(!parsed.backends.supports(ChannelBackend::Socket));
        assert_eq!(parsed.backends.iter().count(), 2);
    }
}
