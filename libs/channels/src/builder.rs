//! Channel Builder
//!
//! Turns a [`ChannelSpec`] into a live [`Channel`] on whatever backend the
//! specification names, using resources from the process's
//! [`MessagingInfrastructure`].
//!
//! | Backend                 | Built as                              |
//! |-------------------------|---------------------------------------|
//! | `shared_memory`         | ring in a heap arena segment          |
//! | `native_shared_memory`  | ring in an anonymous mapping          |
//! | `socket`                | framed items over a local socket pair |
//! | `rpc`, `dds`            | rejected as unsupported               |
//!
//! Chip-attached channel kinds are rejected whatever the backend.

use crate::channel::Channel;
use crate::error::{ChannelError, Result};
use crate::shm::SharedMemoryManager;
use channel_types::{BackendCapabilities, ChannelBackend, ChannelSpec};
use tracing::{info, warn};

/// Resources a process offers to channel builders
pub trait MessagingInfrastructure: Send + Sync {
    /// Allocator for ring segments
    fn allocator(&self) -> &SharedMemoryManager;

    /// Backends usable in this process
    fn capabilities(&self) -> &BackendCapabilities;
}

/// Single-use builder for one channel
#[derive(Debug, Clone)]
pub struct ChannelBuilder {
    spec: ChannelSpec,
}

impl ChannelBuilder {
    pub fn new(spec: ChannelSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ChannelSpec {
        &self.spec
    }

    /// Validate the specification and create the channel
    pub fn build(self, infrastructure: &dyn MessagingInfrastructure) -> Result<Channel> {
        let spec = self.spec;
        let backend = spec.backend();

        spec.validate().map_err(|e| ChannelError::InvalidSpec {
            message: e.to_string(),
        })?;

        if spec.kind().involves_chip() {
            warn!(kind = ?spec.kind(), "Rejecting chip-attached channel");
            return Err(ChannelError::unsupported(
                backend,
                format!("{:?} channels need a chip messaging infrastructure", spec.kind()),
            ));
        }
        if !infrastructure.capabilities().supports(backend) {
            return Err(ChannelError::unsupported(
                backend,
                "backend is not available in this process",
            ));
        }

        let descriptor = spec.descriptor()?;
        let depth = spec.depth();
        let (src_name, dst_name) = (spec.src_name(), spec.dst_name());

        let channel = match backend {
            ChannelBackend::SharedMemory | ChannelBackend::NativeSharedMemory => {
                Channel::shared_memory(
                    infrastructure.allocator(),
                    backend,
                    src_name,
                    dst_name,
                    descriptor,
                    depth,
                )?
            }
            ChannelBackend::Socket => Channel::socket(src_name, dst_name, descriptor, depth)?,
            ChannelBackend::Rpc | ChannelBackend::Dds => {
                return Err(ChannelError::unsupported(
                    backend,
                    "no wire protocol is defined for this backend",
                ))
            }
        };
        let channel = if spec.is_synchronized() {
            channel.synchronized()
        } else {
            channel
        };

        info!(
            backend = %backend,
            src = %spec.src(),
            dst = %spec.dst(),
            src_port = %channel.src_port().name(),
            dst_port = %channel.dst_port().name(),
            synchronized = channel.is_synchronized(),
            "Built channel"
        );
        Ok(channel)
    }
}

/// Build a channel from `spec` in one call
pub fn build_channel(spec: ChannelSpec, infrastructure: &dyn MessagingInfrastructure) -> Result<Channel> {
    ChannelBuilder::new(spec).build(infrastructure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_types::{ChannelKind, ElementType, Participant, PortInitializer};

    struct TestInfrastructure {
        allocator: SharedMemoryManager,
        capabilities: BackendCapabilities,
    }

    impl TestInfrastructure {
        fn with(capabilities: BackendCapabilities) -> Self {
            Self {
                allocator: SharedMemoryManager::new(),
                capabilities,
            }
        }
    }

    impl MessagingInfrastructure for TestInfrastructure {
        fn allocator(&self) -> &SharedMemoryManager {
            &self.allocator
        }
        fn capabilities(&self) -> &BackendCapabilities {
            &self.capabilities
        }
    }

    fn inter(kind: ChannelKind, backend: ChannelBackend) -> ChannelSpec {
        ChannelSpec::Inter {
            kind,
            backend,
            src: Participant::Actor("a".into()),
            dst: Participant::Actor("b".into()),
            src_port: PortInitializer::new("a.out", vec![4], ElementType::F32, 8),
            dst_port: PortInitializer::new("b.in", vec![4], ElementType::F32, 8),
        }
    }

    #[test]
    fn test_builds_local_backends() {
        let infra = TestInfrastructure::with(BackendCapabilities::local());
        for backend in [
            ChannelBackend::SharedMemory,
            ChannelBackend::NativeSharedMemory,
            ChannelBackend::Socket,
        ] {
            let channel = build_channel(inter(ChannelKind::HostToHost, backend), &infra).unwrap();
            assert_eq!(channel.backend(), backend);
            assert_eq!(channel.src_port().name(), "a.out");
            assert_eq!(channel.dst_port().name(), "b.in");
            assert_eq!(channel.depth(), 8);
            assert!(!channel.is_synchronized());
        }
        assert_eq!(infra.allocator.segment_count(), 2);
        assert_eq!(infra.allocator.allocated_bytes(), 2 * 8 * 16);
    }

    #[test]
    fn test_rpc_and_dds_unsupported_even_when_advertised() {
        let everything: BackendCapabilities = ChannelBackend::ALL.into_iter().collect();
        let infra = TestInfrastructure::with(everything);
        for backend in [ChannelBackend::Rpc, ChannelBackend::Dds] {
            let err = build_channel(inter(ChannelKind::HostToHost, backend), &infra).unwrap_err();
            assert!(matches!(err, ChannelError::Unsupported { backend: b, .. } if b == backend));
        }
    }

    #[test]
    fn test_missing_capability_rejected() {
        let infra = TestInfrastructure::with(
            BackendCapabilities::none().with(ChannelBackend::SharedMemory),
        );
        assert!(matches!(
            build_channel(inter(ChannelKind::HostToHost, ChannelBackend::Socket), &infra),
            Err(ChannelError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_chip_kinds_rejected() {
        let infra = TestInfrastructure::with(BackendCapabilities::local());
        for kind in [ChannelKind::NativeToChip, ChannelKind::ChipToNative] {
            assert!(matches!(
                build_channel(inter(kind, ChannelBackend::SharedMemory), &infra),
                Err(ChannelError::Unsupported { .. })
            ));
        }
        assert_eq!(infra.allocator.segment_count(), 0);
    }

    #[test]
    fn test_service_channel_is_synchronized_with_suffixed_names() {
        let infra = TestInfrastructure::with(BackendCapabilities::local());
        let spec = ChannelSpec::Service {
            kind: ChannelKind::HostToHost,
            backend: ChannelBackend::SharedMemory,
            src: Participant::RuntimeService("rs0".into()),
            dst: Participant::Actor("lif".into()),
            port: PortInitializer::new("rs0_lif", vec![1], ElementType::I64, 32),
        };
        let channel = ChannelBuilder::new(spec).build(&infra).unwrap();
        assert!(channel.is_synchronized());
        assert_eq!(channel.src_port().name(), "rs0_lif_src");
        assert_eq!(channel.dst_port().name(), "rs0_lif_dst");
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let infra = TestInfrastructure::with(BackendCapabilities::local());
        let spec = ChannelSpec::Runtime {
            kind: ChannelKind::HostToHost,
            backend: ChannelBackend::SharedMemory,
            src: Participant::Actor("a".into()),
            dst: Participant::Runtime,
            port: PortInitializer::new("p", vec![1], ElementType::U8, 1),
        };
        assert!(matches!(
            build_channel(spec, &infra),
            Err(ChannelError::InvalidSpec { .. })
        ));
    }
}
