//! Channel specifications
//!
//! The compiler decides which ports are connected and hands one
//! [`ChannelSpec`] per connection to a channel builder. Three shapes exist:
//!
//! - **Inter-actor**: two user actors, port names taken verbatim
//! - **Service**: a runtime-service actor and an actor-model instance
//! - **Runtime**: the top-level runtime and a runtime-service actor
//!
//! Service and runtime channels derive both port names from one initializer
//! (`<name>_src` / `<name>_dst`) and are always synchronized.

use crate::backend::ChannelBackend;
use crate::descriptor::BufferDescriptor;
use crate::element::ElementType;
use crate::error::{Result, TypeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution model of each side of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    HostToHost,
    HostToNative,
    NativeToHost,
    NativeToNative,
    /// Native process feeding an attached neuromorphic chip
    NativeToChip,
    /// Attached neuromorphic chip feeding a native process
    ChipToNative,
}

impl ChannelKind {
    /// True when one endpoint lives on an attached chip
    pub fn involves_chip(self) -> bool {
        matches!(self, ChannelKind::NativeToChip | ChannelKind::ChipToNative)
    }
}

/// Port layout as produced by the compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInitializer {
    pub name: String,
    pub shape: Vec<usize>,
    pub element_type: ElementType,
    /// Ring depth (number of slots)
    pub depth: usize,
}

impl PortInitializer {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, element_type: ElementType, depth: usize) -> Self {
        Self {
            name: name.into(),
            shape,
            element_type,
            depth,
        }
    }

    pub fn descriptor(&self) -> Result<BufferDescriptor> {
        BufferDescriptor::new(self.shape.clone(), self.element_type)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TypeError::invalid_spec("port name cannot be empty"));
        }
        if self.depth == 0 {
            return Err(TypeError::invalid_spec(format!(
                "port '{}' has depth 0; depth must be at least 1",
                self.name
            )));
        }
        self.descriptor().map(|_| ())
    }
}

/// Owner of one side of a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participant {
    /// User actor (process model instance)
    Actor(String),
    /// Runtime-service actor coordinating a sync domain
    RuntimeService(String),
    /// Top-level runtime
    Runtime,
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Actor(name) => write!(f, "actor:{}", name),
            Participant::RuntimeService(name) => write!(f, "service:{}", name),
            Participant::Runtime => f.write_str("runtime"),
        }
    }
}

/// Declarative description of one channel, consumed once by a builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelSpec {
    /// Connection between two distinct user actors
    Inter {
        kind: ChannelKind,
        backend: ChannelBackend,
        src: Participant,
        dst: Participant,
        src_port: PortInitializer,
        dst_port: PortInitializer,
    },
    /// Runtime service <-> actor-model instance
    Service {
        kind: ChannelKind,
        backend: ChannelBackend,
        src: Participant,
        dst: Participant,
        port: PortInitializer,
    },
    /// Runtime <-> runtime service
    Runtime {
        kind: ChannelKind,
        backend: ChannelBackend,
        src: Participant,
        dst: Participant,
        port: PortInitializer,
    },
}

impl ChannelSpec {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelSpec::Inter { kind, .. }
            | ChannelSpec::Service { kind, .. }
            | ChannelSpec::Runtime { kind, .. } => *kind,
        }
    }

    pub fn backend(&self) -> ChannelBackend {
        match self {
            ChannelSpec::Inter { backend, .. }
            | ChannelSpec::Service { backend, .. }
            | ChannelSpec::Runtime { backend, .. } => *backend,
        }
    }

    pub fn src(&self) -> &Participant {
        match self {
            ChannelSpec::Inter { src, .. }
            | ChannelSpec::Service { src, .. }
            | ChannelSpec::Runtime { src, .. } => src,
        }
    }

    pub fn dst(&self) -> &Participant {
        match self {
            ChannelSpec::Inter { dst, .. }
            | ChannelSpec::Service { dst, .. }
            | ChannelSpec::Runtime { dst, .. } => dst,
        }
    }

    /// Port that decides the layout (the source port for inter-actor channels)
    pub fn layout_port(&self) -> &PortInitializer {
        match self {
            ChannelSpec::Inter { src_port, .. } => src_port,
            ChannelSpec::Service { port, .. } | ChannelSpec::Runtime { port, .. } => port,
        }
    }

    /// Name given to the send endpoint
    pub fn src_name(&self) -> String {
        match self {
            ChannelSpec::Inter { src_port, .. } => src_port.name.clone(),
            ChannelSpec::Service { port, .. } | ChannelSpec::Runtime { port, .. } => {
                format!("{}_src", port.name)
            }
        }
    }

    /// Name given to the receive endpoint
    pub fn dst_name(&self) -> String {
        match self {
            ChannelSpec::Inter { dst_port, .. } => dst_port.name.clone(),
            ChannelSpec::Service { port, .. } | ChannelSpec::Runtime { port, .. } => {
                format!("{}_dst", port.name)
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.layout_port().depth
    }

    pub fn descriptor(&self) -> Result<BufferDescriptor> {
        self.layout_port().descriptor()
    }

    /// Service and runtime channels require in-order, exactly-once delivery
    pub fn is_synchronized(&self) -> bool {
        !matches!(self, ChannelSpec::Inter { .. })
    }

    /// Check the participant and port rules for this specification shape
    pub fn validate(&self) -> Result<()> {
        match self {
            ChannelSpec::Inter {
                src,
                dst,
                src_port,
                dst_port,
                ..
            } => {
                match (src, dst) {
                    (Participant::Actor(a), Participant::Actor(b)) if a != b => {}
                    (Participant::Actor(_), Participant::Actor(_)) => {
                        return Err(TypeError::invalid_spec(format!(
                            "inter-actor channel connects {} to itself",
                            src
                        )));
                    }
                    _ => {
                        return Err(TypeError::invalid_spec(format!(
                            "inter-actor channel needs two user actors, got {} -> {}",
                            src, dst
                        )));
                    }
                }
                src_port.validate()?;
                dst_port.validate()?;
                if src_port.shape != dst_port.shape
                    || src_port.element_type != dst_port.element_type
                    || src_port.depth != dst_port.depth
                {
                    return Err(TypeError::invalid_spec(format!(
                        "ports '{}' and '{}' disagree on layout",
                        src_port.name, dst_port.name
                    )));
                }
                Ok(())
            }
            ChannelSpec::Service { src, dst, port, .. } => {
                let ok = matches!(
                    (src, dst),
                    (Participant::RuntimeService(_), Participant::Actor(_))
                        | (Participant::Actor(_), Participant::RuntimeService(_))
                );
                if !ok {
                    return Err(TypeError::invalid_spec(format!(
                        "service channel needs a runtime service and an actor, got {} -> {}",
                        src, dst
                    )));
                }
                port.validate()
            }
            ChannelSpec::Runtime { src, dst, port, .. } => {
                let ok = matches!(
                    (src, dst),
                    (Participant::Runtime, Participant::RuntimeService(_))
                        | (Participant::RuntimeService(_), Participant::Runtime)
                );
                if !ok {
                    return Err(TypeError::invalid_spec(format!(
                        "runtime channel needs the runtime and a runtime service, got {} -> {}",
                        src, dst
                    )));
                }
                port.validate()
            }
        }
    }
}
