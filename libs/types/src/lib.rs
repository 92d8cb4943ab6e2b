//! # Channel Types
//!
//! Shared data model for the CSP channel layer. Every crate in the workspace
//! speaks in terms of these types:
//!
//! - **Element types**: scalar tags with a fixed byte width
//! - **Buffer descriptors**: shape x element type, giving the per-item byte size
//! - **Data items**: an owned, shaped buffer that travels through a channel
//! - **Channel specifications**: the declarative input consumed by channel builders
//!
//! ## Quick Start
//!
//! ```rust
//! use channel_types::{BufferDescriptor, DataItem, ElementType};
//!
//! let descriptor = BufferDescriptor::new(vec![3], ElementType::I32).unwrap();
//! assert_eq!(descriptor.item_bytes(), 12);
//!
//! let item = DataItem::from_slice(vec![3], &[1i32, 2, 3]).unwrap();
//! assert_eq!(item.to_vec::<i32>().unwrap(), vec![1, 2, 3]);
//! ```

pub mod backend;
pub mod descriptor;
pub mod element;
pub mod error;
pub mod spec;

pub use backend::{BackendCapabilities, ChannelBackend};
pub use descriptor::{BufferDescriptor, DataItem};
pub use element::{Element, ElementType};
pub use error::{Result, TypeError};
pub use spec::{ChannelKind, ChannelSpec, Participant, PortInitializer};

/// Default ring depth for ports built without an explicit depth
pub const DEFAULT_CHANNEL_DEPTH: usize = 32;
