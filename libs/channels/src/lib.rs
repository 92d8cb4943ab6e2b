//! # Channels - CSP Message Passing
//!
//! Bounded, typed, single-producer single-consumer channels for actors
//! running in one process.
//!
//! ## Architecture
//!
//! ```text
//! SendEndpoint ──write slot──▶ [ ring in shared memory ] ──read slot──▶ RecvEndpoint
//!      ▲   │                                                            │   ▲
//!      │   └──────────────── slots_filled (semaphore) ─────────────────▶│   │
//!      │                                                                 │   │
//!   ack listener ◀────────── slots_freed (semaphore) ───────────────────┘   │
//!   (capacity)                                                     fill listener
//!                                                                 (readiness queue)
//! ```
//!
//! The sender never writes more than `depth` unread items; the receiver
//! hands each slot back after copying it out. Items arrive in send order,
//! exactly once.
//!
//! ## Quick Start
//!
//! ```rust
//! use channels::{Channel, SharedMemoryManager};
//! use channel_types::{BufferDescriptor, ChannelBackend, DataItem, ElementType};
//!
//! # fn main() -> channels::Result<()> {
//! let allocator = SharedMemoryManager::new();
//! let descriptor = BufferDescriptor::new(vec![3], ElementType::I32)?;
//! let channel = Channel::shared_memory(
//!     &allocator,
//!     ChannelBackend::SharedMemory,
//!     "producer.out",
//!     "consumer.in",
//!     descriptor,
//!     2,
//! )?;
//! channel.start()?;
//!
//! let item = DataItem::from_slice(vec![3], &[1i32, 2, 3])?;
//! channel.src_port().send(&item)?;
//! assert_eq!(channel.dst_port().recv()?, item);
//! channel.join();
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod channel;
pub mod endpoint;
pub mod error;
mod queue;
pub mod ring;
pub mod selector;
pub mod semaphore;
pub mod shm;
pub mod socket;

pub use builder::{build_channel, ChannelBuilder, MessagingInfrastructure};
pub use channel::Channel;
pub use endpoint::{Observer, RecvEndpoint, Selectable, SendEndpoint};
pub use error::{ChannelError, Result};
pub use selector::{SelectCase, Selector, SelectorStats};
pub use shm::{Segment, SegmentKind, SharedMemoryManager};
