//! Actor Process Management
//!
//! Runs user actors as worker threads of one runtime process and hands out
//! the channels they talk over.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── ProcessManager ───────────────────────────┐
//! │                                                                        │
//! │  SharedMemoryManager ──segments──▶ ChannelBuilder ──▶ Channel (ring)   │
//! │                                                                        │
//! │  ┌──────────────┐  commands   ┌──────────────┐                         │
//! │  │ ActorSlot A  │────────────▶│ worker A     │── send ──┐              │
//! │  └──────────────┘             └──────────────┘          ▼              │
//! │  ┌──────────────┐  commands   ┌──────────────┐      [ channel ]        │
//! │  │ ActorSlot B  │────────────▶│ worker B     │◀─ recv ──┘              │
//! │  └──────────────┘             └──────────────┘                         │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use actors::{ActorContext, ProcessManager};
//! use infra_config::InfrastructureConfig;
//!
//! # fn main() -> actors::Result<()> {
//! let manager = ProcessManager::new(InfrastructureConfig::default())?;
//! manager.build_actor(
//!     "ticker",
//!     |mut ctx: ActorContext, ticks: u32| {
//!         for _ in 0..ticks {
//!             if !ctx.checkpoint() {
//!                 break;
//!             }
//!         }
//!         Ok(())
//!     },
//!     3,
//! )?;
//! manager.start()?;
//! let report = manager.cleanup(true);
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod id;
pub mod manager;
pub mod status;

pub use context::ActorContext;
pub use error::{ActorError, Result};
pub use id::ActorId;
pub use manager::{ActorInfo, CleanupReport, ManagerMetrics, ProcessManager};
pub use status::{ActorCommand, ActorStatus};
