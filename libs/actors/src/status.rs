//! Actor lifecycle states and the commands that move workers between them
//!
//! ```text
//! Created ──start──▶ Running ──pause──▶ Paused
//!    │                  ▲                  │
//!    │                  └──────start───────┘
//!    └────────stop──────────┬──────────────┘
//!                           ▼
//!                        Stopped (terminal)
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorStatus {
    /// Registered, worker not spawned
    Created,
    Running,
    /// Worker parked at its next checkpoint
    Paused,
    Stopped,
}

impl ActorStatus {
    pub fn is_terminal(self) -> bool {
        self == ActorStatus::Stopped
    }
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorStatus::Created => "created",
            ActorStatus::Running => "running",
            ActorStatus::Paused => "paused",
            ActorStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Message from the manager to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorCommand {
    Pause,
    Resume,
    Stop,
}
