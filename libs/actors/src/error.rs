//! Actor management errors

use crate::id::ActorId;
use crate::status::ActorStatus;
use channels::ChannelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActorError {
    /// Infrastructure configuration rejected
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Lifecycle call not allowed in the current state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ActorStatus,
    },

    #[error("Unknown actor {0}")]
    UnknownActor(ActorId),

    /// Worker thread could not be created
    #[error("Failed to spawn worker for actor '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    pub fn configuration(error: anyhow::Error) -> Self {
        Self::Configuration {
            message: format!("{:#}", error),
        }
    }
}
