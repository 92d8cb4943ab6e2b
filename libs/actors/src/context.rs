//! Worker-side view of the actor lifecycle
//!
//! Workers are plain threads, so pausing is cooperative: an actor calls
//! [`ActorContext::checkpoint`] between units of work (typically once per
//! loop iteration). A paused actor parks inside `checkpoint` until resumed
//! or stopped; channel endpoints it owns are untouched while it waits.

use crate::id::ActorId;
use crate::status::ActorCommand;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;
use tracing::debug;

pub struct ActorContext {
    id: ActorId,
    name: String,
    commands: Receiver<ActorCommand>,
    stopping: bool,
}

impl ActorContext {
    pub(crate) fn new(id: ActorId, name: String, commands: Receiver<ActorCommand>) -> Self {
        Self {
            id,
            name,
            commands,
            stopping: false,
        }
    }

    /// Manager-assigned id of this actor
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Name given at `build_actor`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply pending lifecycle commands, parking while paused.
    ///
    /// Returns `false` once the actor has been asked to stop; the entry
    /// function should then release its endpoints and return.
    pub fn checkpoint(&mut self) -> bool {
        self.apply_commands(false)
    }

    /// Sleep for up to `duration`, waking early for lifecycle commands.
    /// Returns the same as [`checkpoint`](Self::checkpoint).
    pub fn idle(&mut self, duration: Duration) -> bool {
        if self.stopping {
            return false;
        }
        match self.commands.recv_timeout(duration) {
            Ok(ActorCommand::Pause) => {
                debug!(actor_id = %self.id, actor = %self.name, "Actor parked");
                self.apply_commands(true)
            }
            Ok(ActorCommand::Stop) | Err(RecvTimeoutError::Disconnected) => {
                self.stopping = true;
                false
            }
            Ok(ActorCommand::Resume) | Err(RecvTimeoutError::Timeout) => self.apply_commands(false),
        }
    }

    fn apply_commands(&mut self, mut paused: bool) -> bool {
        if self.stopping {
            return false;
        }

        loop {
            let command = if paused {
                // Manager gone counts as a stop request
                self.commands.recv().unwrap_or(ActorCommand::Stop)
            } else {
                match self.commands.try_recv() {
                    Ok(command) => command,
                    Err(TryRecvError::Empty) => return true,
                    Err(TryRecvError::Disconnected) => ActorCommand::Stop,
                }
            };

            match command {
                ActorCommand::Pause => {
                    if !paused {
                        debug!(actor_id = %self.id, actor = %self.name, "Actor parked");
                    }
                    paused = true;
                }
                ActorCommand::Resume => {
                    if paused {
                        debug!(actor_id = %self.id, actor = %self.name, "Actor resumed");
                    }
                    paused = false;
                }
                ActorCommand::Stop => {
                    debug!(actor_id = %self.id, actor = %self.name, "Actor stop requested");
                    self.stopping = true;
                    return false;
                }
            }
        }
    }

    /// True once a stop command has been seen
    pub fn is_stopping(&self) -> bool {
        self.stopping
    }
}

impl std::fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("stopping", &self.stopping)
            .finish()
    }
}
