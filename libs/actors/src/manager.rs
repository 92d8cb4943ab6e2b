//! Process Manager
//!
//! Owns every actor of one runtime process together with the shared memory
//! allocator their channels live in.
//!
//! ## Lifecycle
//!
//! 1. [`build_actor`](ProcessManager::build_actor) registers an entry
//!    function and its payload; nothing runs yet
//! 2. [`start`](ProcessManager::start) spawns one worker thread per
//!    created actor and resumes paused ones
//! 3. [`pause`](ProcessManager::pause) parks running actors at their next
//!    checkpoint
//! 4. [`stop`](ProcessManager::stop) asks every worker to finish and
//!    releases the allocator; [`cleanup`](ProcessManager::cleanup) also
//!    reaps worker threads, waiting for them or not
//!
//! Stopping is terminal. A second `stop` does nothing; a second `cleanup`
//! only reaps workers an earlier one detached.
//!
//! ## Monitoring
//!
//! [`ManagerMetrics`] counts built, started, joined, failed and detached
//! workers:
//! - **failed > 0**: an entry function returned an error or panicked
//! - **detached > 0**: a worker ignored its stop request past the
//!   shutdown timeout (usually blocked in `recv` without a timeout)

use crate::context::ActorContext;
use crate::error::{ActorError, Result};
use crate::id::ActorId;
use crate::status::{ActorCommand, ActorStatus};
use channel_types::{BackendCapabilities, ChannelSpec, ElementType, PortInitializer};
use channels::{build_channel, Channel, MessagingInfrastructure, SharedMemoryManager};
use crossbeam_channel::{unbounded, Receiver, Sender};
use infra_config::InfrastructureConfig;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type EntryFn = Box<dyn FnOnce(ActorContext) -> anyhow::Result<()> + Send + 'static>;

/// Snapshot of one registered actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorInfo {
    pub id: ActorId,
    pub name: String,
    pub status: ActorStatus,
}

/// Outcome of reaping worker threads
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Workers that returned `Ok`
    pub joined: Vec<ActorId>,
    /// Workers that returned an error or panicked
    pub failed: Vec<(ActorId, String)>,
    /// Workers still running when cleanup gave up on them
    pub detached: Vec<ActorId>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.detached.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ManagerMetrics {
    pub actors_built: AtomicU64,
    pub actors_started: AtomicU64,
    pub workers_joined: AtomicU64,
    pub workers_failed: AtomicU64,
    pub workers_detached: AtomicU64,
}

struct ActorSlot {
    id: ActorId,
    name: String,
    status: ActorStatus,
    entry: Option<EntryFn>,
    commands: Option<Sender<ActorCommand>>,
    worker: Option<JoinHandle<anyhow::Result<()>>>,
}

impl ActorSlot {
    fn info(&self) -> ActorInfo {
        ActorInfo {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
        }
    }

    fn command(&self, command: ActorCommand) {
        if let Some(commands) = &self.commands {
            // A worker that already returned has dropped its receiver
            let _ = commands.send(command);
        }
    }
}

/// Reports a worker's exit, including by panic
struct ExitNotice {
    id: ActorId,
    exits: Sender<ActorId>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.exits.send(self.id);
    }
}

pub struct ProcessManager {
    manager_id: String,
    config: InfrastructureConfig,
    allocator: SharedMemoryManager,
    actors: Mutex<Vec<ActorSlot>>,
    stopped: AtomicBool,
    exits: (Sender<ActorId>, Receiver<ActorId>),
    metrics: Arc<ManagerMetrics>,
}

impl ProcessManager {
    pub fn new(config: InfrastructureConfig) -> Result<Self> {
        config.validate().map_err(ActorError::configuration)?;

        let manager_id = format!("manager-{}", Uuid::new_v4().simple());
        info!(
            manager_id = %manager_id,
            default_depth = config.default_depth,
            backends = ?config.backends,
            "Creating process manager"
        );

        Ok(Self {
            manager_id,
            config,
            allocator: SharedMemoryManager::new(),
            actors: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            exits: unbounded(),
            metrics: Arc::new(ManagerMetrics::default()),
        })
    }

    pub fn config(&self) -> &InfrastructureConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ManagerMetrics> {
        Arc::clone(&self.metrics)
    }

    fn manager_status(&self) -> ActorStatus {
        if self.stopped.load(Ordering::Acquire) {
            ActorStatus::Stopped
        } else {
            ActorStatus::Running
        }
    }

    fn ensure_not_stopped(&self, operation: &'static str) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(ActorError::InvalidState {
                operation,
                state: ActorStatus::Stopped,
            });
        }
        Ok(())
    }

    /// Register an actor that will run `entry(context, payload)` on its own
    /// thread once the manager starts
    pub fn build_actor<P, F>(&self, name: impl Into<String>, entry: F, payload: P) -> Result<ActorId>
    where
        P: Send + 'static,
        F: FnOnce(ActorContext, P) -> anyhow::Result<()> + Send + 'static,
    {
        self.ensure_not_stopped("build an actor")?;

        let id = ActorId::new();
        let name = name.into();
        let entry: EntryFn = Box::new(move |context| entry(context, payload));

        debug!(actor_id = %id, actor = %name, manager_id = %self.manager_id, "Actor registered");
        self.actors.lock().push(ActorSlot {
            id,
            name,
            status: ActorStatus::Created,
            entry: Some(entry),
            commands: None,
            worker: None,
        });
        self.metrics.actors_built.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Spawn workers for created actors and resume paused ones
    pub fn start(&self) -> Result<()> {
        self.ensure_not_stopped("start")?;
        let started_at = Instant::now();

        let mut actors = self.actors.lock();
        let mut spawned = 0usize;
        for slot in actors.iter_mut() {
            match slot.status {
                ActorStatus::Created => {
                    self.spawn_worker(slot)?;
                    spawned += 1;
                }
                ActorStatus::Paused => {
                    slot.command(ActorCommand::Resume);
                    slot.status = ActorStatus::Running;
                    debug!(actor_id = %slot.id, actor = %slot.name, "Actor resumed");
                }
                ActorStatus::Running | ActorStatus::Stopped => {}
            }
        }

        info!(
            manager_id = %self.manager_id,
            spawned,
            actors = actors.len(),
            start_duration_us = started_at.elapsed().as_micros() as u64,
            "Process manager started"
        );
        Ok(())
    }

    fn spawn_worker(&self, slot: &mut ActorSlot) -> Result<()> {
        let Some(entry) = slot.entry.take() else {
            return Ok(());
        };
        let (commands, inbox) = unbounded();
        let context = ActorContext::new(slot.id, slot.name.clone(), inbox);
        let notice = ExitNotice {
            id: slot.id,
            exits: self.exits.0.clone(),
        };
        let (id, name) = (slot.id, slot.name.clone());

        let worker = thread::Builder::new()
            .name(format!("actor-{}", slot.name))
            .spawn(move || {
                let _notice = notice;
                debug!(actor_id = %id, actor = %name, "Actor worker running");
                let result = entry(context);
                match &result {
                    Ok(()) => debug!(actor_id = %id, actor = %name, "Actor worker finished"),
                    Err(e) => error!(actor_id = %id, actor = %name, error = %e, "Actor worker failed"),
                }
                result
            })
            .map_err(|source| ActorError::Spawn {
                name: slot.name.clone(),
                source,
            })?;

        slot.commands = Some(commands);
        slot.worker = Some(worker);
        slot.status = ActorStatus::Running;
        self.metrics.actors_started.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Park every running actor at its next checkpoint
    pub fn pause(&self) -> Result<()> {
        self.ensure_not_stopped("pause")?;

        let mut actors = self.actors.lock();
        let mut paused = 0usize;
        for slot in actors.iter_mut().filter(|s| s.status == ActorStatus::Running) {
            slot.command(ActorCommand::Pause);
            slot.status = ActorStatus::Paused;
            paused += 1;
        }
        info!(manager_id = %self.manager_id, paused, "Process manager paused");
        Ok(())
    }

    /// Ask every worker to stop and release the shared memory allocator.
    /// Does not wait for workers; see [`cleanup`](Self::cleanup).
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            debug!(manager_id = %self.manager_id, "Process manager already stopped");
            return;
        }

        let mut actors = self.actors.lock();
        for slot in actors.iter_mut() {
            slot.command(ActorCommand::Stop);
            // Never-started actors are dropped with their payloads
            slot.entry = None;
            slot.status = ActorStatus::Stopped;
        }
        let segments = self.allocator.release_all();

        info!(
            manager_id = %self.manager_id,
            actors = actors.len(),
            segments,
            "Process manager stopped"
        );
    }

    /// Stop, then reap workers. With `block` workers get up to the
    /// configured shutdown timeout to return; without it only workers that
    /// have already returned are joined. Others are reported as detached
    /// and can be reaped by a later call.
    pub fn cleanup(&self, block: bool) -> CleanupReport {
        self.stop();

        let workers: Vec<(ActorId, String, JoinHandle<anyhow::Result<()>>)> = self
            .actors
            .lock()
            .iter_mut()
            .filter_map(|slot| slot.worker.take().map(|w| (slot.id, slot.name.clone(), w)))
            .collect();

        let mut exited: HashSet<ActorId> = self.exits.1.try_iter().collect();
        if block {
            let deadline = Instant::now() + self.config.shutdown_timeout();
            while workers.iter().any(|(id, _, w)| !exited.contains(id) && !w.is_finished()) {
                match self.exits.1.recv_deadline(deadline) {
                    Ok(id) => {
                        exited.insert(id);
                    }
                    Err(_) => break,
                }
            }
        }

        let mut report = CleanupReport::default();
        let mut still_running = Vec::new();
        for (id, name, worker) in workers {
            if !exited.contains(&id) && !worker.is_finished() {
                warn!(actor_id = %id, actor = %name, "Detaching worker that did not stop");
                report.detached.push(id);
                still_running.push((id, worker));
                continue;
            }
            match worker.join() {
                Ok(Ok(())) => report.joined.push(id),
                Ok(Err(e)) => report.failed.push((id, format!("{:#}", e))),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(actor_id = %id, actor = %name, error = %message, "Actor worker panicked");
                    report.failed.push((id, message));
                }
            }
        }

        // Keep detached handles so a later cleanup can still reap them
        if !still_running.is_empty() {
            let mut actors = self.actors.lock();
            for (id, worker) in still_running {
                if let Some(slot) = actors.iter_mut().find(|slot| slot.id == id) {
                    slot.worker = Some(worker);
                }
            }
        }

        self.metrics
            .workers_joined
            .fetch_add(report.joined.len() as u64, Ordering::Relaxed);
        self.metrics
            .workers_failed
            .fetch_add(report.failed.len() as u64, Ordering::Relaxed);
        self.metrics
            .workers_detached
            .fetch_add(report.detached.len() as u64, Ordering::Relaxed);

        info!(
            manager_id = %self.manager_id,
            block,
            joined = report.joined.len(),
            failed = report.failed.len(),
            detached = report.detached.len(),
            "Process manager cleanup complete"
        );
        report
    }

    /// Build a channel in this process's infrastructure
    pub fn channel(&self, spec: ChannelSpec) -> Result<Channel> {
        self.ensure_not_stopped("build a channel")?;
        Ok(build_channel(spec, self)?)
    }

    /// Port layout using the configured default ring depth
    pub fn port(&self, name: impl Into<String>, shape: Vec<usize>, element_type: ElementType) -> PortInitializer {
        PortInitializer::new(name, shape, element_type, self.config.default_depth)
    }

    pub fn actors(&self) -> Vec<ActorInfo> {
        self.actors.lock().iter().map(ActorSlot::info).collect()
    }

    pub fn status(&self, id: ActorId) -> Result<ActorStatus> {
        self.actors
            .lock()
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| slot.status)
            .ok_or(ActorError::UnknownActor(id))
    }

    /// True once the actor's entry function has returned
    pub fn is_finished(&self, id: ActorId) -> Result<bool> {
        let actors = self.actors.lock();
        let slot = actors
            .iter()
            .find(|slot| slot.id == id)
            .ok_or(ActorError::UnknownActor(id))?;
        Ok(slot.worker.as_ref().map_or(slot.status.is_terminal(), |w| w.is_finished()))
    }

    pub fn is_stopped(&self) -> bool {
        self.manager_status() == ActorStatus::Stopped
    }
}

impl MessagingInfrastructure for ProcessManager {
    fn allocator(&self) -> &SharedMemoryManager {
        &self.allocator
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &self.config.backends
    }
}

impl std::fmt::Debug for ProcessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessManager")
            .field("manager_id", &self.manager_id)
            .field("status", &self.manager_status())
            .field("actors", &self.actors.lock().len())
            .field("segments", &self.allocator.segment_count())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        let config = InfrastructureConfig {
            default_depth: 0,
            ..InfrastructureConfig::default()
        };
        assert!(matches!(
            ProcessManager::new(config),
            Err(ActorError::Configuration { .. })
        ));
    }

    #[test]
    fn test_build_does_not_start() {
        let manager = ProcessManager::new(InfrastructureConfig::default()).unwrap();
        let id = manager
            .build_actor("idle", |_ctx, (): ()| Ok(()), ())
            .unwrap();
        assert_eq!(manager.status(id).unwrap(), ActorStatus::Created);
        assert!(!manager.is_finished(id).unwrap());
        assert_eq!(manager.metrics().actors_started.load(Ordering::Relaxed), 0);

        manager.stop();
        assert_eq!(manager.status(id).unwrap(), ActorStatus::Stopped);
        assert!(manager.is_finished(id).unwrap());
        assert!(manager.cleanup(true).joined.is_empty());
    }

    #[test]
    fn test_port_uses_default_depth() {
        let config = InfrastructureConfig {
            default_depth: 7,
            ..InfrastructureConfig::default()
        };
        let manager = ProcessManager::new(config).unwrap();
        let port = manager.port("a.out", vec![2, 2], ElementType::F32);
        assert_eq!(port.depth, 7);
        assert_eq!(port.descriptor().unwrap().item_bytes(), 16);
    }

    #[test]
    fn test_unknown_actor() {
        let manager = ProcessManager::new(InfrastructureConfig::default()).unwrap();
        assert!(matches!(
            manager.status(ActorId::new()),
            Err(ActorError::UnknownActor(_))
        ));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "panicked: boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "panicked: bang");
    }
}
