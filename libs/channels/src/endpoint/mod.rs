//! Channel endpoints
//!
//! A channel has exactly one [`SendEndpoint`] and one [`RecvEndpoint`].
//! Each runs a background listener thread once started:
//!
//! - the **send** listener turns acknowledgments from the receiver
//!   (`slots_freed`) into local capacity permits
//! - the **recv** listener turns fill signals from the sender
//!   (`slots_filled`, or frames off a socket) into readiness tokens
//!
//! Listeners call the endpoint's observer only when readiness flips from
//! false to true (not-full for send, non-empty for recv), and once more
//! when the peer goes away. The
//! [`Selector`](crate::Selector) uses this to sleep instead of spinning.

mod recv;
mod send;

pub use recv::RecvEndpoint;
pub use send::SendEndpoint;

pub(crate) use recv::RecvLink;
pub(crate) use send::SendLink;

use crate::error::{ChannelError, Result};
use channel_types::{BufferDescriptor, DataItem};
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// Readiness callback installed by a selector
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Endpoint that a [`Selector`](crate::Selector) can wait on
pub trait Selectable: Send + Sync {
    fn name(&self) -> &str;

    /// Ready to proceed without blocking.
    ///
    /// An endpoint whose peer has joined is ready too: the operation fails
    /// at once with `Disconnected` instead of blocking. An endpoint that was
    /// joined itself is never ready.
    fn probe(&self) -> bool;

    /// Install or clear the readiness callback; replaces any previous one
    fn set_observer(&self, observer: Option<Observer>);
}

/// State common to both endpoint kinds
pub(crate) struct EndpointCore {
    name: String,
    descriptor: BufferDescriptor,
    depth: NonZeroUsize,
    started: AtomicBool,
    done: AtomicBool,
    observer: Mutex<Option<Observer>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl EndpointCore {
    pub(crate) fn new(name: String, descriptor: BufferDescriptor, depth: NonZeroUsize) -> Self {
        Self {
            name,
            descriptor,
            depth,
            started: AtomicBool::new(false),
            done: AtomicBool::new(false),
            observer: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    pub(crate) fn depth(&self) -> NonZeroUsize {
        self.depth
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Flip the done flag; false if it was already set
    pub(crate) fn mark_done(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }

    /// Fail fast on endpoints that cannot carry traffic
    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.is_done() {
            return Err(ChannelError::joined(&self.name));
        }
        if !self.is_started() {
            return Err(ChannelError::not_started(&self.name));
        }
        Ok(())
    }

    /// Spawn the listener once; later calls are no-ops
    pub(crate) fn spawn_listener<F>(&self, role: &str, body: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_done() {
            return Err(ChannelError::joined(&self.name));
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let handle = thread::Builder::new()
            .name(format!("{}.{}", self.name, role))
            .spawn(body)
            .map_err(|e| {
                self.started.store(false, Ordering::Release);
                ChannelError::io(format!("Failed to spawn {} listener for '{}'", role, self.name), e)
            })?;
        *self.listener.lock() = Some(handle);

        debug!(endpoint = %self.name, role, "Endpoint listener started");
        Ok(())
    }

    /// True while the listener thread is alive
    pub(crate) fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub(crate) fn set_observer(&self, observer: Option<Observer>) {
        *self.observer.lock() = observer;
    }

    /// Call the observer outside the lock
    pub(crate) fn notify_observer(&self) {
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer();
        }
    }

    pub(crate) fn check_item(&self, item: &DataItem) -> Result<()> {
        if item.shape() != self.descriptor.shape() {
            return Err(ChannelError::ShapeMismatch {
                endpoint: self.name.clone(),
                expected: self.descriptor.shape().to_vec(),
                actual: item.shape().to_vec(),
            });
        }
        if item.element_type() != self.descriptor.element_type() {
            return Err(ChannelError::TypeMismatch {
                endpoint: self.name.clone(),
                expected: self.descriptor.element_type(),
                actual: item.element_type(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for EndpointCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointCore")
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("started", &self.is_started())
            .field("done", &self.is_done())
            .finish()
    }
}

/// `None` when the deadline is too far out to represent
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

pub(crate) fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
