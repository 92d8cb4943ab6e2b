//! Send endpoint

use super::{deadline_after, timeout_ms, EndpointCore, Observer, Selectable};
use crate::error::{ChannelError, Result};
use crate::ring::{Cursor, RingBuffer};
use crate::semaphore::Semaphore;
use crate::socket::FrameWriter;
use channel_types::{BufferDescriptor, DataItem};
use parking_lot::Mutex;
use std::io;
use std::net::Shutdown;
use std::num::NonZeroUsize;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Where the sender puts item bytes
pub(crate) enum SendLink {
    Ring {
        ring: RingBuffer,
        slots_filled: Arc<Semaphore>,
    },
    Socket {
        stream: UnixStream,
        writer: Mutex<FrameWriter>,
    },
}

struct SendInner {
    core: EndpointCore,
    link: SendLink,
    /// Released by the receiver after it consumed a slot
    slots_freed: Arc<Semaphore>,
    /// Free slots as seen by this side
    capacity: Semaphore,
    /// Held across a whole send so slot writes stay in order
    cursor: Mutex<Cursor>,
}

/// Producer half of a channel. Cloning yields another handle to the same endpoint.
#[derive(Clone)]
pub struct SendEndpoint {
    inner: Arc<SendInner>,
}

impl SendEndpoint {
    pub(crate) fn new(
        name: String,
        descriptor: BufferDescriptor,
        depth: NonZeroUsize,
        link: SendLink,
        slots_freed: Arc<Semaphore>,
    ) -> Self {
        Self {
            inner: Arc::new(SendInner {
                core: EndpointCore::new(name, descriptor, depth),
                link,
                slots_freed,
                capacity: Semaphore::bounded(depth.get()),
                cursor: Mutex::new(Cursor::new(depth)),
            }),
        }
    }

    /// Endpoint name used in logs and errors
    pub fn name(&self) -> &str {
        self.inner.core.name()
    }

    /// Layout every item on this endpoint must match
    pub fn descriptor(&self) -> &BufferDescriptor {
        self.inner.core.descriptor()
    }

    /// Item shape
    pub fn shape(&self) -> &[usize] {
        self.inner.core.descriptor().shape()
    }

    /// Ring depth in slots
    pub fn depth(&self) -> usize {
        self.inner.core.depth().get()
    }

    /// Start the acknowledgment listener. Calling it again is a no-op.
    pub fn start(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .core
            .spawn_listener("send", move || inner.acknowledge_loop())
    }

    /// Copy `item` into the next slot, blocking while the ring is full
    pub fn send(&self, item: &DataItem) -> Result<()> {
        self.inner.send_until(item, None, None)
    }

    /// Like [`send`](Self::send) but gives up after `timeout`
    pub fn send_timeout(&self, item: &DataItem, timeout: Duration) -> Result<()> {
        self.inner
            .send_until(item, deadline_after(timeout), Some(timeout))
    }

    /// Mark the endpoint done and tell the receiver no more items follow.
    /// Idempotent.
    pub fn join(&self) {
        let inner = &self.inner;
        if !inner.core.mark_done() {
            return;
        }

        inner.capacity.close();
        match &inner.link {
            SendLink::Ring { slots_filled, .. } => slots_filled.close(),
            SendLink::Socket { stream, .. } => {
                if let Err(e) = stream.shutdown(Shutdown::Write) {
                    debug!(endpoint = %inner.core.name(), error = %e, "Socket already shut down");
                }
            }
        }
        debug!(endpoint = %inner.core.name(), "Send endpoint joined");
    }

    /// True once `start` has been called
    pub fn is_started(&self) -> bool {
        self.inner.core.is_started()
    }

    /// True once `join` has been called
    pub fn is_joined(&self) -> bool {
        self.inner.core.is_done()
    }

    /// True while the acknowledgment listener thread is running
    pub fn is_listening(&self) -> bool {
        self.inner.core.is_listening()
    }
}

impl SendInner {
    fn send_until(
        &self,
        item: &DataItem,
        deadline: Option<Instant>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let name = self.core.name();
        self.core.ensure_usable()?;
        self.core.check_item(item)?;
        if self.slots_freed.is_closed() {
            return Err(ChannelError::disconnected(name));
        }

        let mut cursor = self.cursor.lock();
        match self.capacity.acquire_until(deadline) {
            Ok(true) => {}
            Ok(false) => {
                return Err(ChannelError::timeout(
                    format!("send on '{}'", name),
                    timeout.map(timeout_ms).unwrap_or_default(),
                ))
            }
            Err(_) if self.core.is_done() => return Err(ChannelError::joined(name)),
            Err(_) => return Err(ChannelError::disconnected(name)),
        }
        if self.core.is_done() {
            return Err(ChannelError::joined(name));
        }

        match &self.link {
            SendLink::Ring { ring, slots_filled } => {
                // Safety: holding a capacity permit means the receiver has
                // released the slot under the cursor and will not touch it
                // until `slots_filled` is signalled below.
                unsafe { ring.write_slot(*cursor, item.as_bytes()) };
                cursor.advance();
                slots_filled.release();
            }
            SendLink::Socket { stream, writer } => {
                if let Err(e) = writer.lock().write_frame(stream, item.as_bytes()) {
                    // Nothing reached the receiver, so the slot is still free
                    self.capacity.release();
                    return Err(match e.kind() {
                        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
                            ChannelError::disconnected(name)
                        }
                        _ => ChannelError::io(format!("Failed to write frame on '{}'", name), e),
                    });
                }
                cursor.advance();
            }
        }

        trace!(endpoint = %name, "Item sent");
        Ok(())
    }

    fn probe(&self) -> bool {
        self.core.is_started()
            && !self.core.is_done()
            && (self.capacity.permits() > 0 || self.slots_freed.is_closed())
    }

    /// One capacity permit per acknowledgment until the receiver goes away
    fn acknowledge_loop(&self) {
        loop {
            if self.slots_freed.acquire().is_err() {
                debug!(endpoint = %self.core.name(), "Receiver joined; send listener exiting");
                self.capacity.close();
                if !self.core.is_done() {
                    // Sends now fail at once, which a waiting selector must see
                    self.core.notify_observer();
                }
                break;
            }
            if self.core.is_done() {
                break;
            }

            let was_ready = self.probe();
            self.capacity.release();
            if !was_ready {
                self.core.notify_observer();
            }
        }
    }
}

impl Selectable for SendEndpoint {
    fn name(&self) -> &str {
        self.inner.core.name()
    }

    /// True when a `send` would not block: a slot is free, or the receiver
    /// is gone and `send` fails at once with `Disconnected`
    fn probe(&self) -> bool {
        self.inner.probe()
    }

    fn set_observer(&self, observer: Option<Observer>) {
        self.inner.core.set_observer(observer);
    }
}

impl std::fmt::Debug for SendEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendEndpoint")
            .field("core", &self.inner.core)
            .field("capacity", &self.inner.capacity.permits())
            .finish()
    }
}
