//! Receive endpoint

use super::{deadline_after, timeout_ms, EndpointCore, Observer, Selectable};
use crate::error::{ChannelError, Result};
use crate::queue::{ReadinessQueue, Token, WaitError};
use crate::ring::{Cursor, RingBuffer};
use crate::semaphore::Semaphore;
use crate::socket::FrameReader;
use bytes::Bytes;
use channel_types::{BufferDescriptor, DataItem};
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Where the receiver learns about and finds item bytes
pub(crate) enum RecvLink {
    Ring {
        ring: RingBuffer,
        slots_filled: Arc<Semaphore>,
    },
    Socket {
        stream: UnixStream,
    },
}

struct RecvInner {
    core: EndpointCore,
    link: RecvLink,
    /// Released here after each consumed slot
    slots_freed: Arc<Semaphore>,
    queue: ReadinessQueue,
    cursor: Mutex<Cursor>,
}

/// Consumer half of a channel. Cloning yields another handle to the same endpoint.
#[derive(Clone)]
pub struct RecvEndpoint {
    inner: Arc<RecvInner>,
}

impl RecvEndpoint {
    pub(crate) fn new(
        name: String,
        descriptor: BufferDescriptor,
        depth: NonZeroUsize,
        link: RecvLink,
        slots_freed: Arc<Semaphore>,
    ) -> Self {
        Self {
            inner: Arc::new(RecvInner {
                core: EndpointCore::new(name, descriptor, depth),
                link,
                slots_freed,
                queue: ReadinessQueue::new(),
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

    /// Start the fill listener. Calling it again is a no-op.
    pub fn start(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        match &self.inner.link {
            RecvLink::Ring { slots_filled, .. } => {
                let slots_filled = Arc::clone(slots_filled);
                self.inner
                    .core
                    .spawn_listener("recv", move || inner.fill_loop(&slots_filled))
            }
            RecvLink::Socket { stream } => {
                if self.inner.core.is_started() {
                    return Ok(());
                }
                let stream = stream.try_clone().map_err(|e| {
                    ChannelError::io(format!("Failed to clone stream for '{}'", self.name()), e)
                })?;
                self.inner
                    .core
                    .spawn_listener("recv", move || inner.frame_loop(stream))
            }
        }
    }

    /// Take the oldest item, blocking while none is available
    pub fn recv(&self) -> Result<DataItem> {
        self.inner.receive(None, None, true)
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<DataItem> {
        self.inner
            .receive(deadline_after(timeout), Some(timeout), true)
    }

    /// Copy of the oldest item without consuming it, blocking while none is available
    pub fn peek(&self) -> Result<DataItem> {
        self.inner.receive(None, None, false)
    }

    /// Mark the endpoint done and release the sender from waiting on it.
    /// Idempotent.
    pub fn join(&self) {
        let inner = &self.inner;
        if !inner.core.mark_done() {
            return;
        }
        inner.queue.mark_joined();
        inner.slots_freed.close();
        debug!(endpoint = %inner.core.name(), "Receive endpoint joined");
    }

    /// Items that have arrived and not yet been received
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// True once `start` has been called
    pub fn is_started(&self) -> bool {
        self.inner.core.is_started()
    }

    /// True once `join` has been called
    pub fn is_joined(&self) -> bool {
        self.inner.core.is_done()
    }

    /// True while the fill listener thread is running
    pub fn is_listening(&self) -> bool {
        self.inner.core.is_listening()
    }
}

impl RecvInner {
    fn receive(
        &self,
        deadline: Option<Instant>,
        timeout: Option<Duration>,
        consume: bool,
    ) -> Result<DataItem> {
        let name = self.core.name();
        self.core.ensure_usable()?;

        let mut cursor = self.cursor.lock();
        let waited = if consume {
            self.queue.pop(deadline)
        } else {
            self.queue.peek(deadline)
        };
        let token = waited.map_err(|e| match e {
            WaitError::Joined => ChannelError::joined(name),
            WaitError::Closed => ChannelError::disconnected(name),
            WaitError::TimedOut => ChannelError::timeout(
                format!("{} on '{}'", if consume { "recv" } else { "peek" }, name),
                timeout.map(timeout_ms).unwrap_or_default(),
            ),
        })?;

        let bytes = self.take_bytes(*cursor, token)?;
        if consume {
            cursor.advance();
            self.slots_freed.release();
            trace!(endpoint = %name, "Item received");
        }

        let descriptor = self.core.descriptor();
        DataItem::new(descriptor.shape().to_vec(), descriptor.element_type(), bytes).map_err(|e| {
            ChannelError::Protocol {
                endpoint: name.to_string(),
                message: e.to_string(),
            }
        })
    }

    fn take_bytes(&self, cursor: Cursor, token: Token) -> Result<Bytes> {
        match (&self.link, token) {
            // Safety: the slot was announced by a readiness token and is only
            // handed back to the sender after this read completes.
            (RecvLink::Ring { ring, .. }, Token::Slot) => Ok(unsafe { ring.read_slot(cursor) }),
            (_, Token::Frame(bytes)) => Ok(bytes),
            (RecvLink::Socket { .. }, Token::Slot) => Err(ChannelError::Protocol {
                endpoint: self.core.name().to_string(),
                message: "slot token on a stream-backed endpoint".to_string(),
            }),
        }
    }

    fn fill_loop(&self, slots_filled: &Semaphore) {
        loop {
            if slots_filled.acquire().is_err() {
                debug!(endpoint = %self.core.name(), "Sender joined; recv listener exiting");
                break;
            }
            if self.core.is_done() {
                break;
            }
            if self.queue.push(Token::Slot) {
                self.core.notify_observer();
            }
        }
        self.close_queue();
    }

    /// No more items will arrive; a waiting selector must see that
    fn close_queue(&self) {
        self.queue.close();
        self.core.notify_observer();
    }

    fn probe(&self) -> bool {
        !self.core.is_done() && self.queue.is_ready()
    }

    fn frame_loop(&self, mut stream: UnixStream) {
        let mut reader = FrameReader::new(self.core.descriptor().item_bytes());
        loop {
            match reader.read_frame(&mut stream) {
                Ok(Some(frame)) => {
                    if self.core.is_done() {
                        break;
                    }
                    if self.queue.push(Token::Frame(frame)) {
                        self.core.notify_observer();
                    }
                }
                Ok(None) => {
                    debug!(endpoint = %self.core.name(), "Sender closed stream; recv listener exiting");
                    break;
                }
                Err(e) => {
                    if !self.core.is_done() {
                        warn!(endpoint = %self.core.name(), error = %e, "Stream read failed");
                    }
                    break;
                }
            }
        }
        self.close_queue();
    }
}

impl Selectable for RecvEndpoint {
    fn name(&self) -> &str {
        self.inner.core.name()
    }

    /// True when a `recv` would not block: an item is pending, or the
    /// sender is gone and `recv` fails at once with `Disconnected`
    fn probe(&self) -> bool {
        self.inner.probe()
    }

    fn set_observer(&self, observer: Option<Observer>) {
        self.inner.core.set_observer(observer);
    }
}

impl std::fmt::Debug for RecvEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecvEndpoint")
            .field("core", &self.inner.core)
            .field("pending", &self.inner.queue.len())
            .finish()
    }
}
