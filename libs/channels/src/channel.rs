//! Channel: one send endpoint, one receive endpoint, one data path

use crate::endpoint::{RecvEndpoint, RecvLink, SendEndpoint, SendLink};
use crate::error::{ChannelError, Result};
use crate::ring::RingBuffer;
use crate::semaphore::Semaphore;
use crate::shm::{SegmentKind, SharedMemoryManager};
use crate::socket::{stream_pair, FrameWriter};
use channel_types::{BufferDescriptor, ChannelBackend};
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// A bounded, typed FIFO between exactly one producer and one consumer
#[derive(Debug, Clone)]
pub struct Channel {
    backend: ChannelBackend,
    descriptor: BufferDescriptor,
    depth: usize,
    synchronized: bool,
    segment: Option<String>,
    send: SendEndpoint,
    recv: RecvEndpoint,
}

fn nonzero_depth(depth: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(depth).ok_or_else(|| ChannelError::InvalidSpec {
        message: "channel depth must be at least 1".to_string(),
    })
}

impl Channel {
    /// Ring-backed channel in a segment taken from `allocator`.
    ///
    /// `backend` must be one of the shared-memory kinds; it picks the
    /// segment flavour.
    pub fn shared_memory(
        allocator: &SharedMemoryManager,
        backend: ChannelBackend,
        src_name: impl Into<String>,
        dst_name: impl Into<String>,
        descriptor: BufferDescriptor,
        depth: usize,
    ) -> Result<Self> {
        if !backend.is_shared_memory() {
            return Err(ChannelError::unsupported(
                backend,
                "not a shared-memory backend",
            ));
        }
        let kind = if backend == ChannelBackend::NativeSharedMemory {
            SegmentKind::Mapped
        } else {
            SegmentKind::Heap
        };
        let depth_nz = nonzero_depth(depth)?;
        let bytes = descriptor
            .ring_bytes(depth)
            .ok_or_else(|| ChannelError::Allocation {
                requested: usize::MAX,
                message: "ring size overflows usize".to_string(),
            })?;

        let segment = allocator.allocate(kind, bytes)?;
        let segment_name = segment.name().to_string();
        let ring = RingBuffer::new(segment, &descriptor, depth)?;

        let slots_filled = Arc::new(Semaphore::new(0));
        let slots_freed = Arc::new(Semaphore::new(0));

        let send = SendEndpoint::new(
            src_name.into(),
            descriptor.clone(),
            depth_nz,
            SendLink::Ring {
                ring: ring.clone(),
                slots_filled: Arc::clone(&slots_filled),
            },
            Arc::clone(&slots_freed),
        );
        let recv = RecvEndpoint::new(
            dst_name.into(),
            descriptor.clone(),
            depth_nz,
            RecvLink::Ring { ring, slots_filled },
            slots_freed,
        );

        debug!(
            backend = %backend,
            segment = %segment_name,
            src = %send.name(),
            dst = %recv.name(),
            depth,
            item_bytes = descriptor.item_bytes(),
            "Created shared memory channel"
        );

        Ok(Self {
            backend,
            descriptor,
            depth,
            synchronized: false,
            segment: Some(segment_name),
            send,
            recv,
        })
    }

    /// Channel over a connected local socket pair
    pub fn socket(
        src_name: impl Into<String>,
        dst_name: impl Into<String>,
        descriptor: BufferDescriptor,
        depth: usize,
    ) -> Result<Self> {
        let depth_nz = nonzero_depth(depth)?;
        let (writer, reader) =
            stream_pair().map_err(|e| ChannelError::io("Failed to create socket pair", e))?;
        let slots_freed = Arc::new(Semaphore::new(0));

        let send = SendEndpoint::new(
            src_name.into(),
            descriptor.clone(),
            depth_nz,
            SendLink::Socket {
                stream: writer,
                writer: Mutex::new(FrameWriter::new(descriptor.item_bytes())),
            },
            Arc::clone(&slots_freed),
        );
        let recv = RecvEndpoint::new(
            dst_name.into(),
            descriptor.clone(),
            depth_nz,
            RecvLink::Socket { stream: reader },
            slots_freed,
        );

        debug!(
            src = %send.name(),
            dst = %recv.name(),
            depth,
            "Created socket channel"
        );

        Ok(Self {
            backend: ChannelBackend::Socket,
            descriptor,
            depth,
            synchronized: false,
            segment: None,
            send,
            recv,
        })
    }

    /// Mark the channel as carrying synchronization traffic
    pub fn synchronized(mut self) -> Self {
        self.synchronized = true;
        self
    }

    /// Transport this channel was built on
    pub fn backend(&self) -> ChannelBackend {
        self.backend
    }

    /// Layout shared by both endpoints
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Ring depth in slots
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True for channels carrying synchronization traffic
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Name of the backing segment, for ring-backed channels
    pub fn segment_name(&self) -> Option<&str> {
        self.segment.as_deref()
    }

    /// Sending half
    pub fn src_port(&self) -> &SendEndpoint {
        &self.send
    }

    /// Receiving half
    pub fn dst_port(&self) -> &RecvEndpoint {
        &self.recv
    }

    /// Split into the two endpoints, for handing each to its own actor
    pub fn into_endpoints(self) -> (SendEndpoint, RecvEndpoint) {
        (self.send, self.recv)
    }

    /// Start both endpoints
    pub fn start(&self) -> Result<()> {
        self.send.start()?;
        self.recv.start()
    }

    /// Join both endpoints
    pub fn join(&self) {
        self.send.join();
        self.recv.join();
    }
}
