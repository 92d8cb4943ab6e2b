//! Shared memory segments and their allocator
//!
//! Every shared-memory channel owns one [`Segment`] sized
//! `depth x item_bytes`. Segments come from a [`SharedMemoryManager`]
//! owned by the process manager, which names them, tracks the bytes handed
//! out and stops handing out more once torn down.
//!
//! Two kinds of segment exist:
//!
//! - [`SegmentKind::Heap`]: a zeroed arena owned by this library
//! - [`SegmentKind::Mapped`]: an anonymous `mmap` region
//!
//! Workers are threads of one process, so both kinds are visible to every
//! endpoint. Segments are reference counted: releasing the allocator
//! forgets them, and the memory goes away once the last endpoint holding
//! it is dropped.

use crate::error::{ChannelError, Result};
use memmap2::MmapMut;
use parking_lot::Mutex;
use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Library-internal heap arena
    Heap,
    /// Anonymous memory mapping
    Mapped,
}

enum Backing {
    Heap(#[allow(dead_code)] Box<[UnsafeCell<u8>]>),
    Mapped(#[allow(dead_code)] MmapMut),
}

/// Fixed-size block of memory shared by the two endpoints of a channel
pub struct Segment {
    name: String,
    kind: SegmentKind,
    len: usize,
    base: NonNull<u8>,
    // Keeps the memory behind `base` alive
    _backing: Backing,
}

// Safety: the segment is a plain byte region. Concurrent access to the same
// bytes is ruled out by the callers of `write`/`read` (the ring handshake).
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    fn heap(name: String, len: usize) -> Result<Self> {
        let mut cells: Vec<UnsafeCell<u8>> = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|e| ChannelError::Allocation {
                requested: len,
                message: e.to_string(),
            })?;
        cells.resize_with(len, || UnsafeCell::new(0));
        let cells = cells.into_boxed_slice();

        // UnsafeCell<u8> has the layout of u8 and permits writes through a shared borrow
        let base = NonNull::new(cells.as_ptr() as *mut u8).ok_or(ChannelError::Allocation {
            requested: len,
            message: "null arena pointer".to_string(),
        })?;

        Ok(Self {
            name,
            kind: SegmentKind::Heap,
            len,
            base,
            _backing: Backing::Heap(cells),
        })
    }

    fn mapped(name: String, len: usize) -> Result<Self> {
        let mut map = MmapMut::map_anon(len).map_err(|e| ChannelError::Allocation {
            requested: len,
            message: e.to_string(),
        })?;
        let base = NonNull::new(map.as_mut_ptr()).ok_or(ChannelError::Allocation {
            requested: len,
            message: "null mapping pointer".to_string(),
        })?;

        Ok(Self {
            name,
            kind: SegmentKind::Mapped,
            len,
            base,
            _backing: Backing::Mapped(map),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `src` into the segment at `offset`.
    ///
    /// # Safety
    ///
    /// No other thread may read or write `offset..offset + src.len()` while
    /// this runs.
    pub(crate) unsafe fn write(&self, offset: usize, src: &[u8]) {
        assert!(
            offset.checked_add(src.len()).is_some_and(|end| end <= self.len),
            "segment write out of bounds"
        );
        std::ptr::copy_nonoverlapping(src.as_ptr(), self.base.as_ptr().add(offset), src.len());
    }

    /// Copy `dst.len()` bytes out of the segment at `offset`.
    ///
    /// # Safety
    ///
    /// No other thread may write `offset..offset + dst.len()` while this runs.
    pub(crate) unsafe fn read(&self, offset: usize, dst: &mut [u8]) {
        assert!(
            offset.checked_add(dst.len()).is_some_and(|end| end <= self.len),
            "segment read out of bounds"
        );
        std::ptr::copy_nonoverlapping(self.base.as_ptr().add(offset), dst.as_mut_ptr(), dst.len());
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("len", &self.len)
            .finish()
    }
}

#[derive(Debug, Default)]
struct AllocatorState {
    segments: HashMap<String, Arc<Segment>>,
    allocated_bytes: usize,
    released: bool,
}

/// Allocator for channel segments, owned by the process manager
#[derive(Debug, Default)]
pub struct SharedMemoryManager {
    state: Mutex<AllocatorState>,
}

impl SharedMemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zero-filled segment of `bytes` bytes
    pub fn allocate(&self, kind: SegmentKind, bytes: usize) -> Result<Arc<Segment>> {
        if bytes == 0 {
            return Err(ChannelError::Allocation {
                requested: 0,
                message: "segment size must be positive".to_string(),
            });
        }

        let mut state = self.state.lock();
        if state.released {
            return Err(ChannelError::AllocatorClosed);
        }

        let name = format!("shm-{}", Uuid::new_v4().simple());
        let segment = Arc::new(match kind {
            SegmentKind::Heap => Segment::heap(name.clone(), bytes)?,
            SegmentKind::Mapped => Segment::mapped(name.clone(), bytes)?,
        });

        state.allocated_bytes += bytes;
        state.segments.insert(name, Arc::clone(&segment));
        debug!(
            segment = %segment.name(),
            kind = ?kind,
            bytes,
            "Allocated shared memory segment"
        );
        Ok(segment)
    }

    /// Forget every segment and refuse further allocations. Idempotent.
    pub fn release_all(&self) -> usize {
        let mut state = self.state.lock();
        if state.released {
            return 0;
        }
        state.released = true;
        let count = state.segments.len();
        state.segments.clear();
        info!(
            segments = count,
            bytes = state.allocated_bytes,
            "Released shared memory allocator"
        );
        state.allocated_bytes = 0;
        count
    }

    pub fn segment_count(&self) -> usize {
        self.state.lock().segments.len()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.state.lock().allocated_bytes
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }
}
