//! Fixed-slot ring over a shared memory segment

use crate::error::{ChannelError, Result};
use crate::shm::Segment;
use bytes::Bytes;
use channel_types::BufferDescriptor;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;

/// Slot position that can only ever hold a value below the ring depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    depth: NonZeroUsize,
}

impl Cursor {
    pub fn new(depth: NonZeroUsize) -> Self {
        Self { index: 0, depth }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Move to the next slot, wrapping at the depth
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.depth.get();
    }
}

/// `depth` slots of `item_bytes` each, laid out back to back in one segment.
///
/// Slot `i` occupies `[i * item_bytes, (i + 1) * item_bytes)`.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    segment: Arc<Segment>,
    item_bytes: usize,
    depth: NonZeroUsize,
}

impl RingBuffer {
    pub fn new(segment: Arc<Segment>, descriptor: &BufferDescriptor, depth: usize) -> Result<Self> {
        let depth = NonZeroUsize::new(depth).ok_or_else(|| ChannelError::InvalidSpec {
            message: "ring depth must be at least 1".to_string(),
        })?;
        let needed = descriptor
            .ring_bytes(depth.get())
            .ok_or_else(|| ChannelError::Allocation {
                requested: usize::MAX,
                message: "ring size overflows usize".to_string(),
            })?;
        if segment.len() < needed {
            return Err(ChannelError::Allocation {
                requested: needed,
                message: format!("segment {} holds only {} bytes", segment.name(), segment.len()),
            });
        }

        Ok(Self {
            segment,
            item_bytes: descriptor.item_bytes(),
            depth,
        })
    }

    pub fn depth(&self) -> NonZeroUsize {
        self.depth
    }

    pub fn item_bytes(&self) -> usize {
        self.item_bytes
    }

    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    fn slot_range(&self, cursor: Cursor) -> Range<usize> {
        let start = cursor.index() * self.item_bytes;
        start..start + self.item_bytes
    }

    /// Copy one item into the slot under `cursor`.
    ///
    /// # Safety
    ///
    /// The caller must own the slot: the receiver has released it and has
    /// not been told it is filled again.
    pub unsafe fn write_slot(&self, cursor: Cursor, item: &[u8]) {
        debug_assert_eq!(cursor.depth, self.depth);
        debug_assert_eq!(item.len(), self.item_bytes);
        self.segment.write(self.slot_range(cursor).start, item);
    }

    /// Copy the slot under `cursor` out of the ring.
    ///
    /// # Safety
    ///
    /// The slot must have been filled and not yet released back to the sender.
    pub unsafe fn read_slot(&self, cursor: Cursor) -> Bytes {
        debug_assert_eq!(cursor.depth, self.depth);
        let mut out = vec![0u8; self.item_bytes];
        self.segment.read(self.slot_range(cursor).start, &mut out);
        Bytes::from(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::{SegmentKind, SharedMemoryManager};
    use channel_types::ElementType;

    fn ring(depth: usize) -> RingBuffer {
        let descriptor = BufferDescriptor::new(vec![2], ElementType::U16).unwrap();
        let manager = SharedMemoryManager::new();
        let segment = manager
            .allocate(SegmentKind::Heap, descriptor.ring_bytes(depth).unwrap())
            .unwrap();
        RingBuffer::new(segment, &descriptor, depth).unwrap()
    }

    #[test]
    fn test_cursor_wraps() {
        let mut cursor = Cursor::new(NonZeroUsize::new(3).unwrap());
        let seen: Vec<usize> = (0..7)
            .map(|_| {
                let i = cursor.index();
                cursor.advance();
                i
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_slots_do_not_overlap() {
        let ring = ring(3);
        let mut cursor = Cursor::new(ring.depth());
        for slot in 0..3u8 {
            unsafe { ring.write_slot(cursor, &[slot; 4]) };
            cursor.advance();
        }
        for slot in 0..3u8 {
            assert_eq!(unsafe { ring.read_slot(cursor) }.as_ref(), &[slot; 4]);
            cursor.advance();
        }
    }

    #[test]
    fn test_undersized_segment_rejected() {
        let descriptor = BufferDescriptor::new(vec![4], ElementType::F64).unwrap();
        let manager = SharedMemoryManager::new();
        let segment = manager.allocate(SegmentKind::Heap, 32).unwrap();
        assert!(RingBuffer::new(Arc::clone(&segment), &descriptor, 2).is_err());
        assert!(RingBuffer::new(segment, &descriptor, 0).is_err());
    }
}
