//! Buffer descriptors and data items
//!
//! A [`BufferDescriptor`] fixes the layout of every slot in a channel's ring:
//! `item_bytes = product(shape) x element width`. A [`DataItem`] is one owned
//! value with that layout, the unit passed to `send` and returned by `recv`.

use crate::element::{Element, ElementType};
use crate::error::{Result, TypeError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Shape, element type and derived per-item byte size.
///
/// Only shape and element type are (de)serialized; the byte size is always
/// re-derived so it cannot disagree with them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DescriptorLayout", into = "DescriptorLayout")]
pub struct BufferDescriptor {
    shape: Vec<usize>,
    element_type: ElementType,
    item_bytes: usize,
}

impl BufferDescriptor {
    /// Build a descriptor, rejecting empty shapes and zero dimensions
    pub fn new(shape: Vec<usize>, element_type: ElementType) -> Result<Self> {
        let item_bytes = item_bytes_for(&shape, element_type)?;
        Ok(Self {
            shape,
            element_type,
            item_bytes,
        })
    }

    /// Dimensions of one item
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Scalar type of every element
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Bytes occupied by one item; always positive
    pub fn item_bytes(&self) -> usize {
        self.item_bytes
    }

    /// Number of scalar elements in one item
    pub fn element_count(&self) -> usize {
        self.item_bytes / self.element_type.width()
    }

    /// Bytes needed for a ring of `depth` slots
    pub fn ring_bytes(&self, depth: usize) -> Option<usize> {
        self.item_bytes.checked_mul(depth)
    }
}

/// Wire form of a descriptor
#[derive(Serialize, Deserialize)]
struct DescriptorLayout {
    shape: Vec<usize>,
    element_type: ElementType,
}

impl TryFrom<DescriptorLayout> for BufferDescriptor {
    type Error = TypeError;

    fn try_from(layout: DescriptorLayout) -> Result<Self> {
        Self::new(layout.shape, layout.element_type)
    }
}

impl From<BufferDescriptor> for DescriptorLayout {
    fn from(descriptor: BufferDescriptor) -> Self {
        Self {
            shape: descriptor.shape,
            element_type: descriptor.element_type,
        }
    }
}

fn item_bytes_for(shape: &[usize], element_type: ElementType) -> Result<usize> {
    if shape.is_empty() || shape.iter().any(|&d| d == 0) {
        return Err(TypeError::invalid_shape(shape));
    }
    let width = element_type.width();
    shape
        .iter()
        .try_fold(width, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| TypeError::SizeOverflow {
            shape: shape.to_vec(),
            width,
        })
}

/// One shaped, typed item travelling through a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    shape: Vec<usize>,
    element_type: ElementType,
    data: Bytes,
}

impl DataItem {
    /// Wrap raw bytes, checking the length against shape x width
    pub fn new(shape: Vec<usize>, element_type: ElementType, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let expected = item_bytes_for(&shape, element_type)?;
        if data.len() != expected {
            return Err(TypeError::length_mismatch(expected, data.len()));
        }
        Ok(Self {
            shape,
            element_type,
            data,
        })
    }

    /// Copy a typed slice into a new item
    pub fn from_slice<T: Element>(shape: Vec<usize>, values: &[T]) -> Result<Self> {
        let bytes = Bytes::copy_from_slice(bytemuck::cast_slice(values));
        Self::new(shape, T::TYPE, bytes)
    }

    /// All-zero item matching a descriptor
    pub fn zeros(descriptor: &BufferDescriptor) -> Self {
        Self {
            shape: descriptor.shape.clone(),
            element_type: descriptor.element_type,
            data: Bytes::from(vec![0u8; descriptor.item_bytes]),
        }
    }

    /// Dimensions of this item
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Raw little-endian element bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Descriptor describing this item's layout
    pub fn descriptor(&self) -> BufferDescriptor {
        BufferDescriptor {
            shape: self.shape.clone(),
            element_type: self.element_type,
            item_bytes: self.data.len(),
        }
    }

    /// Copy the elements out as a typed vector
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::TYPE != self.element_type {
            return Err(TypeError::ElementMismatch {
                actual: self.element_type,
                requested: T::TYPE,
            });
        }
        Ok(self
            .data
            .chunks_exact(self.element_type.width())
            .map(bytemuck::pod_read_unaligned::<T>)
            .collect())
    }
}
