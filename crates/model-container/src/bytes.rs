// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared ownership of container bytes.
//!
//! Kernel code and constant payloads are never copied out of the container.
//! Instead every consumer holds a [`ByteView`]: a strong handle to the
//! owning buffer plus an `(offset, len)` window into it.
//!
//! ```text
//!   SharedBytes ──Arc──┬── ByteView { offset: 72,   len: 4096 }  (kernel code)
//!                      ├── ByteView { offset: 4168, len: 64 }    (constant)
//!                      └── ...
//! ```
//!
//! The buffer lives as long as any view does, so no view can dangle.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::ContainerError;

type Owner = Arc<dyn AsRef<[u8]> + Send + Sync>;

/// A reference-counted, immutable byte buffer.
///
/// Backed either by heap memory or by a read-only memory map.
#[derive(Clone)]
pub struct SharedBytes {
    owner: Owner,
}

impl SharedBytes {
    /// Wraps an owned vector.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            owner: Arc::new(bytes),
        }
    }

    /// Memory-maps a file read-only.
    pub fn map_file(path: &Path) -> Result<Self, ContainerError> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the map is read-only and model files are not expected to
        // be modified while a runtime has them open.
        let mmap = unsafe { memmap2::Mmap::map(&file) }?;
        tracing::debug!(path = %path.display(), len = mmap.len(), "Mapped container file");
        Ok(Self {
            owner: Arc::new(mmap),
        })
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        (*self.owner).as_ref()
    }

    /// Returns a view covering the whole buffer.
    pub fn view(&self) -> ByteView {
        ByteView {
            owner: Arc::clone(&self.owner),
            offset: 0,
            len: self.len(),
        }
    }
}

impl From<Vec<u8>> for SharedBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl fmt::Debug for SharedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBytes").field("len", &self.len()).finish()
    }
}

/// A window `(offset, len)` into a [`SharedBytes`] buffer that keeps the
/// buffer alive.
#[derive(Clone)]
pub struct ByteView {
    owner: Owner,
    offset: usize,
    len: usize,
}

impl ByteView {
    pub fn as_slice(&self) -> &[u8] {
        &(*self.owner).as_ref()[self.offset..self.offset + self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of this view within the owning buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns a sub-view relative to this view, checking bounds.
    pub fn slice(&self, offset: usize, len: usize) -> Result<ByteView, ContainerError> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.len)
            .ok_or(ContainerError::ViewOutOfBounds {
                offset,
                len,
                available: self.len,
            })?;
        Ok(ByteView {
            owner: Arc::clone(&self.owner),
            offset: self.offset + offset,
            len: end - offset,
        })
    }

    /// Returns the sub-view starting at `offset` and running to the end.
    pub fn slice_from(&self, offset: usize) -> Result<ByteView, ContainerError> {
        let len = self
            .len
            .checked_sub(offset)
            .ok_or(ContainerError::ViewOutOfBounds {
                offset,
                len: 0,
                available: self.len,
            })?;
        self.slice(offset, len)
    }

    /// Returns `true` if both views share the same owning buffer.
    pub fn shares_owner(&self, other: &ByteView) -> bool {
        Arc::ptr_eq(&self.owner, &other.owner)
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<SharedBytes> for ByteView {
    fn from(bytes: SharedBytes) -> Self {
        bytes.view()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(bytes: Vec<u8>) -> Self {
        SharedBytes::from_vec(bytes).view()
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}
