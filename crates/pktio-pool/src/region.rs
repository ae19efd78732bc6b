//! Backing memory regions.
//!
//! The shared-memory allocator proper is out of scope (spec §1: "shared-memory
//! allocator ... used as an abstract service"). This module is the minimal
//! concrete stand-in the pool needs to run stand-alone: a byte region that is
//! either process-private (heap) or process-shared (`mmap(MAP_SHARED |
//! MAP_ANONYMOUS)`), selected by the `shareable` flag spec §4.2 says `create`
//! passes through for packet pools ("packet-typed memory must be shareable
//! across processes").

use crate::error::PoolError;
use std::ptr::NonNull;

/// A fixed-size, zero-initialized byte region.
pub struct Region {
    ptr: NonNull<u8>,
    len: usize,
    shared: bool,
}

// Safety: the region is plain bytes; synchronization of what's stored in it
// is the caller's responsibility (mirrors `Pool`'s own Send/Sync reasoning).
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Reserves `len` bytes, zero-initialized. `shareable` requests
    /// process-shared mapping (required for packet-typed pools).
    pub fn reserve(len: usize, shareable: bool) -> Result<Self, PoolError> {
        if len == 0 {
            return Err(PoolError::BadParams("zero-length region"));
        }

        #[cfg(unix)]
        if shareable {
            return Self::reserve_mmap(len);
        }

        Self::reserve_heap(len)
    }

    #[cfg(unix)]
    fn reserve_mmap(len: usize) -> Result<Self, PoolError> {
        use libc::{mmap, MAP_ANONYMOUS, MAP_FAILED, MAP_SHARED, PROT_READ, PROT_WRITE};
        use std::ptr;

        let addr = unsafe {
            mmap(
                ptr::null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_SHARED | MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == MAP_FAILED {
            return Err(PoolError::NoMemory);
        }
        // mmap with MAP_ANONYMOUS returns zeroed pages already.
        Ok(Self {
            ptr: NonNull::new(addr.cast()).ok_or(PoolError::NoMemory)?,
            len,
            shared: true,
        })
    }

    fn reserve_heap(len: usize) -> Result<Self, PoolError> {
        let mut buf = vec![0u8; len].into_boxed_slice();
        let ptr = NonNull::new(buf.as_mut_ptr()).ok_or(PoolError::NoMemory)?;
        std::mem::forget(buf);
        Ok(Self { ptr, len, shared: false })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.shared
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        #[cfg(unix)]
        if self.shared {
            unsafe {
                libc::munmap(self.ptr.as_ptr().cast(), self.len);
            }
            return;
        }
        unsafe {
            drop(Box::from_raw(std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)));
        }
    }
}
