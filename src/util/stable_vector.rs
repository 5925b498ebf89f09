//! Fixed-capacity vector with stable element addresses.
//!
//! Argument marshaling takes raw pointers to elements before the vector
//! is fully populated, so the backing storage must never reallocate. The
//! buffer is heap-allocated once at exact capacity; pushing past it is a
//! bug in the caller and panics.

use std::mem::MaybeUninit;

pub struct StableVector<T> {
    buf: Box<[MaybeUninit<T>]>,
    len: usize,
}

impl<T> StableVector<T> {
    /// Allocates the full backing buffer up front. The capacity is final.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, MaybeUninit::uninit);
        Self {
            buf: buf.into_boxed_slice(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Appends an element and returns a reference to it. The reference's
    /// address stays valid for the life of the vector.
    pub fn push(&mut self, value: T) -> &mut T {
        assert!(
            self.len < self.buf.len(),
            "cannot push element, size would exceed capacity"
        );
        let slot = &mut self.buf[self.len];
        self.len += 1;
        slot.write(value)
    }

    pub fn as_slice(&self) -> &[T] {
        // Elements 0..len are always initialized.
        unsafe { std::slice::from_raw_parts(self.buf.as_ptr().cast::<T>(), self.len) }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<T> Drop for StableVector<T> {
    fn drop(&mut self) {
        for slot in &mut self.buf[..self.len] {
            unsafe { slot.assume_init_drop() };
        }
    }
}
