//! Owned storage for a single foreign value.
//!
//! Every foreign type fits in [`MAX_VALUE_SIZE`] bytes. The buffer lives
//! on the heap so that pointers handed to the engine stay valid while the
//! owning `ValueStorage` moves around the stack.

use std::rc::Rc;

use varbridge_abi::{
    AbiTable, ConstValuePtr, UninitValuePtr, UninitVariantPtr, ValuePtr, VariantPtr, VariantTag,
    tags::MAX_VALUE_SIZE,
};

#[repr(C, align(16))]
struct AlignedBytes([u8; MAX_VALUE_SIZE]);

/// A tagged foreign value with known initialization state.
///
/// Construction hands out an uninitialized pointer; callers run a foreign
/// constructor through it and then call [`mark_initialized`]. Drop runs
/// the matching foreign destructor for non-trivial tags.
///
/// [`mark_initialized`]: ValueStorage::mark_initialized
pub struct ValueStorage {
    abi: Rc<AbiTable>,
    tag: VariantTag,
    bytes: Box<AlignedBytes>,
    initialized: bool,
}

impl ValueStorage {
    pub fn new_uninit(abi: Rc<AbiTable>, tag: VariantTag) -> Self {
        Self {
            abi,
            tag,
            bytes: Box::new(AlignedBytes([0u8; MAX_VALUE_SIZE])),
            initialized: false,
        }
    }

    pub fn tag(&self) -> VariantTag {
        self.tag
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn uninit_ptr(&mut self) -> UninitValuePtr {
        debug_assert!(!self.initialized);
        UninitValuePtr::new(self.bytes.0.as_mut_ptr().cast())
    }

    /// Declares that a foreign constructor has run into the buffer.
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub fn ptr(&mut self) -> ValuePtr {
        debug_assert!(self.initialized);
        ValuePtr::new(self.bytes.0.as_mut_ptr().cast())
    }

    pub fn const_ptr(&self) -> ConstValuePtr {
        debug_assert!(self.initialized);
        ConstValuePtr::new(self.bytes.0.as_ptr().cast())
    }

    /// Variant-box view. Only meaningful when the tag is [`VariantTag::Nil`],
    /// which stores a full variant rather than an unwrapped value.
    pub fn variant_ptr(&mut self) -> VariantPtr {
        debug_assert!(self.tag == VariantTag::Nil);
        self.ptr().assume_variant()
    }

    pub fn uninit_variant_ptr(&mut self) -> UninitVariantPtr {
        debug_assert!(self.tag == VariantTag::Nil);
        self.uninit_ptr().assume_variant()
    }

    /// Reads a plain scalar out of the buffer. Only valid for trivially
    /// copyable tags whose representation matches `T`.
    pub unsafe fn read_scalar<T: Copy>(&self) -> T {
        debug_assert!(self.initialized);
        debug_assert!(std::mem::size_of::<T>() <= MAX_VALUE_SIZE);
        unsafe { self.bytes.0.as_ptr().cast::<T>().read_unaligned() }
    }

    pub fn abi(&self) -> &Rc<AbiTable> {
        &self.abi
    }

    /// Runs the foreign destructor now and returns to the uninitialized
    /// state, keeping the buffer for reuse.
    fn destroy(&mut self) {
        if !self.initialized {
            return;
        }
        if self.tag == VariantTag::Nil {
            self.abi.variant_destroy()(self.ptr().assume_variant());
        } else if !self.tag.is_trivial() {
            if let Some(dtor) = self.abi.get_ptr_destructor()(self.tag) {
                dtor(self.ptr());
            }
        }
        self.initialized = false;
    }
}

impl Drop for ValueStorage {
    fn drop(&mut self) {
        self.destroy();
    }
}
