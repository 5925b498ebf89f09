//! Pointer flavors for foreign value storage.
//!
//! Value storage is an opaque byte buffer addressed through an untyped
//! pointer plus a side-channel tag. Three flavors exist and the flavor
//! must match the operation performed: writing through a const pointer or
//! reading uninitialized bytes is undefined, so the flavors are distinct
//! types and the only uninitialized-to-initialized path is an explicit
//! `assume_init` after a constructor has run.
//!
//! The top-level variant box (tagged union) has its own pointer family so
//! an untagged typed value cannot be passed where the ABI expects a
//! variant box.

use std::ffi::c_void;

macro_rules! ptr_newtype {
    ($(#[$doc:meta])* $name:ident, mut) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(*mut c_void);

        impl $name {
            pub fn new(ptr: *mut c_void) -> Self {
                Self(ptr)
            }

            pub fn null() -> Self {
                Self(std::ptr::null_mut())
            }

            pub fn is_null(self) -> bool {
                self.0.is_null()
            }

            pub fn raw(self) -> *mut c_void {
                self.0
            }
        }
    };
    ($(#[$doc:meta])* $name:ident, const) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(*const c_void);

        impl $name {
            pub fn new(ptr: *const c_void) -> Self {
                Self(ptr)
            }

            pub fn null() -> Self {
                Self(std::ptr::null())
            }

            pub fn is_null(self) -> bool {
                self.0.is_null()
            }

            pub fn raw(self) -> *const c_void {
                self.0
            }
        }
    };
}

ptr_newtype! {
    /// Constructed typed value; the destructor must run before overwrite.
    ValuePtr, mut
}

ptr_newtype! {
    /// Read-only view of a constructed typed value.
    ConstValuePtr, const
}

ptr_newtype! {
    /// Raw bytes of typed-value size; construction required before use.
    UninitValuePtr, mut
}

ptr_newtype! {
    /// Constructed top-level variant box.
    VariantPtr, mut
}

ptr_newtype! {
    /// Read-only view of a constructed variant box.
    ConstVariantPtr, const
}

ptr_newtype! {
    /// Raw bytes of variant-box size.
    UninitVariantPtr, mut
}

impl ValuePtr {
    pub fn as_const(self) -> ConstValuePtr {
        ConstValuePtr::new(self.0)
    }

    /// Reinterpret as raw bytes so a constructor may overwrite in place.
    /// The caller must have run the destructor first for non-trivial tags.
    pub fn as_uninit(self) -> UninitValuePtr {
        UninitValuePtr::new(self.0)
    }
}

impl UninitValuePtr {
    /// Marks the storage as constructed. Only valid once an ABI
    /// constructor has actually written a value to it.
    pub fn assume_init(self) -> ValuePtr {
        ValuePtr::new(self.0)
    }
}

impl VariantPtr {
    pub fn as_const(self) -> ConstVariantPtr {
        ConstVariantPtr::new(self.0)
    }

    pub fn as_uninit(self) -> UninitVariantPtr {
        UninitVariantPtr::new(self.0)
    }

    /// A variant box is itself a typed value with the nil/any tag.
    pub fn as_value(self) -> ValuePtr {
        ValuePtr::new(self.0)
    }
}

impl ConstVariantPtr {
    pub fn as_value(self) -> ConstValuePtr {
        ConstValuePtr::new(self.0)
    }
}

impl ConstValuePtr {
    /// Reinterpret as a variant box. Only valid when the side-channel
    /// tag is the nil/any tag.
    pub fn assume_variant(self) -> ConstVariantPtr {
        ConstVariantPtr::new(self.0)
    }
}

impl ValuePtr {
    /// See [`ConstValuePtr::assume_variant`].
    pub fn assume_variant(self) -> VariantPtr {
        VariantPtr::new(self.0)
    }
}

impl UninitValuePtr {
    /// See [`ConstValuePtr::assume_variant`].
    pub fn assume_variant(self) -> UninitVariantPtr {
        UninitVariantPtr::new(self.0)
    }
}

impl UninitVariantPtr {
    pub fn assume_init(self) -> VariantPtr {
        VariantPtr::new(self.0)
    }

    pub fn as_value(self) -> UninitValuePtr {
        UninitValuePtr::new(self.0)
    }
}

/// Identity of a foreign object. Compared and hashed by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawObject(*mut c_void);

impl RawObject {
    pub fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    pub fn raw(self) -> *mut c_void {
        self.0
    }
}
