//! Foreign ABI surface for the variant marshaling bridge.
//!
//! This crate models the stable, versioned boundary of a foreign object
//! model whose values are tagged, fixed-size unions addressed through
//! untyped pointers:
//!
//! - [`tags`]: the closed set of variant tags and their static metadata.
//! - [`ptr`]: pointer-flavor newtypes that encode initialized,
//!   uninitialized and const access in the type system.
//! - [`table`]: the function table resolved once at startup, through
//!   which every foreign operation is invoked.
//!
//! Nothing here depends on the host value model; the core crate builds
//! its casting engine on top of these types.

pub mod ptr;
pub mod table;
pub mod tags;

pub use ptr::{
    ConstValuePtr, ConstVariantPtr, RawObject, UninitValuePtr, UninitVariantPtr, ValuePtr,
    VariantPtr,
};
pub use table::{
    AbiError, AbiTable, AbiTableBuilder, AbiVersion, BindingCallbacks, CallStatus, CallableHooks,
    MethodBind, OP_EQUAL,
};
pub use tags::{InvalidTag, TagInfo, TagKind, VariantTag, TAG_COUNT};
