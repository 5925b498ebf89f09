//! The versioned foreign function table.
//!
//! All foreign operations are invoked through an [`AbiTable`] resolved
//! once at startup. Required entries missing at resolution time are a
//! hard startup failure; entries this build does not require are faulted
//! to abort loudly if ever invoked, rather than silently no-op.

use std::ffi::c_void;
use std::fmt;

use thiserror::Error;

use crate::ptr::{
    ConstValuePtr, ConstVariantPtr, RawObject, UninitValuePtr, UninitVariantPtr, ValuePtr,
    VariantPtr,
};
use crate::tags::VariantTag;

/// Foreign call completion code returned across boundary frames that do
/// not understand host-level errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Ok,
    InvalidMethod,
    InvalidArguments,
    Failed,
}

/// Opaque handle to a resolved builtin method, looked up by class name,
/// method name, and signature hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodBind(pub *const c_void);

// ============================================================================
// Entry signatures
// ============================================================================

pub type VariantNewNilFn = fn(UninitVariantPtr);
pub type VariantDestroyFn = fn(VariantPtr);
pub type VariantGetTypeFn = fn(ConstVariantPtr) -> i32;
/// Construct a variant box from a typed value of the entry's tag.
pub type VariantFromTypeFn = fn(UninitVariantPtr, ConstValuePtr);
/// Extract a typed value of the entry's tag out of a variant box.
pub type VariantToTypeFn = fn(UninitValuePtr, ConstVariantPtr);
/// Indexed per-tag constructor; the argument list layout is fixed by the
/// foreign side per index. Index 1 is the single-argument constructor.
pub type PtrConstructorFn = fn(UninitValuePtr, &[ConstValuePtr]);
pub type PtrDestructorFn = fn(ValuePtr);
pub type KeyedSetterFn = fn(ValuePtr, ConstVariantPtr, ConstVariantPtr);
pub type KeyedGetterFn = fn(ConstValuePtr, ConstVariantPtr, UninitVariantPtr) -> bool;
pub type IndexedSetterFn = fn(ValuePtr, i64, ConstValuePtr);
pub type ArrayResizeFn = fn(VariantTag, ValuePtr, i64);
/// Element tag of a dynamically typed container, or a negative value when
/// untyped.
pub type ArrayElementTagFn = fn(ConstValuePtr) -> i32;
/// Constructs a value of the given string-like tag from utf8 text.
pub type StringNewUtf8Fn = fn(VariantTag, UninitValuePtr, &str);
pub type StringToUtf8Fn = fn(ConstValuePtr) -> String;
/// Writes a string value describing the variant box.
pub type StringifyFn = fn(ConstVariantPtr, UninitValuePtr);
pub type OperatorEvaluatorFn = fn(ConstValuePtr, ConstValuePtr, UninitValuePtr);

/// Operator codes accepted by the operator evaluator lookup.
pub const OP_EQUAL: u32 = 0;
pub type ObjectConstructFn = fn(&str) -> RawObject;
pub type ObjectDestroyFn = fn(RawObject);
pub type ObjectSetInstanceFn = fn(RawObject, &str, *mut c_void);
pub type ObjectGetClassNameFn = fn(RawObject) -> String;
pub type ObjectSetBindingFn = fn(RawObject, *mut c_void, *mut c_void, &'static BindingCallbacks);
pub type ObjectGetBindingFn =
    fn(RawObject, *mut c_void, Option<&'static BindingCallbacks>) -> *mut c_void;
pub type GetMethodBindFn = fn(&str, &str, u64) -> Option<MethodBind>;
pub type MethodBindPtrCallFn = fn(MethodBind, RawObject, &[ConstValuePtr], ValuePtr);
pub type CallableCreateFn = fn(UninitValuePtr, CallableHooks);
pub type CallableGetUserdataFn = fn(ConstValuePtr, *mut c_void) -> *mut c_void;
pub type PrintErrorFn = fn(&str, &str, &str, u32);

pub type GetPtrConstructorFn = fn(VariantTag, i32) -> Option<PtrConstructorFn>;
pub type GetPtrDestructorFn = fn(VariantTag) -> Option<PtrDestructorFn>;
pub type GetFromTypeConstructorFn = fn(VariantTag) -> Option<VariantFromTypeFn>;
pub type GetToTypeConstructorFn = fn(VariantTag) -> Option<VariantToTypeFn>;
pub type GetKeyedSetterFn = fn(VariantTag) -> Option<KeyedSetterFn>;
pub type GetKeyedGetterFn = fn(VariantTag) -> Option<KeyedGetterFn>;
pub type GetIndexedSetterFn = fn(VariantTag) -> Option<IndexedSetterFn>;
pub type GetOperatorEvaluatorFn = fn(u32, VariantTag, VariantTag) -> Option<OperatorEvaluatorFn>;

/// Instance binding callbacks the foreign side fires for object lifetime
/// events. The binding pointer is whatever the bridge registered.
pub struct BindingCallbacks {
    /// Called when the foreign side needs a binding it does not have.
    pub create: fn(token: *mut c_void, object: *mut c_void) -> *mut c_void,
    /// Called when the foreign object is going away.
    pub free: fn(token: *mut c_void, object: *mut c_void, binding: *mut c_void),
    /// Fired when the foreign side adjusts its own refcount on a
    /// reference-counted object. Returning false vetoes destruction.
    pub reference: fn(token: *mut c_void, binding: *mut c_void, reference: bool) -> bool,
}

/// Hook block backing a custom callable value created by the bridge.
///
/// `userdata` carries the wrapped host object's identity for round-trip
/// unwrapping; `token` identifies which binding layer created the
/// callable. The behavior hooks capture what they need.
pub struct CallableHooks {
    pub token: *mut c_void,
    pub userdata: *mut c_void,
    pub call: Box<dyn Fn(&[ConstVariantPtr], VariantPtr) -> CallStatus>,
    pub is_valid: Box<dyn Fn() -> bool>,
    pub hash: Box<dyn Fn() -> u32>,
    /// Compared against the *other* callable's userdata.
    pub equal: Box<dyn Fn(*mut c_void) -> bool>,
    pub to_string: Box<dyn Fn() -> Option<String>>,
    /// Dropped by the foreign side when the callable is destroyed.
    pub free: Box<dyn FnMut()>,
}

impl fmt::Debug for CallableHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableHooks")
            .field("token", &self.token)
            .field("userdata", &self.userdata)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Version and resolution errors
// ============================================================================

/// Version reported by the foreign side at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AbiVersion {
    pub major: u32,
    pub minor: u32,
}

/// Oldest foreign version this build understands.
pub const MIN_SUPPORTED_VERSION: AbiVersion = AbiVersion { major: 4, minor: 1 };

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("foreign ABI version {major}.{minor} is older than the supported minimum {}.{}",
        MIN_SUPPORTED_VERSION.major, MIN_SUPPORTED_VERSION.minor)]
    UnsupportedVersion { major: u32, minor: u32 },

    #[error("required foreign ABI entries missing: {}", .0.join(", "))]
    MissingEntries(Vec<&'static str>),
}

fn missing_entry(name: &'static str) -> ! {
    eprintln!("foreign ABI entry '{name}' was not resolved for this build but was invoked");
    std::process::abort();
}

// ============================================================================
// The table
// ============================================================================

macro_rules! abi_entries {
    (
        required { $($req:ident: $req_ty:ty),* $(,)? }
        optional { $($opt:ident: $opt_ty:ty),* $(,)? }
    ) => {
        /// Builder for [`AbiTable`]. The embedder fills in the entries it
        /// resolved from the foreign side, then calls [`build`].
        ///
        /// [`build`]: AbiTableBuilder::build
        #[derive(Default)]
        pub struct AbiTableBuilder {
            pub version: Option<AbiVersion>,
            $(pub $req: Option<$req_ty>,)*
            $(pub $opt: Option<$opt_ty>,)*
        }

        /// The resolved foreign function table.
        pub struct AbiTable {
            version: AbiVersion,
            $($req: $req_ty,)*
            $($opt: Option<$opt_ty>,)*
        }

        impl AbiTableBuilder {
            /// Validates version and entry completeness. Missing required
            /// entries are reported all at once.
            pub fn build(self) -> Result<AbiTable, AbiError> {
                let version = self.version.unwrap_or(MIN_SUPPORTED_VERSION);
                if version < MIN_SUPPORTED_VERSION {
                    return Err(AbiError::UnsupportedVersion {
                        major: version.major,
                        minor: version.minor,
                    });
                }

                let mut missing = Vec::new();
                $(if self.$req.is_none() {
                    missing.push(stringify!($req));
                })*
                if !missing.is_empty() {
                    return Err(AbiError::MissingEntries(missing));
                }

                Ok(AbiTable {
                    version,
                    $($req: self.$req.unwrap(),)*
                    $($opt: self.$opt,)*
                })
            }
        }

        impl AbiTable {
            pub fn version(&self) -> AbiVersion {
                self.version
            }

            $(pub fn $req(&self) -> $req_ty {
                self.$req
            })*

            $(pub fn $opt(&self) -> $opt_ty {
                self.$opt.unwrap_or_else(|| missing_entry(stringify!($opt)))
            })*
        }
    };
}

abi_entries! {
    required {
        variant_new_nil: VariantNewNilFn,
        variant_destroy: VariantDestroyFn,
        variant_get_type: VariantGetTypeFn,
        get_variant_from_type_constructor: GetFromTypeConstructorFn,
        get_variant_to_type_constructor: GetToTypeConstructorFn,
        get_ptr_constructor: GetPtrConstructorFn,
        get_ptr_destructor: GetPtrDestructorFn,
        get_keyed_setter: GetKeyedSetterFn,
        get_indexed_setter: GetIndexedSetterFn,
        array_resize: ArrayResizeFn,
        array_element_tag: ArrayElementTagFn,
        string_new_with_utf8: StringNewUtf8Fn,
        string_to_utf8: StringToUtf8Fn,
        object_construct: ObjectConstructFn,
        object_destroy: ObjectDestroyFn,
        object_set_instance: ObjectSetInstanceFn,
        object_get_class_name: ObjectGetClassNameFn,
        object_set_instance_binding: ObjectSetBindingFn,
        object_get_instance_binding: ObjectGetBindingFn,
        get_method_bind: GetMethodBindFn,
        method_bind_ptrcall: MethodBindPtrCallFn,
        callable_custom_create: CallableCreateFn,
        callable_custom_get_userdata: CallableGetUserdataFn,
        print_error: PrintErrorFn,
    }
    optional {
        get_keyed_getter: GetKeyedGetterFn,
        get_operator_evaluator: GetOperatorEvaluatorFn,
        variant_stringify: StringifyFn,
    }
}
