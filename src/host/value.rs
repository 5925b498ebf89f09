//! Dynamically typed host values.
//!
//! A [`HostValue`] is a shared, refcounted cell in the host object graph.
//! The casting engine drives everything through the protocol methods here
//! (truthiness, numeric coercion, text, mapping, sequence, call) rather
//! than matching on payload variants directly, so foreign-backed values
//! and plain host values cast the same way.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use varbridge_abi::{ConstValuePtr, ValuePtr, VariantTag};

use crate::error::{BridgeError, BridgeResult};
use crate::host::class::HostType;
use crate::host::runtime::Runtime;
use crate::variant::object::ObjectBinding;
use crate::variant::storage::ValueStorage;

/// A host function: called with the runtime and positional arguments.
pub type HostFn = Rc<dyn Fn(&Runtime, &[HostValue]) -> BridgeResult<HostValue>>;

/// A foreign value owned by the host, kept in its native representation.
pub struct BoxedVariant {
    storage: RefCell<ValueStorage>,
    /// Declared element tag for typed containers, derived lazily.
    element: Cell<Option<VariantTag>>,
}

impl BoxedVariant {
    pub fn new(storage: ValueStorage) -> Self {
        Self {
            storage: RefCell::new(storage),
            element: Cell::new(None),
        }
    }

    pub fn tag(&self) -> VariantTag {
        self.storage.borrow().tag()
    }

    /// Copies the boxed value into `dest` through the borrowed pointer.
    pub fn with_const_ptr<R>(&self, f: impl FnOnce(ConstValuePtr) -> R) -> R {
        f(self.storage.borrow().const_ptr())
    }

    pub fn with_ptr<R>(&self, f: impl FnOnce(ValuePtr) -> R) -> R {
        f(self.storage.borrow_mut().ptr())
    }

    /// Element tag of a typed container, asked of the foreign side once
    /// and cached. Untyped containers report `Nil`.
    pub fn element_tag(&self) -> VariantTag {
        if let Some(tag) = self.element.get() {
            return tag;
        }
        let storage = self.storage.borrow();
        let tag = if storage.tag().is_array_like() {
            let raw = storage.abi().array_element_tag()(storage.const_ptr());
            VariantTag::from_raw(raw).unwrap_or(VariantTag::Nil)
        } else {
            VariantTag::Nil
        };
        self.element.set(Some(tag));
        tag
    }
}

/// Hashable key for host dictionaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostKey {
    None,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    /// Unhashable-by-value payloads key by object identity.
    Identity(usize),
}

pub enum HostPayload {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Interned text. Casts to the interned foreign string type.
    IStr(String),
    List(RefCell<Vec<HostValue>>),
    /// Keyed by hash identity; entries keep the original key value too.
    Dict(RefCell<FxHashMap<HostKey, (HostValue, HostValue)>>),
    Func(HostFn),
    Boxed(BoxedVariant),
    Object(Rc<ObjectBinding>),
}

pub struct HostObj {
    pub class: HostType,
    pub payload: HostPayload,
    pub attrs: RefCell<FxHashMap<String, HostValue>>,
}

impl Drop for HostObj {
    fn drop(&mut self) {
        if let HostPayload::Object(binding) = &self.payload {
            binding.on_host_finalize(std::ptr::from_ref(&*self));
        }
    }
}

/// Shared handle to a host object. Cloning bumps the host refcount.
#[derive(Clone)]
pub struct HostValue(Rc<HostObj>);

impl HostValue {
    pub fn new(class: HostType, payload: HostPayload) -> Self {
        Self(Rc::new(HostObj {
            class,
            payload,
            attrs: RefCell::new(FxHashMap::default()),
        }))
    }

    pub fn none(rt: &Runtime) -> Self {
        Self::new(rt.classes().none_class.clone(), HostPayload::None)
    }

    pub fn bool(rt: &Runtime, v: bool) -> Self {
        Self::new(rt.classes().bool_class.clone(), HostPayload::Bool(v))
    }

    pub fn int(rt: &Runtime, v: i64) -> Self {
        Self::new(rt.classes().int_class.clone(), HostPayload::Int(v))
    }

    pub fn float(rt: &Runtime, v: f64) -> Self {
        Self::new(rt.classes().float_class.clone(), HostPayload::Float(v))
    }

    pub fn str(rt: &Runtime, v: impl Into<String>) -> Self {
        Self::new(rt.classes().str_class.clone(), HostPayload::Str(v.into()))
    }

    pub fn interned(rt: &Runtime, v: impl Into<String>) -> Self {
        Self::new(rt.classes().istr_class.clone(), HostPayload::IStr(v.into()))
    }

    pub fn list(rt: &Runtime, items: Vec<HostValue>) -> Self {
        Self::new(
            rt.classes().list_class.clone(),
            HostPayload::List(RefCell::new(items)),
        )
    }

    pub fn dict(rt: &Runtime, pairs: Vec<(HostValue, HostValue)>) -> Self {
        let mut map = FxHashMap::default();
        for (k, v) in pairs {
            map.insert(k.dict_key(), (k, v));
        }
        Self::new(
            rt.classes().dict_class.clone(),
            HostPayload::Dict(RefCell::new(map)),
        )
    }

    pub fn func(rt: &Runtime, f: HostFn) -> Self {
        Self::new(rt.classes().func_class.clone(), HostPayload::Func(f))
    }

    pub fn boxed(rt: &Runtime, storage: ValueStorage) -> Self {
        Self::new(
            rt.classes().boxed_class.clone(),
            HostPayload::Boxed(BoxedVariant::new(storage)),
        )
    }

    pub fn from_object(class: HostType, binding: Rc<ObjectBinding>) -> Self {
        Self::new(class, HostPayload::Object(binding))
    }

    // ========================================================================
    // Identity and structure
    // ========================================================================

    pub fn class(&self) -> &HostType {
        &self.0.class
    }

    pub fn payload(&self) -> &HostPayload {
        &self.0.payload
    }

    pub fn obj(&self) -> &Rc<HostObj> {
        &self.0
    }

    pub fn from_obj(obj: Rc<HostObj>) -> Self {
        Self(obj)
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &HostValue) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_none(&self) -> bool {
        matches!(self.0.payload, HostPayload::None)
    }

    pub fn type_name(&self) -> &str {
        &self.0.class.name
    }

    // ========================================================================
    // Coercion protocols
    // ========================================================================

    /// Truthiness. Everything coerces; only the listed payloads are false.
    pub fn as_bool_coerced(&self) -> bool {
        match &self.0.payload {
            HostPayload::None => false,
            HostPayload::Bool(v) => *v,
            HostPayload::Int(v) => *v != 0,
            HostPayload::Float(v) => *v != 0.0,
            HostPayload::Str(v) | HostPayload::IStr(v) => !v.is_empty(),
            HostPayload::List(v) => !v.borrow().is_empty(),
            HostPayload::Dict(v) => !v.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn supports_int(&self) -> bool {
        matches!(
            self.0.payload,
            HostPayload::Bool(_) | HostPayload::Int(_) | HostPayload::Float(_)
        )
    }

    pub fn supports_float(&self) -> bool {
        self.supports_int()
    }

    pub fn coerce_int(&self) -> Option<i64> {
        match &self.0.payload {
            HostPayload::Bool(v) => Some(*v as i64),
            HostPayload::Int(v) => Some(*v),
            HostPayload::Float(v) => Some(*v as i64),
            HostPayload::Str(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn coerce_float(&self) -> Option<f64> {
        match &self.0.payload {
            HostPayload::Bool(v) => Some(*v as i64 as f64),
            HostPayload::Int(v) => Some(*v as f64),
            HostPayload::Float(v) => Some(*v),
            HostPayload::Str(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text payload, if this value is textual. No stringification.
    pub fn as_text(&self) -> Option<&str> {
        match &self.0.payload {
            HostPayload::Str(v) | HostPayload::IStr(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_interned_text(&self) -> bool {
        matches!(self.0.payload, HostPayload::IStr(_))
    }

    /// Mapping protocol: owned snapshot of (key, value) pairs.
    pub fn mapping_pairs(&self) -> Option<Vec<(HostValue, HostValue)>> {
        match &self.0.payload {
            HostPayload::Dict(map) => Some(map.borrow().values().cloned().collect()),
            _ => None,
        }
    }

    /// Sequence protocol: owned snapshot of items.
    pub fn sequence_items(&self) -> Option<Vec<HostValue>> {
        match &self.0.payload {
            HostPayload::List(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.0.payload, HostPayload::Func(_))
    }

    pub fn call(&self, rt: &Runtime, args: &[HostValue]) -> BridgeResult<HostValue> {
        match &self.0.payload {
            HostPayload::Func(f) => f(rt, args),
            _ => Err(BridgeError::TypeCoercion {
                host_type: self.type_name().to_owned(),
                expected: "callable",
            }),
        }
    }

    pub fn as_boxed(&self) -> Option<&BoxedVariant> {
        match &self.0.payload {
            HostPayload::Boxed(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object_binding(&self) -> Option<&Rc<ObjectBinding>> {
        match &self.0.payload {
            HostPayload::Object(b) => Some(b),
            _ => None,
        }
    }

    // ========================================================================
    // Keys, hashing, display
    // ========================================================================

    pub fn dict_key(&self) -> HostKey {
        match &self.0.payload {
            HostPayload::None => HostKey::None,
            HostPayload::Bool(v) => HostKey::Bool(*v),
            HostPayload::Int(v) => HostKey::Int(*v),
            HostPayload::Float(v) => HostKey::Float(OrderedFloat(*v)),
            HostPayload::Str(v) | HostPayload::IStr(v) => HostKey::Str(v.clone()),
            _ => HostKey::Identity(self.identity()),
        }
    }

    pub fn hash32(&self) -> u32 {
        use std::hash::{Hash, Hasher};
        let mut hasher = rustc_hash::FxHasher::default();
        self.dict_key().hash(&mut hasher);
        hasher.finish() as u32
    }

    /// Value equality for the payloads that have it; identity otherwise.
    pub fn host_eq(&self, other: &HostValue) -> bool {
        use HostPayload::*;
        match (&self.0.payload, &other.0.payload) {
            (None, None) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => *a as f64 == *b,
            (Str(a), Str(b)) | (IStr(a), IStr(b)) | (Str(a), IStr(b)) | (IStr(a), Str(b)) => {
                a == b
            }
            _ => self.ptr_eq(other),
        }
    }

    pub fn display_string(&self) -> String {
        match &self.0.payload {
            HostPayload::None => "None".to_owned(),
            HostPayload::Bool(true) => "True".to_owned(),
            HostPayload::Bool(false) => "False".to_owned(),
            HostPayload::Int(v) => v.to_string(),
            HostPayload::Float(v) => v.to_string(),
            HostPayload::Str(v) | HostPayload::IStr(v) => v.clone(),
            HostPayload::List(items) => format!("<list of {}>", items.borrow().len()),
            HostPayload::Dict(map) => format!("<dict of {}>", map.borrow().len()),
            HostPayload::Func(_) => format!("<function at {:#x}>", self.identity()),
            HostPayload::Boxed(b) => format!("<{}>", b.tag().name()),
            HostPayload::Object(b) => format!("<{} object>", b.class_name()),
        }
    }
}

impl std::fmt::Debug for HostValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostValue({}: {})", self.type_name(), self.display_string())
    }
}
