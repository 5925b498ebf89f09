//! In-process stand-in for the foreign side.
//!
//! Implements the full ABI table over heap-allocated engine values so
//! the bridge can be driven end to end without a real foreign runtime.
//! Engine objects live as raw boxes tracked in a thread-local registry,
//! which lets tests assert on leaks and refcounts.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ffi::c_void;
use std::rc::Rc;

use varbridge::abi::{
    AbiTableBuilder, AbiVersion, BindingCallbacks, CallableHooks, ConstValuePtr, ConstVariantPtr,
    MethodBind, RawObject, UninitValuePtr, UninitVariantPtr, ValuePtr, VariantPtr, VariantTag,
};
use varbridge::meta::signature_hash;
use varbridge::prelude::*;

// ============================================================================
// Engine values
// ============================================================================

#[derive(Clone)]
pub enum Payload {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Dict(Vec<(EngineValue, EngineValue)>),
    Array(Vec<EngineValue>),
    PackedInt(Vec<i64>),
    Callable(Rc<CallableHooks>),
    Object(RawObject),
}

#[derive(Clone)]
pub struct EngineValue {
    pub tag: VariantTag,
    pub payload: Payload,
}

impl EngineValue {
    fn nil() -> Self {
        Self { tag: VariantTag::Nil, payload: Payload::Nil }
    }

    fn default_of(tag: VariantTag) -> Self {
        let payload = match tag {
            VariantTag::Nil => Payload::Nil,
            VariantTag::Bool => Payload::Bool(false),
            VariantTag::Int => Payload::Int(0),
            VariantTag::Float => Payload::Float(0.0),
            VariantTag::String | VariantTag::StringName | VariantTag::NodePath => {
                Payload::Str(String::new())
            }
            VariantTag::Dictionary => Payload::Dict(Vec::new()),
            VariantTag::Array => Payload::Array(Vec::new()),
            VariantTag::PackedInt64Array => Payload::PackedInt(Vec::new()),
            VariantTag::Object => Payload::Object(RawObject::null()),
            other => panic!("engine double has no default for tag {}", other.name()),
        };
        Self { tag, payload }
    }
}

fn engine_eq(a: &EngineValue, b: &EngineValue) -> bool {
    match (&a.payload, &b.payload) {
        (Payload::Nil, Payload::Nil) => true,
        (Payload::Bool(x), Payload::Bool(y)) => x == y,
        (Payload::Int(x), Payload::Int(y)) => x == y,
        (Payload::Float(x), Payload::Float(y)) => x == y,
        (Payload::Str(x), Payload::Str(y)) => x == y,
        (Payload::Object(x), Payload::Object(y)) => x == y,
        (Payload::Callable(x), Payload::Callable(y)) => {
            (x.equal)(y.userdata) || Rc::ptr_eq(x, y)
        }
        _ => false,
    }
}

// Heap tags store a `*mut EngineValue` in the caller's buffer; trivial
// tags store raw bytes.

fn is_heap(tag: VariantTag) -> bool {
    !tag.is_trivial() && tag != VariantTag::Nil
}

unsafe fn read_buffer(tag: VariantTag, src: ConstValuePtr) -> EngineValue {
    match tag {
        VariantTag::Bool => EngineValue {
            tag,
            payload: Payload::Bool(unsafe { src.raw().cast::<u8>().read() } != 0),
        },
        VariantTag::Int => EngineValue {
            tag,
            payload: Payload::Int(unsafe { src.raw().cast::<i64>().read_unaligned() }),
        },
        VariantTag::Float => EngineValue {
            tag,
            payload: Payload::Float(unsafe { src.raw().cast::<f64>().read_unaligned() }),
        },
        VariantTag::Object => EngineValue {
            tag,
            payload: Payload::Object(RawObject::new(unsafe {
                src.raw().cast::<*mut c_void>().read_unaligned()
            })),
        },
        _ if is_heap(tag) => {
            let ptr = unsafe { src.raw().cast::<*mut EngineValue>().read_unaligned() };
            unsafe { (*ptr).clone() }
        }
        other => panic!("engine double cannot read tag {}", other.name()),
    }
}

unsafe fn write_buffer(value: EngineValue, dst: UninitValuePtr) {
    match (&value.tag, &value.payload) {
        (VariantTag::Bool, Payload::Bool(v)) => unsafe {
            dst.raw().cast::<u8>().write(*v as u8)
        },
        (VariantTag::Int, Payload::Int(v)) => unsafe {
            dst.raw().cast::<i64>().write_unaligned(*v)
        },
        (VariantTag::Float, Payload::Float(v)) => unsafe {
            dst.raw().cast::<f64>().write_unaligned(*v)
        },
        (VariantTag::Object, Payload::Object(v)) => unsafe {
            dst.raw().cast::<*mut c_void>().write_unaligned(v.raw())
        },
        (tag, _) if is_heap(*tag) => unsafe {
            dst.raw()
                .cast::<*mut EngineValue>()
                .write_unaligned(Box::into_raw(Box::new(value)))
        },
        (other, _) => panic!("engine double cannot write tag {}", other.name()),
    }
}

unsafe fn drop_heap_buffer(p: ValuePtr) {
    let ptr = unsafe { p.raw().cast::<*mut EngineValue>().read_unaligned() };
    drop(unsafe { Box::from_raw(ptr) });
}

unsafe fn heap_value<'a>(p: ConstValuePtr) -> &'a mut EngineValue {
    let ptr = unsafe { p.raw().cast::<*mut EngineValue>().read_unaligned() };
    unsafe { &mut *ptr }
}

// Variant boxes hold a heap pointer in the first 8 of their 24 bytes.

unsafe fn variant_write(dst: UninitVariantPtr, value: EngineValue) {
    unsafe {
        dst.raw()
            .cast::<*mut EngineValue>()
            .write_unaligned(Box::into_raw(Box::new(value)))
    }
}

unsafe fn variant_value<'a>(src: ConstVariantPtr) -> &'a EngineValue {
    let ptr = unsafe { src.raw().cast::<*mut EngineValue>().read_unaligned() };
    unsafe { &*ptr }
}

// ============================================================================
// Per-tag entry functions
// ============================================================================

macro_rules! tag_fns {
    ($module:ident, $tag:expr) => {
        mod $module {
            use super::*;

            pub fn ctor0(dst: UninitValuePtr, _args: &[ConstValuePtr]) {
                unsafe { write_buffer(EngineValue::default_of($tag), dst) };
            }

            pub fn ctor1(dst: UninitValuePtr, args: &[ConstValuePtr]) {
                let value = unsafe { read_buffer($tag, args[0]) };
                unsafe { write_buffer(value, dst) };
            }

            pub fn from_type(dst: UninitVariantPtr, src: ConstValuePtr) {
                let value = unsafe { read_buffer($tag, src) };
                unsafe { variant_write(dst, value) };
            }

            pub fn to_type(dst: UninitValuePtr, src: ConstVariantPtr) {
                let value = unsafe { variant_value(src) }.clone();
                assert_eq!(value.tag, $tag, "variant box tag mismatch");
                unsafe { write_buffer(value, dst) };
            }
        }
    };
}

tag_fns!(t_bool, VariantTag::Bool);
tag_fns!(t_int, VariantTag::Int);
tag_fns!(t_float, VariantTag::Float);
tag_fns!(t_string, VariantTag::String);
tag_fns!(t_string_name, VariantTag::StringName);
tag_fns!(t_node_path, VariantTag::NodePath);
tag_fns!(t_dictionary, VariantTag::Dictionary);
tag_fns!(t_array, VariantTag::Array);
tag_fns!(t_packed_int, VariantTag::PackedInt64Array);
tag_fns!(t_object, VariantTag::Object);
tag_fns!(t_callable, VariantTag::Callable);

fn get_ptr_constructor(
    tag: VariantTag,
    index: i32,
) -> Option<fn(UninitValuePtr, &[ConstValuePtr])> {
    let (c0, c1): (fn(UninitValuePtr, &[ConstValuePtr]), fn(UninitValuePtr, &[ConstValuePtr])) =
        match tag {
            VariantTag::Bool => (t_bool::ctor0, t_bool::ctor1),
            VariantTag::Int => (t_int::ctor0, t_int::ctor1),
            VariantTag::Float => (t_float::ctor0, t_float::ctor1),
            VariantTag::String => (t_string::ctor0, t_string::ctor1),
            VariantTag::StringName => (t_string_name::ctor0, t_string_name::ctor1),
            VariantTag::NodePath => (t_node_path::ctor0, t_node_path::ctor1),
            VariantTag::Dictionary => (t_dictionary::ctor0, t_dictionary::ctor1),
            VariantTag::Array => (t_array::ctor0, t_array::ctor1),
            VariantTag::PackedInt64Array => (t_packed_int::ctor0, t_packed_int::ctor1),
            VariantTag::Object => (t_object::ctor0, t_object::ctor1),
            VariantTag::Callable => (t_callable::ctor0, t_callable::ctor1),
            _ => return None,
        };
    match index {
        0 => Some(c0),
        1 => Some(c1),
        _ => None,
    }
}

fn get_ptr_destructor(tag: VariantTag) -> Option<fn(ValuePtr)> {
    fn dtor(p: ValuePtr) {
        unsafe { drop_heap_buffer(p) };
    }
    if is_heap(tag) { Some(dtor) } else { None }
}

fn get_from_type(tag: VariantTag) -> Option<fn(UninitVariantPtr, ConstValuePtr)> {
    Some(match tag {
        VariantTag::Bool => t_bool::from_type,
        VariantTag::Int => t_int::from_type,
        VariantTag::Float => t_float::from_type,
        VariantTag::String => t_string::from_type,
        VariantTag::StringName => t_string_name::from_type,
        VariantTag::NodePath => t_node_path::from_type,
        VariantTag::Dictionary => t_dictionary::from_type,
        VariantTag::Array => t_array::from_type,
        VariantTag::PackedInt64Array => t_packed_int::from_type,
        VariantTag::Object => t_object::from_type,
        VariantTag::Callable => t_callable::from_type,
        _ => return None,
    })
}

fn get_to_type(tag: VariantTag) -> Option<fn(UninitValuePtr, ConstVariantPtr)> {
    Some(match tag {
        VariantTag::Bool => t_bool::to_type,
        VariantTag::Int => t_int::to_type,
        VariantTag::Float => t_float::to_type,
        VariantTag::String => t_string::to_type,
        VariantTag::StringName => t_string_name::to_type,
        VariantTag::NodePath => t_node_path::to_type,
        VariantTag::Dictionary => t_dictionary::to_type,
        VariantTag::Array => t_array::to_type,
        VariantTag::PackedInt64Array => t_packed_int::to_type,
        VariantTag::Object => t_object::to_type,
        VariantTag::Callable => t_callable::to_type,
        _ => return None,
    })
}

// ============================================================================
// Variant box entries
// ============================================================================

fn variant_new_nil(dst: UninitVariantPtr) {
    unsafe { variant_write(dst, EngineValue::nil()) };
}

fn variant_destroy(p: VariantPtr) {
    let ptr = unsafe { p.raw().cast::<*mut EngineValue>().read_unaligned() };
    drop(unsafe { Box::from_raw(ptr) });
}

fn variant_get_type(p: ConstVariantPtr) -> i32 {
    unsafe { variant_value(p) }.tag.to_raw()
}

fn variant_stringify(src: ConstVariantPtr, dst: UninitValuePtr) {
    let value = unsafe { variant_value(src) };
    let text = match &value.payload {
        Payload::Nil => "<null>".to_owned(),
        Payload::Bool(v) => v.to_string(),
        Payload::Int(v) => v.to_string(),
        Payload::Float(v) => v.to_string(),
        Payload::Str(v) => v.clone(),
        Payload::Dict(pairs) => format!("{{ {} entries }}", pairs.len()),
        Payload::Array(items) => format!("[{} items]", items.len()),
        Payload::PackedInt(items) => format!("[{} ints]", items.len()),
        Payload::Callable(_) => "Callable()".to_owned(),
        Payload::Object(_) => "<Object>".to_owned(),
    };
    unsafe {
        write_buffer(
            EngineValue { tag: VariantTag::String, payload: Payload::Str(text) },
            dst,
        )
    };
}

// ============================================================================
// Container entries
// ============================================================================

fn get_keyed_setter(tag: VariantTag) -> Option<fn(ValuePtr, ConstVariantPtr, ConstVariantPtr)> {
    fn set(dict: ValuePtr, key: ConstVariantPtr, value: ConstVariantPtr) {
        let dict = unsafe { heap_value(dict.as_const()) };
        let key = unsafe { variant_value(key) }.clone();
        let value = unsafe { variant_value(value) }.clone();
        let Payload::Dict(pairs) = &mut dict.payload else {
            panic!("keyed setter on non-dictionary");
        };
        if let Some(slot) = pairs.iter_mut().find(|(k, _)| engine_eq(k, &key)) {
            slot.1 = value;
        } else {
            pairs.push((key, value));
        }
    }
    (tag == VariantTag::Dictionary).then_some(set as fn(_, _, _))
}

fn get_keyed_getter(
    tag: VariantTag,
) -> Option<fn(ConstValuePtr, ConstVariantPtr, UninitVariantPtr) -> bool> {
    fn get(dict: ConstValuePtr, key: ConstVariantPtr, out: UninitVariantPtr) -> bool {
        let dict = unsafe { heap_value(dict) };
        let key = unsafe { variant_value(key) };
        let Payload::Dict(pairs) = &dict.payload else {
            panic!("keyed getter on non-dictionary");
        };
        match pairs.iter().find(|(k, _)| engine_eq(k, key)) {
            Some((_, value)) => {
                unsafe { variant_write(out, value.clone()) };
                true
            }
            None => false,
        }
    }
    (tag == VariantTag::Dictionary).then_some(get as fn(_, _, _) -> bool)
}

fn get_indexed_setter(tag: VariantTag) -> Option<fn(ValuePtr, i64, ConstValuePtr)> {
    fn set_array(array: ValuePtr, index: i64, value: ConstValuePtr) {
        let array = unsafe { heap_value(array.as_const()) };
        let Payload::Array(items) = &mut array.payload else {
            panic!("indexed setter on non-array");
        };
        items[index as usize] = unsafe { variant_value(value.assume_variant()) }.clone();
    }
    fn set_packed_int(array: ValuePtr, index: i64, value: ConstValuePtr) {
        let array = unsafe { heap_value(array.as_const()) };
        let Payload::PackedInt(items) = &mut array.payload else {
            panic!("indexed setter on non-packed array");
        };
        items[index as usize] = unsafe { value.raw().cast::<i64>().read_unaligned() };
    }
    match tag {
        VariantTag::Array => Some(set_array),
        VariantTag::PackedInt64Array => Some(set_packed_int),
        _ => None,
    }
}

fn array_resize(tag: VariantTag, array: ValuePtr, len: i64) {
    let array = unsafe { heap_value(array.as_const()) };
    match (tag, &mut array.payload) {
        (VariantTag::Array, Payload::Array(items)) => {
            items.resize(len as usize, EngineValue::nil());
        }
        (VariantTag::PackedInt64Array, Payload::PackedInt(items)) => {
            items.resize(len as usize, 0);
        }
        _ => panic!("resize on unsupported tag {}", tag.name()),
    }
}

fn array_element_tag(array: ConstValuePtr) -> i32 {
    match unsafe { heap_value(array) }.tag {
        VariantTag::PackedInt64Array => VariantTag::Int.to_raw(),
        _ => -1,
    }
}

fn operator_evaluator(
    _op: u32,
    _left: VariantTag,
    _right: VariantTag,
) -> Option<fn(ConstValuePtr, ConstValuePtr, UninitValuePtr)> {
    fn equal(a: ConstValuePtr, b: ConstValuePtr, out: UninitValuePtr) {
        let a = unsafe { heap_value(a) };
        let b = unsafe { heap_value(b) };
        unsafe { out.raw().cast::<u8>().write(engine_eq(a, b) as u8) };
    }
    Some(equal)
}

// ============================================================================
// Strings
// ============================================================================

fn string_new_with_utf8(tag: VariantTag, dst: UninitValuePtr, text: &str) {
    assert!(matches!(
        tag,
        VariantTag::String | VariantTag::StringName | VariantTag::NodePath
    ));
    unsafe {
        write_buffer(
            EngineValue { tag, payload: Payload::Str(text.to_owned()) },
            dst,
        )
    };
}

fn string_to_utf8(src: ConstValuePtr) -> String {
    match &unsafe { heap_value(src) }.payload {
        Payload::Str(v) => v.clone(),
        _ => panic!("string read on non-string value"),
    }
}

// ============================================================================
// Objects and the class database
// ============================================================================

pub struct EngineObject {
    pub class: String,
    pub refcounted: bool,
    pub refcount: Cell<i64>,
    pub instance: Cell<*mut c_void>,
    pub binding: Cell<*mut c_void>,
    pub binding_token: Cell<*mut c_void>,
    pub callbacks: Cell<Option<&'static BindingCallbacks>>,
}

thread_local! {
    static STATE: RefCell<EngineState> = RefCell::new(EngineState::default());
}

#[derive(Default)]
struct EngineState {
    live_objects: HashSet<usize>,
    errors: Vec<String>,
}

fn classdb_refcounted(class: &str) -> Option<bool> {
    match class {
        "Object" | "Node" => Some(false),
        "RefCounted" | "Resource" => Some(true),
        _ => None,
    }
}

fn object_construct(class: &str) -> RawObject {
    let Some(refcounted) = classdb_refcounted(class) else {
        return RawObject::null();
    };
    let obj = Box::into_raw(Box::new(EngineObject {
        class: class.to_owned(),
        refcounted,
        refcount: Cell::new(0),
        instance: Cell::new(std::ptr::null_mut()),
        binding: Cell::new(std::ptr::null_mut()),
        binding_token: Cell::new(std::ptr::null_mut()),
        callbacks: Cell::new(None),
    }));
    STATE.with(|s| s.borrow_mut().live_objects.insert(obj as usize));
    RawObject::new(obj.cast())
}

fn engine_object<'a>(raw: RawObject) -> &'a EngineObject {
    unsafe { &*raw.raw().cast::<EngineObject>() }
}

fn object_destroy(raw: RawObject) {
    let obj = engine_object(raw);
    if let Some(callbacks) = obj.callbacks.take() {
        (callbacks.free)(obj.binding_token.get(), raw.raw(), obj.binding.get());
    }
    STATE.with(|s| s.borrow_mut().live_objects.remove(&(raw.raw() as usize)));
    drop(unsafe { Box::from_raw(raw.raw().cast::<EngineObject>()) });
}

fn object_get_class_name(raw: RawObject) -> String {
    engine_object(raw).class.clone()
}

fn object_set_instance(raw: RawObject, _class: &str, instance: *mut c_void) {
    engine_object(raw).instance.set(instance);
}

fn object_set_instance_binding(
    raw: RawObject,
    token: *mut c_void,
    binding: *mut c_void,
    callbacks: &'static BindingCallbacks,
) {
    let obj = engine_object(raw);
    obj.binding.set(binding);
    obj.binding_token.set(token);
    obj.callbacks.set(Some(callbacks));
}

fn object_get_instance_binding(
    raw: RawObject,
    token: *mut c_void,
    _callbacks: Option<&'static BindingCallbacks>,
) -> *mut c_void {
    let obj = engine_object(raw);
    if obj.binding_token.get() == token {
        obj.binding.get()
    } else {
        std::ptr::null_mut()
    }
}

fn fire_reference_callback(obj: &EngineObject, acquired: bool) -> bool {
    match obj.callbacks.get() {
        Some(callbacks) if !obj.binding.get().is_null() => {
            (callbacks.reference)(obj.binding_token.get(), obj.binding.get(), acquired)
        }
        _ => true,
    }
}

// Method bind ids for the refcount protocol.
const MB_INIT_REF: usize = 1;
const MB_REFERENCE: usize = 2;
const MB_UNREFERENCE: usize = 3;
const MB_GET_REFCOUNT: usize = 4;

fn get_method_bind(class: &str, method: &str, hash: u64) -> Option<MethodBind> {
    if classdb_refcounted(class) != Some(true) {
        return None;
    }
    let (id, ret) = match method {
        "init_ref" => (MB_INIT_REF, VariantTag::Bool),
        "reference" => (MB_REFERENCE, VariantTag::Bool),
        "unreference" => (MB_UNREFERENCE, VariantTag::Bool),
        "get_reference_count" => (MB_GET_REFCOUNT, VariantTag::Int),
        _ => return None,
    };
    if hash != signature_hash(class, method, &[], ret) {
        return None;
    }
    Some(MethodBind(id as *const c_void))
}

fn method_bind_ptrcall(bind: MethodBind, raw: RawObject, _args: &[ConstValuePtr], ret: ValuePtr) {
    let obj = engine_object(raw);
    // Binding reference callbacks fire on the 1 <-> 2 transitions only:
    // the structural reference does not pin the host object.
    match bind.0 as usize {
        MB_INIT_REF => {
            let count = obj.refcount.get();
            obj.refcount.set(count + 1);
            if count + 1 == 2 {
                fire_reference_callback(obj, true);
            }
            unsafe { ret.raw().cast::<u8>().write(1) };
        }
        MB_REFERENCE => {
            let count = obj.refcount.get() + 1;
            obj.refcount.set(count);
            if count == 2 {
                fire_reference_callback(obj, true);
            }
            unsafe { ret.raw().cast::<u8>().write(1) };
        }
        MB_UNREFERENCE => {
            let count = obj.refcount.get() - 1;
            obj.refcount.set(count);
            if count == 1 {
                fire_reference_callback(obj, false);
            }
            unsafe { ret.raw().cast::<u8>().write((count == 0) as u8) };
        }
        MB_GET_REFCOUNT => unsafe {
            ret.raw().cast::<i64>().write_unaligned(obj.refcount.get());
        },
        other => panic!("unknown method bind id {other}"),
    }
}

// ============================================================================
// Callables and errors
// ============================================================================

fn callable_custom_create(dst: UninitValuePtr, hooks: CallableHooks) {
    unsafe {
        write_buffer(
            EngineValue {
                tag: VariantTag::Callable,
                payload: Payload::Callable(Rc::new(hooks)),
            },
            dst,
        )
    };
}

fn callable_custom_get_userdata(src: ConstValuePtr, token: *mut c_void) -> *mut c_void {
    match &unsafe { heap_value(src) }.payload {
        Payload::Callable(hooks) if hooks.token == token => hooks.userdata,
        _ => std::ptr::null_mut(),
    }
}

fn print_error(description: &str, function: &str, _file: &str, _line: u32) {
    STATE.with(|s| {
        s.borrow_mut()
            .errors
            .push(format!("{function}: {description}"))
    });
}

// ============================================================================
// Harness surface
// ============================================================================

/// Builds a runtime wired to the engine double and registers the test
/// class hierarchy. Also clears engine state left by a previous test in
/// the same thread.
pub fn setup() -> Runtime {
    STATE.with(|s| *s.borrow_mut() = EngineState::default());

    let table = AbiTableBuilder {
        version: Some(AbiVersion { major: 4, minor: 2 }),
        variant_new_nil: Some(variant_new_nil),
        variant_destroy: Some(variant_destroy),
        variant_get_type: Some(variant_get_type),
        get_variant_from_type_constructor: Some(get_from_type),
        get_variant_to_type_constructor: Some(get_to_type),
        get_ptr_constructor: Some(get_ptr_constructor),
        get_ptr_destructor: Some(get_ptr_destructor),
        get_keyed_setter: Some(get_keyed_setter),
        get_keyed_getter: Some(get_keyed_getter),
        get_indexed_setter: Some(get_indexed_setter),
        get_operator_evaluator: Some(operator_evaluator),
        array_resize: Some(array_resize),
        array_element_tag: Some(array_element_tag),
        string_new_with_utf8: Some(string_new_with_utf8),
        string_to_utf8: Some(string_to_utf8),
        variant_stringify: Some(variant_stringify),
        object_construct: Some(object_construct),
        object_destroy: Some(object_destroy),
        object_set_instance: Some(object_set_instance),
        object_get_class_name: Some(object_get_class_name),
        object_set_instance_binding: Some(object_set_instance_binding),
        object_get_instance_binding: Some(object_get_instance_binding),
        get_method_bind: Some(get_method_bind),
        method_bind_ptrcall: Some(method_bind_ptrcall),
        callable_custom_create: Some(callable_custom_create),
        callable_custom_get_userdata: Some(callable_custom_get_userdata),
        print_error: Some(print_error),
    }
    .build()
    .expect("engine double resolves the full table");

    let rt = Runtime::new(Rc::new(table));
    {
        let mut classes = rt.classes_mut();
        let object_base = classes.object_base.clone();
        let refcounted_base = classes.refcounted_base.clone();
        classes.register_object_class("Node", object_base);
        classes.register_object_class("Resource", refcounted_base);
    }
    rt
}

pub fn live_object_count() -> usize {
    STATE.with(|s| s.borrow().live_objects.len())
}

pub fn engine_refcount(raw: RawObject) -> i64 {
    engine_object(raw).refcount.get()
}

/// Takes one extra foreign reference, as engine code storing the object
/// somewhere would.
pub fn engine_take_ref(raw: RawObject) {
    let obj = engine_object(raw);
    let count = obj.refcount.get() + 1;
    obj.refcount.set(count);
    if count == 2 {
        fire_reference_callback(obj, true);
    }
}

/// Drops one foreign reference, destroying the object if it was the
/// last.
pub fn engine_drop_ref(raw: RawObject) {
    let obj = engine_object(raw);
    let count = obj.refcount.get() - 1;
    obj.refcount.set(count);
    if count == 1 {
        fire_reference_callback(obj, false);
    }
    if count == 0 {
        object_destroy(raw);
    }
}

pub fn drain_errors() -> Vec<String> {
    STATE.with(|s| std::mem::take(&mut s.borrow_mut().errors))
}
