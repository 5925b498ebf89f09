//! The casting engine.
//!
//! Conversions run in three directions: foreign value to host value,
//! host value to foreign value, and foreign-to-foreign copies. All three
//! funnel through the free functions here; [`CastIn`], [`CastOut`] and
//! [`CastSlot`] wrap them with the ownership discipline each call
//! direction needs.
//!
//! A destination is either already constructed or raw memory, and the
//! two need different foreign entry points. [`CastDest`] tracks which
//! state a destination pointer is in and destroys stale contents before
//! reconstruction.

use std::marker::PhantomData;
use std::rc::Rc;

use varbridge_abi::{
    AbiTable, ConstValuePtr, RawObject, TagKind, UninitValuePtr, ValuePtr, VariantTag,
};

use crate::casting::infer::natural_tag;
use crate::error::{BridgeError, BridgeResult};
use crate::host::class::HostType;
use crate::host::runtime::Runtime;
use crate::host::value::HostValue;
use crate::variant::callable;
use crate::variant::object;
use crate::variant::storage::ValueStorage;

// ============================================================================
// Destination state
// ============================================================================

/// A foreign destination pointer with known initialization state.
pub enum CastDest {
    Init(ValuePtr),
    Uninit(UninitValuePtr),
}

impl CastDest {
    pub fn is_null(&self) -> bool {
        match self {
            CastDest::Init(p) => p.is_null(),
            CastDest::Uninit(p) => p.is_null(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self, CastDest::Init(_))
    }

    /// Destroys the current contents if any and yields raw memory ready
    /// for a constructor. The destination stays uninitialized until
    /// [`mark_initialized`] is called.
    ///
    /// [`mark_initialized`]: CastDest::mark_initialized
    pub fn make_uninit(&mut self, abi: &AbiTable, tag: VariantTag) -> UninitValuePtr {
        if let CastDest::Init(p) = *self {
            if tag == VariantTag::Nil {
                abi.variant_destroy()(p.assume_variant());
            } else if !tag.is_trivial() {
                if let Some(dtor) = abi.get_ptr_destructor()(tag) {
                    dtor(p);
                }
            }
            *self = CastDest::Uninit(p.as_uninit());
        }
        match self {
            CastDest::Uninit(p) => *p,
            CastDest::Init(_) => unreachable!(),
        }
    }

    pub fn mark_initialized(&mut self) {
        if let CastDest::Uninit(p) = *self {
            *self = CastDest::Init(p.assume_init());
        }
    }

    pub fn init_ptr(&self) -> ValuePtr {
        match self {
            CastDest::Init(p) => *p,
            CastDest::Uninit(_) => panic!("destination value was never constructed"),
        }
    }

    pub fn const_ptr(&self) -> ConstValuePtr {
        self.init_ptr().as_const()
    }
}

unsafe fn write_raw<T: Copy>(dest: UninitValuePtr, value: T) {
    unsafe { dest.raw().cast::<T>().write_unaligned(value) }
}

unsafe fn read_raw<T: Copy>(src: ConstValuePtr) -> T {
    unsafe { src.raw().cast::<T>().read_unaligned() }
}

// ============================================================================
// Foreign-to-foreign copy
// ============================================================================

/// Copies a foreign value of `tag` into the destination with the tag's
/// single-argument constructor, destroying stale contents first.
pub fn copy_value(
    abi: &AbiTable,
    tag: VariantTag,
    src: ConstValuePtr,
    dest: &mut CastDest,
) -> BridgeResult<()> {
    let ctor = abi.get_ptr_constructor()(tag, 1)
        .ok_or(BridgeError::ConstructorUnavailable { tag })?;
    let uninit = dest.make_uninit(abi, tag);
    ctor(uninit, &[src]);
    dest.mark_initialized();
    Ok(())
}

// ============================================================================
// Foreign to host
// ============================================================================

/// Converts the foreign value at `src` into a host value. `target` is a
/// hint from the declared signature; it picks a host representation for
/// text and runs the target class conversion, never a different foreign
/// read.
pub fn value_to_host(
    rt: &Runtime,
    src: ConstValuePtr,
    tag: VariantTag,
    target: Option<&HostType>,
) -> BridgeResult<HostValue> {
    if src.is_null() {
        return Ok(HostValue::none(rt));
    }
    let value = raw_value_to_host(rt, src, tag, target)?;
    if let Some(class) = target {
        if let Some(convert) = class.convert {
            return convert(rt, &value);
        }
    }
    Ok(value)
}

fn raw_value_to_host(
    rt: &Runtime,
    src: ConstValuePtr,
    tag: VariantTag,
    target: Option<&HostType>,
) -> BridgeResult<HostValue> {
    let abi = rt.abi().clone();
    match tag {
        VariantTag::Nil => {
            // Variant box: unwrap to the inner tag and convert that.
            let boxed = src.assume_variant();
            let inner = VariantTag::from_raw(abi.variant_get_type()(boxed))?;
            if inner == VariantTag::Nil {
                return Ok(HostValue::none(rt));
            }
            let to_type = abi.get_variant_to_type_constructor()(inner)
                .ok_or(BridgeError::ConstructorUnavailable { tag: inner })?;
            let mut temp = ValueStorage::new_uninit(abi, inner);
            to_type(temp.uninit_ptr(), boxed);
            temp.mark_initialized();
            // The outer `value_to_host` runs the target conversion; the
            // unwrapped recursion only picks the representation.
            raw_value_to_host(rt, temp.const_ptr(), inner, target)
        }
        VariantTag::Bool => Ok(HostValue::bool(rt, unsafe { read_raw::<u8>(src) } != 0)),
        VariantTag::Int => Ok(HostValue::int(rt, unsafe { read_raw::<i64>(src) })),
        VariantTag::Float => Ok(HostValue::float(rt, unsafe { read_raw::<f64>(src) })),
        VariantTag::Object => {
            let raw = RawObject::new(unsafe { read_raw(src) });
            object::bound_instance(rt, raw)
        }
        VariantTag::Callable => {
            // A callable the bridge created round-trips back to the host
            // function it wraps. Foreign callables stay boxed.
            let userdata = abi.callable_custom_get_userdata()(src, rt.token());
            if !userdata.is_null() {
                return Ok(callable::host_fn_from_userdata(userdata));
            }
            boxed_copy(rt, src, tag)
        }
        _ if tag.kind() == TagKind::StringLike => {
            let native_text = target.is_some_and(|class| class.is_native_text);
            if native_text {
                Ok(HostValue::str(rt, abi.string_to_utf8()(src)))
            } else {
                boxed_copy(rt, src, tag)
            }
        }
        _ => boxed_copy(rt, src, tag),
    }
}

/// Copies a foreign value into host-owned boxed storage.
fn boxed_copy(rt: &Runtime, src: ConstValuePtr, tag: VariantTag) -> BridgeResult<HostValue> {
    let abi = rt.abi().clone();
    let mut storage = ValueStorage::new_uninit(abi, tag);
    let mut dest = CastDest::Uninit(storage.uninit_ptr());
    copy_value(rt.abi(), tag, src, &mut dest)?;
    storage.mark_initialized();
    Ok(HostValue::boxed(rt, storage))
}

// ============================================================================
// Host to foreign
// ============================================================================

/// Converts a host value into the foreign destination, which must hold
/// `tag`. The match arms run in a fixed order; reordering them changes
/// which conversion wins for values supporting several protocols.
pub fn host_to_value(
    rt: &Runtime,
    src: &HostValue,
    tag: VariantTag,
    dest: &mut CastDest,
) -> BridgeResult<()> {
    let abi = rt.abi().clone();

    // A null destination accepts only the none value (a discarded return
    // slot); anything else has nowhere to go.
    if dest.is_null() {
        if src.is_none() {
            return Ok(());
        }
        return Err(BridgeError::NullTarget {
            host_type: src.type_name().to_owned(),
        });
    }

    if src.is_none() {
        return none_to_value(&abi, tag, dest);
    }

    match tag {
        VariantTag::Bool => {
            let v = src.as_bool_coerced();
            unsafe { write_raw(dest.make_uninit(&abi, tag), v as u8) };
            dest.mark_initialized();
            Ok(())
        }
        VariantTag::Int => {
            let v = src.coerce_int().ok_or_else(|| BridgeError::TypeCoercion {
                host_type: src.type_name().to_owned(),
                expected: "int",
            })?;
            unsafe { write_raw(dest.make_uninit(&abi, tag), v) };
            dest.mark_initialized();
            Ok(())
        }
        VariantTag::Float => {
            let v = src.coerce_float().ok_or_else(|| BridgeError::TypeCoercion {
                host_type: src.type_name().to_owned(),
                expected: "float",
            })?;
            unsafe { write_raw(dest.make_uninit(&abi, tag), v) };
            dest.mark_initialized();
            Ok(())
        }
        VariantTag::Object => {
            let binding = src.as_object_binding().ok_or_else(|| not_castable(src, tag))?;
            unsafe { write_raw(dest.make_uninit(&abi, tag), binding.raw_ptr().raw()) };
            dest.mark_initialized();
            Ok(())
        }
        VariantTag::Nil => host_to_variant_box(rt, src, dest),
        _ => host_to_typed_value(rt, src, tag, dest),
    }
}

/// The none value constructs the tag's default.
fn none_to_value(abi: &Rc<AbiTable>, tag: VariantTag, dest: &mut CastDest) -> BridgeResult<()> {
    match tag {
        VariantTag::Object => {
            unsafe { write_raw(dest.make_uninit(abi, tag), std::ptr::null_mut::<std::ffi::c_void>()) };
        }
        VariantTag::Nil => {
            let uninit = dest.make_uninit(abi, tag);
            abi.variant_new_nil()(uninit.assume_variant());
        }
        _ if tag.is_trivial() => {
            let uninit = dest.make_uninit(abi, tag);
            unsafe { std::ptr::write_bytes(uninit.raw().cast::<u8>(), 0, tag.info().size) };
        }
        _ => {
            let ctor = abi.get_ptr_constructor()(tag, 0)
                .ok_or(BridgeError::ConstructorUnavailable { tag })?;
            ctor(dest.make_uninit(abi, tag), &[]);
        }
    }
    dest.mark_initialized();
    Ok(())
}

/// Tag-agnostic destination: infer the natural tag and wrap the typed
/// value in a variant box.
fn host_to_variant_box(rt: &Runtime, src: &HostValue, dest: &mut CastDest) -> BridgeResult<()> {
    let abi = rt.abi().clone();
    let natural = natural_tag(src)?;
    if natural == VariantTag::Nil {
        return none_to_value(&abi, VariantTag::Nil, dest);
    }
    let from_type = abi.get_variant_from_type_constructor()(natural)
        .ok_or(BridgeError::ConstructorUnavailable { tag: natural })?;
    let temp = CastIn::new(rt, src, natural)?;
    let uninit = dest.make_uninit(&abi, VariantTag::Nil);
    from_type(uninit.assume_variant(), temp.as_const_ptr());
    dest.mark_initialized();
    Ok(())
}

fn host_to_typed_value(
    rt: &Runtime,
    src: &HostValue,
    tag: VariantTag,
    dest: &mut CastDest,
) -> BridgeResult<()> {
    let abi = rt.abi().clone();

    // A boxed value of the exact tag copies natively, skipping protocols.
    if let Some(boxed) = src.as_boxed() {
        if boxed.tag() == tag {
            return boxed.with_const_ptr(|ptr| copy_value(&abi, tag, ptr, dest));
        }
    }

    if tag.kind() == TagKind::StringLike {
        let text = src.as_text().ok_or_else(|| BridgeError::TypeCoercion {
            host_type: src.type_name().to_owned(),
            expected: "str",
        })?;
        let uninit = dest.make_uninit(&abi, tag);
        abi.string_new_with_utf8()(tag, uninit, text);
        dest.mark_initialized();
        return Ok(());
    }

    if tag == VariantTag::Dictionary {
        if let Some(pairs) = src.mapping_pairs() {
            return host_pairs_to_dictionary(rt, &pairs, dest);
        }
        return Err(not_castable(src, tag));
    }

    if tag.is_array_like() {
        if let Some(items) = src.sequence_items() {
            return host_items_to_array(rt, &items, tag, dest);
        }
        return Err(not_castable(src, tag));
    }

    if tag == VariantTag::Callable {
        return callable::host_callable_to_foreign(rt, src, dest);
    }

    Err(not_castable(src, tag))
}

fn host_pairs_to_dictionary(
    rt: &Runtime,
    pairs: &[(HostValue, HostValue)],
    dest: &mut CastDest,
) -> BridgeResult<()> {
    let abi = rt.abi().clone();
    let tag = VariantTag::Dictionary;
    let setter = abi.get_keyed_setter()(tag)
        .ok_or(BridgeError::ConstructorUnavailable { tag })?;
    if !dest.is_initialized() {
        let ctor = abi.get_ptr_constructor()(tag, 0)
            .ok_or(BridgeError::ConstructorUnavailable { tag })?;
        ctor(dest.make_uninit(&abi, tag), &[]);
        dest.mark_initialized();
    }
    for (key, value) in pairs {
        let key_box = CastIn::new(rt, key, VariantTag::Nil)?;
        let value_box = CastIn::new(rt, value, VariantTag::Nil)?;
        setter(
            dest.init_ptr(),
            key_box.as_const_ptr().assume_variant(),
            value_box.as_const_ptr().assume_variant(),
        );
    }
    Ok(())
}

fn host_items_to_array(
    rt: &Runtime,
    items: &[HostValue],
    tag: VariantTag,
    dest: &mut CastDest,
) -> BridgeResult<()> {
    let abi = rt.abi().clone();
    let setter = abi.get_indexed_setter()(tag)
        .ok_or(BridgeError::ConstructorUnavailable { tag })?;
    if !dest.is_initialized() {
        let ctor = abi.get_ptr_constructor()(tag, 0)
            .ok_or(BridgeError::ConstructorUnavailable { tag })?;
        ctor(dest.make_uninit(&abi, tag), &[]);
        dest.mark_initialized();
    }
    abi.array_resize()(tag, dest.init_ptr(), items.len() as i64);
    // The untyped array stores variant boxes; packed arrays store their
    // declared element type.
    let element = tag.element_tag().unwrap_or(VariantTag::Nil);
    for (i, item) in items.iter().enumerate() {
        let slot = CastIn::new(rt, item, element)?;
        setter(dest.init_ptr(), i as i64, slot.as_const_ptr());
    }
    Ok(())
}

fn not_castable(src: &HostValue, tag: VariantTag) -> BridgeError {
    BridgeError::NotCastable {
        host_type: src.type_name().to_owned(),
        tag,
    }
}

// ============================================================================
// Cast wrappers
// ============================================================================

/// A host value converted to a foreign argument for the duration of one
/// call. Borrows the boxed representation when the value already holds
/// the right tag; otherwise owns a converted temporary.
pub struct CastIn<'v> {
    slot: TempSlot<'v>,
}

enum TempSlot<'v> {
    Borrowed(ConstValuePtr, PhantomData<&'v ()>),
    Owned(ValueStorage),
}

impl<'v> CastIn<'v> {
    pub fn new(rt: &Runtime, value: &'v HostValue, tag: VariantTag) -> BridgeResult<Self> {
        if tag != VariantTag::Nil {
            if let Some(boxed) = value.as_boxed() {
                if boxed.tag() == tag {
                    // Pointer stays valid while `value` is borrowed; the
                    // boxed buffer is heap-allocated and never moves.
                    let ptr = boxed.with_const_ptr(|p| p);
                    return Ok(Self {
                        slot: TempSlot::Borrowed(ptr, PhantomData),
                    });
                }
            }
        }
        let mut storage = ValueStorage::new_uninit(rt.abi().clone(), tag);
        let mut dest = CastDest::Uninit(storage.uninit_ptr());
        let result = host_to_value(rt, value, tag, &mut dest);
        if dest.is_initialized() {
            storage.mark_initialized();
        }
        result?;
        Ok(Self {
            slot: TempSlot::Owned(storage),
        })
    }

    pub fn as_const_ptr(&self) -> ConstValuePtr {
        match &self.slot {
            TempSlot::Borrowed(ptr, _) => *ptr,
            TempSlot::Owned(storage) => storage.const_ptr(),
        }
    }
}

impl std::fmt::Debug for CastIn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.slot {
            TempSlot::Borrowed(ptr, _) => write!(f, "CastIn(borrowed {ptr:?})"),
            TempSlot::Owned(storage) => write!(f, "CastIn(owned {})", storage.tag().name()),
        }
    }
}

/// A foreign destination slot being written from host values, typically
/// a return slot handed in by the foreign side.
pub struct CastOut<'rt> {
    rt: &'rt Runtime,
    dest: CastDest,
    tag: VariantTag,
    target: Option<HostType>,
}

impl<'rt> CastOut<'rt> {
    pub fn new(
        rt: &'rt Runtime,
        dest: CastDest,
        tag: VariantTag,
        target: Option<HostType>,
    ) -> Self {
        Self {
            rt,
            dest,
            tag,
            target,
        }
    }

    pub fn assign(&mut self, value: &HostValue) -> BridgeResult<()> {
        host_to_value(self.rt, value, self.tag, &mut self.dest)
    }

    /// Reads the slot's current contents back as a host value.
    pub fn to_host(&self) -> BridgeResult<HostValue> {
        if self.dest.is_null() || !self.dest.is_initialized() {
            return Ok(HostValue::none(self.rt));
        }
        value_to_host(self.rt, self.dest.const_ptr(), self.tag, self.target.as_ref())
    }
}

/// An owned foreign slot a foreign call constructs its return value
/// into, read back as a host value afterwards.
pub struct CastSlot<'rt> {
    rt: &'rt Runtime,
    storage: ValueStorage,
    target: Option<HostType>,
}

impl<'rt> CastSlot<'rt> {
    pub fn new(rt: &'rt Runtime, tag: VariantTag, target: Option<HostType>) -> Self {
        Self {
            rt,
            storage: ValueStorage::new_uninit(rt.abi().clone(), tag),
            target,
        }
    }

    pub fn uninit_ptr(&mut self) -> UninitValuePtr {
        self.storage.uninit_ptr()
    }

    /// Declares that the foreign call constructed the slot.
    pub fn mark_constructed(&mut self) {
        self.storage.mark_initialized();
    }

    pub fn take_host(self) -> BridgeResult<HostValue> {
        if !self.storage.is_initialized() {
            return Ok(HostValue::none(self.rt));
        }
        value_to_host(
            self.rt,
            self.storage.const_ptr(),
            self.storage.tag(),
            self.target.as_ref(),
        )
    }
}

// ============================================================================
// Boxed value operations
// ============================================================================

/// Reads one entry of a boxed foreign dictionary without converting the
/// whole dictionary. An absent key is `None`, not an error.
pub fn boxed_dict_get(
    rt: &Runtime,
    dict: &HostValue,
    key: &HostValue,
) -> BridgeResult<Option<HostValue>> {
    let boxed = dict
        .as_boxed()
        .filter(|b| b.tag() == VariantTag::Dictionary)
        .ok_or_else(|| BridgeError::TypeCoercion {
            host_type: dict.type_name().to_owned(),
            expected: "foreign dictionary",
        })?;
    let abi = rt.abi().clone();
    let getter = abi.get_keyed_getter()(VariantTag::Dictionary)
        .ok_or(BridgeError::ConstructorUnavailable {
            tag: VariantTag::Dictionary,
        })?;
    let key_box = CastIn::new(rt, key, VariantTag::Nil)?;
    let mut out = ValueStorage::new_uninit(abi, VariantTag::Nil);
    let found = boxed.with_const_ptr(|dict_ptr| {
        getter(
            dict_ptr,
            key_box.as_const_ptr().assume_variant(),
            out.uninit_ptr().assume_variant(),
        )
    });
    if !found {
        return Ok(None);
    }
    out.mark_initialized();
    value_to_host(rt, out.const_ptr(), VariantTag::Nil, None).map(Some)
}

/// Foreign equality between two boxed values of the same tag, through
/// the foreign operator evaluator. Differently tagged or non-boxed
/// values do not compare.
pub fn boxed_eq(rt: &Runtime, a: &HostValue, b: &HostValue) -> Option<bool> {
    let (ba, bb) = (a.as_boxed()?, b.as_boxed()?);
    if ba.tag() != bb.tag() {
        return Some(false);
    }
    let abi = rt.abi().clone();
    let eval = abi.get_operator_evaluator()(varbridge_abi::OP_EQUAL, ba.tag(), bb.tag())?;
    let mut out = ValueStorage::new_uninit(abi, VariantTag::Bool);
    ba.with_const_ptr(|pa| bb.with_const_ptr(|pb| eval(pa, pb, out.uninit_ptr())));
    out.mark_initialized();
    Some(unsafe { out.read_scalar::<u8>() } != 0)
}

/// Foreign string form of a boxed value, through the foreign stringify
/// entry.
pub fn stringify_boxed(rt: &Runtime, value: &HostValue) -> BridgeResult<String> {
    let abi = rt.abi().clone();
    let boxed = CastIn::new(rt, value, VariantTag::Nil)?;
    let mut text = ValueStorage::new_uninit(abi.clone(), VariantTag::String);
    abi.variant_stringify()(boxed.as_const_ptr().assume_variant(), text.uninit_ptr());
    text.mark_initialized();
    Ok(abi.string_to_utf8()(text.const_ptr()))
}
