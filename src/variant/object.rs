//! Dual-ownership object bindings.
//!
//! A foreign object and its host counterpart keep each other alive from
//! opposite sides: the host object owns an [`ObjectBinding`] holding the
//! raw foreign pointer, and for reference-counted classes the binding
//! holds one structural foreign reference. Extra foreign references pin
//! the host object through the keepalive list, so the pair dies only
//! when both sides have let go.
//!
//! Refcount callbacks arrive from inside the foreign side's own refcount
//! bookkeeping, where re-entering it to destroy the object would corrupt
//! state. The release path therefore runs as a deferred task that
//! re-validates its preconditions before acting.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::rc::{Rc, Weak};

use varbridge_abi::{BindingCallbacks, MethodBind, RawObject, VariantTag};

use crate::error::{BridgeError, BridgeResult};
use crate::host::class::HostType;
use crate::host::runtime::{Runtime, WeakRuntime};
use crate::host::value::{HostObj, HostValue};
use crate::meta;
use crate::variant::storage::ValueStorage;

/// Host reference count at which only the release machinery itself holds
/// the object: the reference just popped off the keepalive list. A
/// strong count of exactly this value means no real host reference
/// remains and dropping the popped reference finalizes the object.
pub const LAST_HOST_REF_COUNT: usize = 1;

pub struct ObjectBinding {
    rt: WeakRuntime,
    ptr: Cell<RawObject>,
    class_name: String,
    refcounted: bool,
    /// The host constructed this object and is responsible for its
    /// destruction when not reference-counted.
    host_owned: Cell<bool>,
    /// The host object bound to this foreign object. Weak to avoid a
    /// permanent cycle; the keepalive list pins it when the foreign side
    /// holds references.
    handle: RefCell<Weak<HostObj>>,
    /// One strong host reference per extra foreign reference.
    keepalive: RefCell<Vec<HostValue>>,
    release_pending: Cell<bool>,
}

impl ObjectBinding {
    pub fn raw_ptr(&self) -> RawObject {
        self.ptr.get()
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn is_refcounted(&self) -> bool {
        self.refcounted
    }

    pub fn is_alive(&self) -> bool {
        !self.ptr.get().is_null()
    }

    // ========================================================================
    // Foreign refcount protocol
    // ========================================================================

    fn refcount_bind(&self, rt: &Runtime, method: &str, ret: VariantTag) -> Option<MethodBind> {
        let hash = meta::signature_hash("RefCounted", method, &[], ret);
        rt.abi().get_method_bind()("RefCounted", method, hash)
    }

    fn refcount_call_bool(&self, rt: &Runtime, method: &str) -> bool {
        let Some(bind) = self.refcount_bind(rt, method, VariantTag::Bool) else {
            return false;
        };
        let mut ret = ValueStorage::new_uninit(rt.abi().clone(), VariantTag::Bool);
        rt.abi().method_bind_ptrcall()(
            bind,
            self.ptr.get(),
            &[],
            ret.uninit_ptr().assume_init(),
        );
        ret.mark_initialized();
        unsafe { ret.read_scalar::<u8>() != 0 }
    }

    /// Current foreign reference count, including the binding's own
    /// structural reference.
    pub fn foreign_refcount(&self, rt: &Runtime) -> i64 {
        let Some(bind) = self.refcount_bind(rt, "get_reference_count", VariantTag::Int) else {
            return 0;
        };
        let mut ret = ValueStorage::new_uninit(rt.abi().clone(), VariantTag::Int);
        rt.abi().method_bind_ptrcall()(
            bind,
            self.ptr.get(),
            &[],
            ret.uninit_ptr().assume_init(),
        );
        ret.mark_initialized();
        unsafe { ret.read_scalar::<i64>() }
    }

    fn init_ref(&self, rt: &Runtime) -> bool {
        self.refcount_call_bool(rt, "init_ref")
    }

    /// Drops one foreign reference. True means the count reached zero
    /// and the caller must destroy the object.
    fn unreference_raw(&self, rt: &Runtime, raw: RawObject) -> bool {
        let hash = meta::signature_hash("RefCounted", "unreference", &[], VariantTag::Bool);
        let Some(bind) = rt.abi().get_method_bind()("RefCounted", "unreference", hash) else {
            return false;
        };
        let mut ret = ValueStorage::new_uninit(rt.abi().clone(), VariantTag::Bool);
        rt.abi().method_bind_ptrcall()(bind, raw, &[], ret.uninit_ptr().assume_init());
        ret.mark_initialized();
        unsafe { ret.read_scalar::<u8>() != 0 }
    }

    // ========================================================================
    // Lifecycle events
    // ========================================================================

    /// Fired by the foreign side after it adjusted its own reference
    /// count. `acquired` is true for a new foreign reference.
    pub fn reference_event(self: &Rc<Self>, acquired: bool) -> bool {
        let Some(rt) = self.rt.upgrade() else {
            return true;
        };
        if acquired {
            if let Some(obj) = self.handle.borrow().upgrade() {
                self.keepalive
                    .borrow_mut()
                    .push(HostValue::from_obj(obj));
            }
            return true;
        }

        let popped = self.keepalive.borrow_mut().pop();
        if let Some(last) = popped {
            // Dropping the final host reference here would destroy the
            // foreign object from inside its own refcount bookkeeping.
            // Hand the reference to a deferred task instead.
            let only_holder = Rc::strong_count(last.obj()) == LAST_HOST_REF_COUNT;
            if only_holder && self.is_alive() && !self.release_pending.get() {
                self.release_pending.set(true);
                let binding = Rc::clone(self);
                rt.call_deferred(Box::new(move |rt| {
                    binding.release_pending.set(false);
                    // Re-validate: a new reference from either side since
                    // queueing cancels the release.
                    let still_last = Rc::strong_count(last.obj()) == LAST_HOST_REF_COUNT;
                    if still_last && binding.is_alive() && binding.foreign_refcount(rt) == 1 {
                        drop(last);
                    }
                }));
            }
        }
        true
    }

    /// Runs when the bound host object is dropped. Releases the
    /// structural foreign reference and destroys the object if this side
    /// owned the last one.
    pub fn on_host_finalize(&self, host: *const HostObj) {
        let raw = self.ptr.get();
        if raw.is_null() {
            return;
        }
        self.ptr.set(RawObject::null());
        let Some(rt) = self.rt.upgrade() else {
            return;
        };
        rt.remove_binding(raw, host);
        if self.refcounted {
            if self.unreference_raw(&rt, raw) {
                rt.abi().object_destroy()(raw);
            }
        } else if self.host_owned.get() {
            rt.abi().object_destroy()(raw);
        }
    }

    // ========================================================================
    // Cycle collection hooks
    // ========================================================================

    /// Reports host references this binding pins, plus the bound object
    /// itself when only the structural foreign reference keeps the pair
    /// alive. A collector that sees that self edge may break the cycle
    /// with [`gc_clear`].
    ///
    /// [`gc_clear`]: ObjectBinding::gc_clear
    pub fn gc_traverse(&self, visit: &mut dyn FnMut(&HostValue)) {
        for value in self.keepalive.borrow().iter() {
            visit(value);
        }
        let Some(rt) = self.rt.upgrade() else {
            return;
        };
        if self.refcounted && self.is_alive() && self.foreign_refcount(&rt) == 1 {
            if let Some(obj) = self.handle.borrow().upgrade() {
                let value = HostValue::from_obj(obj);
                visit(&value);
            }
        }
    }

    /// Breaks the ownership cycle: drops pinned host references and the
    /// structural foreign reference.
    pub fn gc_clear(&self) {
        self.keepalive.borrow_mut().clear();
        let raw = self.ptr.get();
        if raw.is_null() {
            return;
        }
        let Some(rt) = self.rt.upgrade() else {
            return;
        };
        if self.refcounted {
            self.ptr.set(RawObject::null());
            if self.unreference_raw(&rt, raw) {
                rt.abi().object_destroy()(raw);
            }
        }
    }

}

// ============================================================================
// Instance binding callbacks
// ============================================================================

/// The binding pointer registered with the foreign side is a raw
/// `Rc<ObjectBinding>`; the foreign side owns that count until it fires
/// the free callback.
pub static BINDING_CALLBACKS: BindingCallbacks = BindingCallbacks {
    create: binding_create,
    free: binding_free,
    reference: binding_reference,
};

fn binding_create(_token: *mut c_void, _object: *mut c_void) -> *mut c_void {
    // Bindings are always installed eagerly at bind time; the foreign
    // side never needs to create one on demand.
    std::ptr::null_mut()
}

fn binding_free(_token: *mut c_void, _object: *mut c_void, binding: *mut c_void) {
    if !binding.is_null() {
        drop(unsafe { Rc::from_raw(binding.cast::<ObjectBinding>()) });
    }
}

fn binding_reference(_token: *mut c_void, binding: *mut c_void, reference: bool) -> bool {
    if binding.is_null() {
        return true;
    }
    let binding = unsafe {
        Rc::increment_strong_count(binding.cast::<ObjectBinding>());
        Rc::from_raw(binding.cast::<ObjectBinding>())
    };
    binding.reference_event(reference)
}

// ============================================================================
// Binding construction
// ============================================================================

fn bind_new(
    rt: &Runtime,
    raw: RawObject,
    class: HostType,
    class_name: String,
    host_owned: bool,
) -> HostValue {
    let binding = Rc::new(ObjectBinding {
        rt: rt.downgrade(),
        ptr: Cell::new(raw),
        class_name,
        refcounted: class.refcounted,
        host_owned: Cell::new(host_owned),
        handle: RefCell::new(Weak::new()),
        keepalive: RefCell::new(Vec::new()),
        release_pending: Cell::new(false),
    });
    let value = HostValue::from_object(class, Rc::clone(&binding));
    *binding.handle.borrow_mut() = Rc::downgrade(value.obj());
    rt.insert_binding(raw, value.obj());

    let binding_raw = Rc::into_raw(Rc::clone(&binding)) as *mut c_void;
    rt.abi().object_set_instance_binding()(raw, rt.token(), binding_raw, &BINDING_CALLBACKS);

    if binding.refcounted {
        binding.init_ref(rt);
    }
    value
}

/// Host value bound to the foreign object at `raw`, reusing the live
/// binding when one exists. The same foreign pointer always yields the
/// same host object.
pub fn bound_instance(rt: &Runtime, raw: RawObject) -> BridgeResult<HostValue> {
    if raw.is_null() {
        return Ok(HostValue::none(rt));
    }
    if let Some(obj) = rt.lookup_binding(raw) {
        return Ok(HostValue::from_obj(obj));
    }
    let class_name = rt.abi().object_get_class_name()(raw);
    let class = rt
        .classes()
        .lookup(&class_name)
        .ok_or_else(|| BridgeError::host(format!("unknown foreign class '{class_name}'")))?;
    Ok(bind_new(rt, raw, class, class_name, false))
}

/// Constructs a fresh foreign object of `class` and binds it. The host
/// owns non-reference-counted results.
pub fn construct_object(rt: &Runtime, class: &HostType) -> BridgeResult<HostValue> {
    let raw = rt.abi().object_construct()(&class.name);
    if raw.is_null() {
        return Err(BridgeError::host(format!(
            "foreign class '{}' cannot be constructed",
            class.name
        )));
    }
    rt.abi().object_set_instance()(raw, &class.name, std::ptr::null_mut());
    Ok(bind_new(rt, raw, class.clone(), class.name.clone(), true))
}
