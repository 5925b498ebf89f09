//! The bridge runtime.
//!
//! One [`Runtime`] owns the resolved ABI table, the class registry, the
//! object binding table, and the deferred task queue. Handles are cheap
//! clones; the foreign side identifies this runtime by its token.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::c_void;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use varbridge_abi::{AbiTable, RawObject};

use crate::host::class::ClassRegistry;
use crate::host::value::HostObj;

/// A task queued for the next idle point. Tasks re-validate their
/// preconditions when they run; the world may have changed since they
/// were queued.
pub type DeferredTask = Box<dyn FnOnce(&Runtime)>;

pub struct RuntimeInner {
    abi: Rc<AbiTable>,
    classes: RefCell<ClassRegistry>,
    /// Foreign object pointer to the host object bound to it. Weak so the
    /// table never keeps a binding alive by itself.
    bindings: RefCell<FxHashMap<RawObject, Weak<HostObj>>>,
    deferred: RefCell<VecDeque<DeferredTask>>,
}

#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning runtime handle stored in long-lived foreign-side state.
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl Runtime {
    pub fn new(abi: Rc<AbiTable>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                abi,
                classes: RefCell::new(ClassRegistry::new()),
                bindings: RefCell::new(FxHashMap::default()),
                deferred: RefCell::new(VecDeque::new()),
            }),
        }
    }

    pub fn abi(&self) -> &Rc<AbiTable> {
        &self.inner.abi
    }

    /// Identifies this runtime across the boundary. Stable for the life
    /// of the runtime.
    pub fn token(&self) -> *mut c_void {
        Rc::as_ptr(&self.inner) as *mut c_void
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn classes(&self) -> std::cell::Ref<'_, ClassRegistry> {
        self.inner.classes.borrow()
    }

    pub fn classes_mut(&self) -> std::cell::RefMut<'_, ClassRegistry> {
        self.inner.classes.borrow_mut()
    }

    // ========================================================================
    // Binding table
    // ========================================================================

    pub fn lookup_binding(&self, raw: RawObject) -> Option<Rc<HostObj>> {
        self.inner
            .bindings
            .borrow()
            .get(&raw)
            .and_then(Weak::upgrade)
    }

    pub fn insert_binding(&self, raw: RawObject, obj: &Rc<HostObj>) {
        self.inner
            .bindings
            .borrow_mut()
            .insert(raw, Rc::downgrade(obj));
    }

    /// Removes the entry for `raw` only if it still points at a dead or
    /// matching host object. A new binding may have been installed for a
    /// recycled pointer in the meantime.
    pub fn remove_binding(&self, raw: RawObject, obj: *const HostObj) {
        let mut bindings = self.inner.bindings.borrow_mut();
        if let Some(weak) = bindings.get(&raw) {
            let stale = match weak.upgrade() {
                Some(live) => Rc::as_ptr(&live) == obj,
                None => true,
            };
            if stale {
                bindings.remove(&raw);
            }
        }
    }

    // ========================================================================
    // Deferred queue
    // ========================================================================

    /// Queues work to run at the next [`flush_deferred`] call. Safe to
    /// call from foreign callbacks that must not re-enter the bridge.
    ///
    /// [`flush_deferred`]: Runtime::flush_deferred
    pub fn call_deferred(&self, task: DeferredTask) {
        self.inner.deferred.borrow_mut().push_back(task);
    }

    /// Runs queued tasks in order. Tasks queued while flushing run in the
    /// same flush.
    pub fn flush_deferred(&self) {
        loop {
            let task = self.inner.deferred.borrow_mut().pop_front();
            match task {
                Some(task) => task(self),
                None => break,
            }
        }
    }

    pub fn deferred_len(&self) -> usize {
        self.inner.deferred.borrow().len()
    }
}
