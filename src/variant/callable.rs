//! Host functions as foreign callables.
//!
//! A host function wraps into a foreign callable value through custom
//! callable hooks. The hooks carry the wrapped function's identity as
//! userdata, keyed by the runtime token, so a callable the bridge
//! created unwraps back to the very same host function instead of being
//! re-wrapped on the way in.

use std::ffi::c_void;
use std::rc::Rc;

use varbridge_abi::{CallStatus, CallableHooks, VariantTag};

use crate::boundary;
use crate::casting::cast::CastDest;
use crate::error::{BridgeError, BridgeResult};
use crate::host::runtime::Runtime;
use crate::host::value::{HostObj, HostValue};

/// Wraps a callable host value into the foreign callable at `dest`.
pub fn host_callable_to_foreign(
    rt: &Runtime,
    src: &HostValue,
    dest: &mut CastDest,
) -> BridgeResult<()> {
    if !src.is_callable() {
        return Err(BridgeError::TypeCoercion {
            host_type: src.type_name().to_owned(),
            expected: "callable",
        });
    }
    let abi = rt.abi().clone();
    let userdata = Rc::as_ptr(src.obj()) as *mut c_void;
    let weak_rt = rt.downgrade();

    let call_value = src.clone();
    let call_rt = weak_rt.clone();
    let hash_value = src.clone();
    let string_value = src.clone();
    // The hooks' captured clones keep the host function alive for the
    // life of the callable; the foreign side drops them all at destroy
    // time.
    let hooks = CallableHooks {
        token: rt.token(),
        userdata,
        call: Box::new(move |args, ret| match call_rt.upgrade() {
            Some(rt) => boundary::invoke_host_callable(&rt, &call_value, args, ret),
            None => CallStatus::Failed,
        }),
        is_valid: Box::new(|| true),
        hash: Box::new(move || hash_value.hash32()),
        equal: Box::new(move |other| other == userdata),
        to_string: Box::new(move || Some(string_value.display_string())),
        free: Box::new(|| {}),
    };

    let uninit = dest.make_uninit(&abi, VariantTag::Callable);
    abi.callable_custom_create()(uninit, hooks);
    dest.mark_initialized();
    Ok(())
}

/// Recovers the host function a bridge-created callable wraps. The
/// userdata is the wrapped object's identity; the callable's hooks hold
/// it alive, so the count bump here is always sound.
pub fn host_fn_from_userdata(userdata: *mut c_void) -> HostValue {
    let ptr = userdata.cast::<HostObj>().cast_const();
    unsafe {
        Rc::increment_strong_count(ptr);
        HostValue::from_obj(Rc::from_raw(ptr))
    }
}
