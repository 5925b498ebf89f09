//! Boundary frames.
//!
//! Every crossing between the host and the foreign side goes through a
//! function here. Inbound frames (the foreign side calling host code)
//! catch every host error, report it, and hand back a status code the
//! foreign side understands; errors never unwind across the boundary.
//! Outbound frames (host code calling foreign methods) marshal whole
//! argument frames and read back the return slot.

use varbridge_abi::{
    CallStatus, ConstValuePtr, ConstVariantPtr, RawObject, UninitValuePtr, UninitVariantPtr,
    ValuePtr, VariantPtr, VariantTag,
};

use crate::casting::args::{ArgsIn, value_args_to_host, variant_args_to_host};
use crate::casting::cast::{CastDest, CastOut, CastSlot, host_to_value};
use crate::error::{BridgeError, BridgeResult};
use crate::host::runtime::Runtime;
use crate::host::value::HostValue;
use crate::meta::{MethodFlags, MethodInfo};

/// Reports a host error that reached a boundary frame.
///
/// Recoverable errors go to the foreign side's error sink and execution
/// continues. Fatal errors mean bridge state can no longer be trusted;
/// they terminate the process after printing.
#[track_caller]
pub fn report_error(rt: &Runtime, err: &BridgeError, function: &str) {
    if let BridgeError::SystemExit { code } = err {
        std::process::exit(*code);
    }
    if err.is_fatal() {
        eprintln!("fatal bridge error in {function}: {}", err.report_text());
        std::process::abort();
    }
    let location = std::panic::Location::caller();
    rt.abi().print_error()(
        &err.report_text(),
        function,
        location.file(),
        location.line(),
    );
}

fn status_for(err: &BridgeError) -> CallStatus {
    match err {
        BridgeError::ArgumentCount { .. } => CallStatus::InvalidArguments,
        _ => CallStatus::Failed,
    }
}

// ============================================================================
// Inbound frames
// ============================================================================

/// Calls a host function on behalf of a foreign callable invocation.
/// Arguments arrive as variant boxes; the result lands in the
/// pre-initialized variant return slot.
pub fn invoke_host_callable(
    rt: &Runtime,
    func: &HostValue,
    args: &[ConstVariantPtr],
    ret: VariantPtr,
) -> CallStatus {
    let outcome = variant_args_to_host(rt, args)
        .and_then(|host_args| func.call(rt, &host_args))
        .and_then(|result| {
            let mut out = CastOut::new(rt, CastDest::Init(ret.as_value()), VariantTag::Nil, None);
            out.assign(&result)
        });
    match outcome {
        Ok(()) => CallStatus::Ok,
        Err(err) => {
            report_error(rt, &err, "invoke_host_callable");
            status_for(&err)
        }
    }
}

/// Calls a host function for a foreign virtual dispatch. Arguments
/// arrive as typed pointers matching the declared signature; the return
/// slot is raw memory the host result is constructed into.
pub fn virtual_call(
    rt: &Runtime,
    func: &HostValue,
    method: &MethodInfo,
    args: &[ConstValuePtr],
    ret: UninitValuePtr,
) -> CallStatus {
    let outcome = value_args_to_host(rt, args, &method.param_targets())
        .and_then(|host_args| {
            func.call(rt, &host_args)
                .map_err(|e| e.with_note(format!("while dispatching {}", method.name)))
        })
        .and_then(|result| match &method.ret {
            Some(cast) => {
                let mut out = CastOut::new(rt, CastDest::Uninit(ret), cast.tag, None);
                out.assign(&result)
            }
            None => Ok(()),
        });
    match outcome {
        Ok(()) => CallStatus::Ok,
        Err(err) => {
            report_error(rt, &err, &method.name);
            status_for(&err)
        }
    }
}

/// Answers a foreign property read from the host object's attribute
/// table. A missing attribute is a soft miss, not an error.
pub fn property_get_into(
    rt: &Runtime,
    receiver: &HostValue,
    name: &str,
    ret: UninitVariantPtr,
) -> BridgeResult<bool> {
    let value = receiver.obj().attrs.borrow().get(name).cloned();
    match value {
        Some(value) => {
            let mut dest = CastDest::Uninit(ret.as_value());
            host_to_value(rt, &value, VariantTag::Nil, &mut dest)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Stores a foreign property write into the host object's attribute
/// table.
pub fn property_set(
    rt: &Runtime,
    receiver: &HostValue,
    name: &str,
    value: ConstVariantPtr,
) -> BridgeResult<()> {
    let host = crate::casting::cast::value_to_host(rt, value.as_value(), VariantTag::Nil, None)?;
    receiver
        .obj()
        .attrs
        .borrow_mut()
        .insert(name.to_owned(), host);
    Ok(())
}

// ============================================================================
// Outbound frames
// ============================================================================

/// Calls a foreign method with host arguments through the pointer-call
/// path. All arguments convert before the call starts; a conversion
/// failure leaves the foreign side untouched.
pub fn call_builtin(
    rt: &Runtime,
    receiver: Option<&HostValue>,
    method: &MethodInfo,
    args: &[HostValue],
) -> BridgeResult<HostValue> {
    let bind = rt.abi().get_method_bind()(
        &method.class_name,
        &method.name,
        method.signature_hash(),
    )
    .ok_or_else(|| {
        BridgeError::host(format!(
            "no foreign method {}::{} with the declared signature",
            method.class_name, method.name
        ))
    })?;

    let raw = if method.flags.contains(MethodFlags::STATIC) {
        RawObject::null()
    } else {
        let receiver = receiver.ok_or_else(|| {
            BridgeError::host(format!("method {} requires a receiver", method.name))
        })?;
        receiver
            .as_object_binding()
            .ok_or_else(|| BridgeError::TypeCoercion {
                host_type: receiver.type_name().to_owned(),
                expected: "object",
            })?
            .raw_ptr()
    };

    let args = method.fill_defaults(args)?;
    let frame = ArgsIn::new_positional(rt, &args, &method.param_tags())?;

    let Some(ret) = &method.ret else {
        rt.abi().method_bind_ptrcall()(bind, raw, frame.ptrs(), ValuePtr::null());
        return Ok(HostValue::none(rt));
    };

    let mut slot = CastSlot::new(rt, ret.tag, ret.host_type.clone());
    rt.abi().method_bind_ptrcall()(bind, raw, frame.ptrs(), slot.uninit_ptr().assume_init());
    slot.mark_constructed();
    slot.take_host()
}
