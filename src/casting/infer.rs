//! Natural tag inference.
//!
//! When a destination slot is tag-agnostic, the source value picks its
//! own foreign representation. Class identity wins over structure, and
//! structural checks run in a fixed priority order so a value that
//! supports several protocols lands on one representation every time.

use varbridge_abi::VariantTag;

use crate::error::{BridgeError, BridgeResult};
use crate::host::value::HostValue;

/// The foreign tag `value` converts to when nothing constrains it.
pub fn natural_tag(value: &HostValue) -> BridgeResult<VariantTag> {
    if value.is_none() {
        return Ok(VariantTag::Nil);
    }
    if let Some(boxed) = value.as_boxed() {
        return Ok(boxed.tag());
    }
    if let Some(tag) = value.class().chain_wrapper_tag() {
        return Ok(tag);
    }
    if value.class().is_object {
        return Ok(VariantTag::Object);
    }

    // Structural fallbacks, most specific first.
    if value.is_interned_text() {
        return Ok(VariantTag::StringName);
    }
    if value.as_text().is_some() {
        return Ok(VariantTag::String);
    }
    if value.mapping_pairs().is_some() {
        return Ok(VariantTag::Dictionary);
    }
    if value.sequence_items().is_some() {
        return Ok(VariantTag::Array);
    }
    if value.supports_float() {
        return Ok(match value.payload() {
            crate::host::value::HostPayload::Bool(_) => VariantTag::Bool,
            crate::host::value::HostPayload::Float(_) => VariantTag::Float,
            _ => VariantTag::Int,
        });
    }
    if value.is_callable() {
        return Ok(VariantTag::Callable);
    }

    Err(BridgeError::NotCastable {
        host_type: value.type_name().to_owned(),
        tag: VariantTag::Nil,
    })
}
