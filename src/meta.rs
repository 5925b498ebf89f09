//! Declared method signatures.
//!
//! Outbound calls are resolved against the foreign side by class name,
//! method name, and a signature hash over the declared parameter and
//! return tags. Both sides compute the hash with the same scheme, so a
//! mismatch surfaces as a failed lookup instead of a miscast.

use std::borrow::Cow;

use bitflags::bitflags;
use xxhash_rust::xxh64::Xxh64;

use varbridge_abi::VariantTag;

use crate::error::{BridgeError, BridgeResult};
use crate::host::class::HostType;
use crate::host::value::HostValue;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodFlags: u32 {
        const STATIC  = 1 << 0;
        const CONST   = 1 << 1;
        const VIRTUAL = 1 << 2;
        const VARARG  = 1 << 3;
    }
}

/// How a declared tag maps back into the host world.
#[derive(Debug, Clone)]
pub struct CastInfo {
    pub tag: VariantTag,
    /// Host class the value should land in, when the declaration names
    /// one more specific than the tag's default wrapper.
    pub host_type: Option<HostType>,
}

impl CastInfo {
    pub fn of(tag: VariantTag) -> Self {
        Self { tag, host_type: None }
    }

    pub fn typed(tag: VariantTag, host_type: HostType) -> Self {
        Self { tag, host_type: Some(host_type) }
    }
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    pub cast: CastInfo,
    /// Value substituted when the caller omits this trailing argument.
    pub default: Option<HostValue>,
}

impl ParamInfo {
    pub fn required(name: impl Into<String>, cast: CastInfo) -> Self {
        Self { name: name.into(), cast, default: None }
    }

    pub fn optional(name: impl Into<String>, cast: CastInfo, default: HostValue) -> Self {
        Self { name: name.into(), cast, default: Some(default) }
    }
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub class_name: String,
    pub name: String,
    pub flags: MethodFlags,
    pub params: Vec<ParamInfo>,
    /// `None` is a void method; `Nil` is a variant-box return.
    pub ret: Option<CastInfo>,
}

impl MethodInfo {
    pub fn param_tags(&self) -> Vec<VariantTag> {
        self.params.iter().map(|p| p.cast.tag).collect()
    }

    pub fn ret_tag(&self) -> VariantTag {
        self.ret.as_ref().map_or(VariantTag::Nil, |c| c.tag)
    }

    pub fn signature_hash(&self) -> u64 {
        signature_hash(&self.class_name, &self.name, &self.param_tags(), self.ret_tag())
    }

    /// Parameter (tag, target class) pairs for inbound conversion.
    pub fn param_targets(&self) -> Vec<(VariantTag, Option<HostType>)> {
        self.params
            .iter()
            .map(|p| (p.cast.tag, p.cast.host_type.clone()))
            .collect()
    }

    /// Pads omitted trailing arguments with their declared defaults. An
    /// omitted argument without a default is an arity error.
    pub fn fill_defaults<'a>(&self, args: &'a [HostValue]) -> BridgeResult<Cow<'a, [HostValue]>> {
        if args.len() >= self.params.len() {
            return Ok(Cow::Borrowed(args));
        }
        let mut filled = args.to_vec();
        for param in &self.params[args.len()..] {
            let default = param.default.clone().ok_or(BridgeError::ArgumentCount {
                expected: self.params.len(),
                got: args.len(),
            })?;
            filled.push(default);
        }
        Ok(Cow::Owned(filled))
    }
}

/// Hash identifying one method signature. Covers the class, the name,
/// the parameter tags in order, and the return tag.
pub fn signature_hash(class: &str, method: &str, params: &[VariantTag], ret: VariantTag) -> u64 {
    let mut hasher = Xxh64::new(0);
    hasher.update(class.as_bytes());
    hasher.update(b"::");
    hasher.update(method.as_bytes());
    for tag in params {
        hasher.update(&tag.to_raw().to_le_bytes());
    }
    hasher.update(&[0xff]);
    hasher.update(&ret.to_raw().to_le_bytes());
    hasher.digest()
}
