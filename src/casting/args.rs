//! Argument marshaling for whole call frames.
//!
//! Outbound calls convert every host argument up front into a pointer
//! vector the foreign side consumes in one go. The converted temporaries
//! and the pointers into them live in stable storage; no reallocation
//! happens after conversion starts.

use varbridge_abi::{ConstValuePtr, ConstVariantPtr, VariantTag};

use crate::casting::cast::{CastIn, value_to_host};
use crate::error::{BridgeError, BridgeResult};
use crate::host::class::HostType;
use crate::host::runtime::Runtime;
use crate::host::value::HostValue;
use crate::util::StableVector;

/// Host arguments converted to foreign argument pointers.
pub struct ArgsIn<'v> {
    // Field order matters: `ptrs` points into `casts` and must drop first.
    ptrs: StableVector<ConstValuePtr>,
    casts: StableVector<CastIn<'v>>,
}

impl<'v> ArgsIn<'v> {
    /// Converts positional arguments against a declared signature. Arity
    /// is checked before any argument converts, so a wrong argument
    /// count never reports a conversion failure.
    pub fn new_positional(
        rt: &Runtime,
        args: &'v [HostValue],
        tags: &[VariantTag],
    ) -> BridgeResult<Self> {
        if args.len() != tags.len() {
            return Err(BridgeError::ArgumentCount {
                expected: tags.len(),
                got: args.len(),
            });
        }
        let mut casts = StableVector::with_capacity(args.len());
        let mut ptrs = StableVector::with_capacity(args.len());
        for (arg, &tag) in args.iter().zip(tags) {
            let cast = casts.push(CastIn::new(rt, arg, tag)?);
            ptrs.push(cast.as_const_ptr());
        }
        Ok(Self { ptrs, casts })
    }

    /// Converts every argument to a variant box, for callees that take
    /// untyped argument lists.
    pub fn new_variadic(rt: &Runtime, args: &'v [HostValue]) -> BridgeResult<Self> {
        let mut casts = StableVector::with_capacity(args.len());
        let mut ptrs = StableVector::with_capacity(args.len());
        for arg in args {
            let cast = casts.push(CastIn::new(rt, arg, VariantTag::Nil)?);
            ptrs.push(cast.as_const_ptr());
        }
        Ok(Self { ptrs, casts })
    }

    pub fn ptrs(&self) -> &[ConstValuePtr] {
        self.ptrs.as_slice()
    }

    pub fn len(&self) -> usize {
        self.casts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.casts.is_empty()
    }
}

impl std::fmt::Debug for ArgsIn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgsIn").field("len", &self.len()).finish()
    }
}

/// Converts an inbound variant-box argument list to host values.
pub fn variant_args_to_host(
    rt: &Runtime,
    args: &[ConstVariantPtr],
) -> BridgeResult<Vec<HostValue>> {
    args.iter()
        .map(|vp| value_to_host(rt, vp.as_value(), VariantTag::Nil, None))
        .collect()
}

/// Converts an inbound typed argument list to host values against the
/// declared parameter tags and target classes.
pub fn value_args_to_host(
    rt: &Runtime,
    args: &[ConstValuePtr],
    params: &[(VariantTag, Option<HostType>)],
) -> BridgeResult<Vec<HostValue>> {
    if args.len() != params.len() {
        return Err(BridgeError::ArgumentCount {
            expected: params.len(),
            got: args.len(),
        });
    }
    args.iter()
        .zip(params)
        .map(|(ptr, (tag, target))| value_to_host(rt, *ptr, *tag, target.as_ref()))
        .collect()
}
