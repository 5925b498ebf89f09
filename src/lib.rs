//! Variant marshaling between a dynamic host runtime and a tagged-union
//! foreign ABI.
//!
//! The bridge owns three jobs: converting values in both directions
//! through the casting engine, keeping host and foreign object
//! lifetimes consistent through dual-ownership bindings, and framing
//! every boundary crossing so errors surface on the right side.

pub mod boundary;
pub mod casting;
pub mod error;
pub mod host;
pub mod meta;
pub mod util;
pub mod variant;

pub use varbridge_abi as abi;

pub mod prelude {
    pub use crate::boundary::{call_builtin, invoke_host_callable, virtual_call};
    pub use crate::casting::{ArgsIn, CastDest, CastIn, CastOut, CastSlot};
    pub use crate::error::{BridgeError, BridgeResult};
    pub use crate::host::{HostClass, HostPayload, HostType, HostValue, Runtime};
    pub use crate::meta::{CastInfo, MethodFlags, MethodInfo, ParamInfo};
    pub use crate::variant::{ObjectBinding, bound_instance, construct_object};
    pub use varbridge_abi::{AbiTable, AbiTableBuilder, VariantTag};
}
