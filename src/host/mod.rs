pub mod class;
pub mod runtime;
pub mod value;

pub use class::{ClassRegistry, HostClass, HostType};
pub use runtime::{Runtime, WeakRuntime};
pub use value::{BoxedVariant, HostFn, HostKey, HostPayload, HostValue};
