pub mod callable;
pub mod object;
pub mod storage;

pub use object::{BINDING_CALLBACKS, LAST_HOST_REF_COUNT, ObjectBinding, bound_instance, construct_object};
pub use storage::ValueStorage;
