pub mod args;
pub mod cast;
pub mod infer;

pub use args::{ArgsIn, value_args_to_host, variant_args_to_host};
pub use cast::{
    CastDest, CastIn, CastOut, CastSlot, boxed_dict_get, boxed_eq, copy_value, host_to_value,
    stringify_boxed, value_to_host,
};
pub use infer::natural_tag;
