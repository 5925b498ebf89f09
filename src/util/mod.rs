pub mod stable_vector;

pub use stable_vector::StableVector;
