// Platform abstraction layer for checkpoint file access.
//
// Three layers: the `CheckpointFile` trait, a facade enum that dispatches to the real file or
// (in tests) a mock, and the real implementation over `std::fs::File`.

mod abstractions;
mod facade;
mod real;

pub use abstractions::*;
pub use facade::*;
pub use real::*;
