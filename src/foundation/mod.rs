//! Shared primitives: pixel frames, matrices, identifiers and the error taxonomy.

pub mod core;
pub mod error;
pub mod ids;
pub mod math;
