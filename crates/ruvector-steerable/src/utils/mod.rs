//! Utility functions for numerical operations

mod numerical;

pub use numerical::*;
