//! Shared proxy types.

pub mod error;

pub use error::*;
