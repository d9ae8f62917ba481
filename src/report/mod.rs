//! Terminal reporting for fitted solutions and the parameter layout.

pub mod format;

pub use format::*;
