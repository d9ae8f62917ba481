//! Input/output helpers.
//!
//! - event JSON with the candidates to fit (`event`)
//! - engine configuration JSON read/write (`config`)
//! - solution exports (`export`)

pub mod config;
pub mod event;
pub mod export;

pub use config::*;
pub use event::*;
pub use export::*;
