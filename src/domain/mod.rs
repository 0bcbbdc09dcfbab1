//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod permalink;
pub mod thread;
pub mod types;
