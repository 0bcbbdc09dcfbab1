//! pagina: a resource-oriented blog server.
//!
//! Every URL names a resource and every HTTP verb is an action on it. Layers
//! follow the usual split: `domain` for invariants, `application` for the
//! services and repository traits, `infra` for adapters, and `presentation`
//! for templates.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
