//! # sage-core
//!
//! Core types, traits, and abstractions for datasage.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other datasage crates depend on: the chunk and conversation
//! models, the stream event protocol, the query-mode router, backend traits,
//! and the shared error taxonomy.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod router;
pub mod traits;

pub use error::{Error, Result};
pub use models::*;
pub use router::Mode;
pub use traits::*;
