//! HTTP request handlers.

pub mod ask;
pub mod conversations;
pub mod ingest;
