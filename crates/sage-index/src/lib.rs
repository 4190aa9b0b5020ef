//! # sage-index
//!
//! Hybrid retrieval for datasage: a semantic (embedding-distance) index and
//! a lexical (BM25) index over the same chunk corpus, combined by weighted
//! position-score fusion, with a durable corpus snapshot.

pub mod chunking;
pub mod fusion;
pub mod lexical;
pub mod semantic;
pub mod service;
pub mod snapshot;

pub use chunking::{split_text, ChunkerConfig};
pub use fusion::{fuse, FusedHit};
pub use lexical::LexicalIndex;
pub use semantic::SemanticIndex;
pub use service::IndexService;
