//! Shared building blocks: configuration, error taxonomy, domain types, the
//! trait seams for embedders / indexes / generators, chunking, source loading
//! and context assembly.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod config;
pub mod context;
pub mod error;
pub mod source;
pub mod traits;
pub mod types;

pub use chunker::RecursiveChunker;
pub use context::build_context;
pub use error::{Error, Result};
