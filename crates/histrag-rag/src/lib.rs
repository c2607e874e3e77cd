//! Retrieval and the query service built on top of it.

pub mod retriever;
pub mod service;

pub use retriever::Retriever;
pub use service::{preview, RagService};
