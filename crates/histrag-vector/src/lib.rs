//! Persisted vector index over document chunks, backed by LanceDB.
//!
//! `build_or_load` is the entry point: it either validates and loads the
//! artifacts of an earlier build or chunks, embeds and persists the source
//! document. `FlatIndex` gives the same ranking fully in memory.

pub mod builder;
pub mod lance_index;
pub mod lock;
pub mod manifest;
pub mod memory;
pub mod schema;
pub mod table;

pub use builder::{build_or_load, BuildOptions};
pub use lance_index::LanceIndex;
pub use manifest::IndexManifest;
pub use memory::FlatIndex;

use histrag_core::types::Neighbor;

/// Closest first; equal distances fall back to ascending chunk id.
pub(crate) fn rank(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
}
