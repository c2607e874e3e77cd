use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Name of the LanceDB table holding one row per chunk.
pub const CHUNKS_TABLE: &str = "chunks";

/// `id` is the chunk ordinal; `vector` its embedding.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}
