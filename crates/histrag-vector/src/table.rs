//! LanceDB connection and chunk-table helpers.

use arrow_array::{FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::Path;

use histrag_core::error::{Error, Result};
use histrag_core::types::Neighbor;

use crate::schema::{build_arrow_schema, CHUNKS_TABLE};

pub(crate) fn op_err(e: impl std::fmt::Display) -> Error {
    Error::Operation(e.to_string())
}

pub async fn open_db(dir: &Path) -> Result<Connection> {
    connect(dir.to_string_lossy().as_ref()).execute().await.map_err(op_err)
}

fn to_record_batch(first_id: usize, vectors: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
    let ids = (first_id..first_id + vectors.len())
        .map(|id| i32::try_from(id).map_err(|_| Error::Operation(format!("chunk id {id} exceeds Int32"))))
        .collect::<Result<Vec<i32>>>()?;
    let vectors = FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
        vectors.iter().map(|v| Some(v.iter().copied().map(Some))),
        dim,
    );
    RecordBatch::try_new(build_arrow_schema(dim), vec![std::sync::Arc::new(Int32Array::from(ids)), std::sync::Arc::new(vectors)])
        .map_err(op_err)
}

/// Create the chunk table with `vectors[i]` stored under id `i`, written in
/// record batches of `batch_size` rows.
pub async fn create_chunk_table(conn: &Connection, vectors: &[Vec<f32>], dim: usize, batch_size: usize) -> Result<Table> {
    let dim = i32::try_from(dim).map_err(|_| Error::Operation(format!("dimension {dim} exceeds Int32")))?;
    if vectors.is_empty() {
        return conn.create_empty_table(CHUNKS_TABLE, build_arrow_schema(dim)).execute().await.map_err(op_err);
    }
    let batches = vectors
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(i, part)| to_record_batch(i * batch_size.max(1), part, dim))
        .collect::<Result<Vec<_>>>()?;
    let reader = Box::new(RecordBatchIterator::new(batches.into_iter().map(Ok), build_arrow_schema(dim)));
    conn.create_table(CHUNKS_TABLE, reader).execute().await.map_err(op_err)
}

pub async fn open_chunk_table(conn: &Connection) -> Result<Table> {
    conn.open_table(CHUNKS_TABLE).execute().await.map_err(op_err)
}

/// Exact L2 search over the chunk table. Distances are squared Euclidean, as LanceDB reports them.
pub async fn search(table: &Table, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
    let mut stream = table
        .vector_search(query.to_vec())
        .map_err(op_err)?
        .distance_type(DistanceType::L2)
        .limit(k)
        .execute()
        .await
        .map_err(op_err)?;
    let mut hits = Vec::with_capacity(k);
    while let Some(batch) = stream.try_next().await.map_err(op_err)? {
        let ids = batch
            .column_by_name("id")
            .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
            .ok_or_else(|| Error::CorruptIndex("search result has no Int32 id column".into()))?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| Error::Operation("search result has no _distance column".into()))?;
        for i in 0..batch.num_rows() {
            let id = usize::try_from(ids.value(i))
                .map_err(|_| Error::CorruptIndex(format!("negative chunk id {}", ids.value(i))))?;
            hits.push(Neighbor { id, distance: distances.value(i) });
        }
    }
    Ok(hits)
}
