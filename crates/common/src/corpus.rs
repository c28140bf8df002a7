//! Corpus snapshot persistence
//!
//! The corpus is written and read as one JSON array of chunks. There is no
//! schema version and no partial update: ingestion rewrites the whole file,
//! search loads it whole. `f32` values round-trip exactly through serde_json.

use crate::errors::{AppError, Result};
use crate::models::Chunk;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Write the full chunk sequence to `path`, replacing any previous snapshot
#[instrument(skip_all, fields(path = %path.display(), chunks = chunks.len()))]
pub async fn save_corpus(path: &Path, chunks: &[Chunk]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let bytes = serde_json::to_vec(chunks)?;

    // Write beside the target then rename, so readers never see a partial file
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await.map_err(|e| snapshot_error(path, e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| snapshot_error(path, e))?;

    info!(bytes = bytes.len(), "Corpus snapshot written");
    Ok(())
}

/// Read a snapshot written by [`save_corpus`]. Rejects a corpus whose
/// embeddings do not all share one dimension.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load_corpus(path: &Path) -> Result<Vec<Chunk>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| snapshot_error(path, e))?;
    let chunks: Vec<Chunk> = serde_json::from_slice(&bytes).map_err(|e| AppError::Snapshot {
        path: path.display().to_string(),
        message: format!("Malformed snapshot: {}", e),
    })?;

    let dimension = check_dimensions(&chunks)?;
    let embedded = chunks.iter().filter(|c| c.has_embedding()).count();

    debug!(chunks = chunks.len(), embedded, ?dimension, "Corpus snapshot loaded");
    Ok(chunks)
}

/// Dimension shared by every embedded chunk, `None` when nothing is embedded yet
pub fn check_dimensions(chunks: &[Chunk]) -> Result<Option<usize>> {
    let mut expected: Option<usize> = None;
    for chunk in chunks {
        let Some(embedding) = chunk.embedding() else {
            continue;
        };
        match expected {
            None => expected = Some(embedding.len()),
            Some(dim) if dim != embedding.len() => {
                return Err(AppError::DimensionMismatch {
                    expected: dim,
                    found: embedding.len(),
                    chunk_id: chunk.chunk_id,
                })
            }
            Some(_) => {}
        }
    }
    Ok(expected)
}

fn snapshot_error(path: &Path, e: std::io::Error) -> AppError {
    AppError::Snapshot {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
