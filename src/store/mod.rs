//! JSON-backed persistence for the catalogue, embeddings, and suggestion log.

pub mod audit;
pub mod catalogue;
pub mod embeddings;

use anyhow::Result;
use std::path::Path;

/// Write via temp file + rename so readers never observe a partial file.
pub(crate) fn write_atomic(path: &Path, data: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
