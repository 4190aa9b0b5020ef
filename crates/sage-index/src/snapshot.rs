//! Durable snapshot of the chunk corpus.
//!
//! The corpus is serialized to `chunks.json` inside the snapshot directory.
//! Writes go to a temporary file in the same directory followed by a rename,
//! so a crash mid-write leaves the previous snapshot intact; the index is
//! never corrupt, at worst the last mutation is lost.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use sage_core::{Chunk, Result};

const SNAPSHOT_FILE: &str = "chunks.json";
const SNAPSHOT_TMP: &str = "chunks.json.tmp";

/// Write the full corpus to the snapshot directory, atomically replacing
/// any previous snapshot.
pub fn write(dir: &Path, chunks: &[Chunk]) -> Result<()> {
    fs::create_dir_all(dir)?;

    let tmp = dir.join(SNAPSHOT_TMP);
    let data = serde_json::to_vec(chunks)?;
    fs::write(&tmp, data)?;
    fs::rename(&tmp, dir.join(SNAPSHOT_FILE))?;

    debug!(chunk_count = chunks.len(), path = %dir.display(), "snapshot written");
    Ok(())
}

/// Load the corpus from the snapshot directory. A missing snapshot is the
/// normal first-run state and yields an empty corpus.
pub fn load(dir: &Path) -> Result<Vec<Chunk>> {
    let path = snapshot_path(dir);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let data = fs::read(&path)?;
    let chunks: Vec<Chunk> = serde_json::from_slice(&data)?;
    info!(chunk_count = chunks.len(), path = %path.display(), "snapshot loaded");
    Ok(chunks)
}

fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}
