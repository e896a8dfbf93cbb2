//! Local snapshot files for response sets.
//!
//! A snapshot is the pretty-printed JSON of one [`ResponseSet`]. Writes go to a
//! temp file next to the destination and are renamed into place, so a reader
//! sees either the previous snapshot or the complete new one.
use crate::forms::ResponseSet;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Replace the snapshot at `path` with `responses`.
pub fn write_snapshot(path: &Path, responses: &ResponseSet) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;

    let bytes = serde_json::to_vec_pretty(responses).context("serialize response snapshot")?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(&bytes)
        .with_context(|| format!("write {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("publish {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        responses = responses.len(),
        bytes = bytes.len(),
        "wrote snapshot"
    );
    Ok(())
}

/// Load a snapshot previously written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<ResponseSet> {
    let bytes = fs::read(path).with_context(|| format!("read snapshot {}", path.display()))?;
    let responses: ResponseSet = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse snapshot {}", path.display()))?;
    Ok(responses)
}
