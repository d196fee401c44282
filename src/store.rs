use crate::models::EmbeddingRecord;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed collection of embedding records, one JSON record per line,
/// sorted ascending by `provider:relPath`. Loaded eagerly; rewritten whole.
pub struct VectorStore {
    path: PathBuf,
}

impl VectorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every valid record, keyed by identity. A missing file is an empty
    /// store. Lines that fail to parse (or lack identity/embedding fields)
    /// are dropped; the store must tolerate foreign or partially-written
    /// content.
    pub fn load(&self) -> Result<BTreeMap<String, EmbeddingRecord>> {
        let mut records = BTreeMap::new();
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(records),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EmbeddingRecord>(line) {
                Ok(rec) => {
                    records.insert(rec.key(), rec);
                }
                Err(e) => {
                    debug!("Skipping malformed store line: {e}");
                }
            }
        }

        Ok(records)
    }

    /// Persist the authoritative map, identity-sorted, via temp file + rename
    /// so a crash mid-write leaves the previous file intact. Returns the
    /// number of records written.
    ///
    /// Re-saving an unchanged map reproduces byte-identical output.
    pub fn save(&self, records: &BTreeMap<String, EmbeddingRecord>) -> Result<usize> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let mut out = String::new();
        for rec in records.values() {
            out.push_str(&serde_json::to_string(rec)?);
            out.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        fs::write(&tmp, &out).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        Ok(records.len())
    }
}
