use crate::error::Result;
use crate::mime;
use crate::reconstruct::base_txid;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const MASTER_DIR: &str = "master";
const MASTER_FILE: &str = "master.json";

/// Entry persisted in the master index for one stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub inscription_id: String,
    pub txid: String,
    pub filename: String,
    pub mime_type: String,
    pub ext: String,
    pub size: u64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default = "default_complete")]
    pub complete: bool,
}

fn default_complete() -> bool {
    true
}

/// Flat directory of artifact files plus the JSON master index under
/// `master/`. Created lazily on first write.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    fn master_path(&self) -> PathBuf {
        self.root.join(MASTER_DIR).join(MASTER_FILE)
    }

    pub fn load_master(&self) -> Result<BTreeMap<String, ContentRecord>> {
        let path = self.master_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        match serde_json::from_str(&raw) {
            Ok(index) => Ok(index),
            Err(err) => {
                tracing::warn!(
                    "master index {} unreadable ({}); starting over",
                    path.display(),
                    err
                );
                Ok(BTreeMap::new())
            }
        }
    }

    pub fn master_entry(&self, inscription_id: &str) -> Result<Option<ContentRecord>> {
        Ok(self.load_master()?.remove(inscription_id))
    }

    /// Merge `record` over any existing entry for the same id. `createdAt`
    /// keeps the existing value when present, then the record's, then now.
    pub fn upsert_master_entry(&self, mut record: ContentRecord) -> Result<ContentRecord> {
        let mut index = self.load_master()?;

        if let Some(existing) = index.get(&record.inscription_id) {
            if !existing.created_at.is_empty() {
                record.created_at = existing.created_at.clone();
            }
        }
        if record.created_at.is_empty() {
            record.created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        }

        index.insert(record.inscription_id.clone(), record.clone());
        self.write_master(&index)?;
        Ok(record)
    }

    fn write_master(&self, index: &BTreeMap<String, ContentRecord>) -> Result<()> {
        let path = self.master_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(index)?;
        // Replace atomically so a reader never observes a torn index.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Locate an artifact by id without knowing its extension. The id is
    /// tried as given, as the stripped base txid, and as `<base>i0`, matching
    /// filenames case-insensitively on the `<candidate>.` prefix.
    pub fn find_file(&self, id: &str) -> Result<Option<PathBuf>> {
        let id = id.to_lowercase();
        let base = base_txid(&id);
        let mut candidates = vec![id.clone()];
        for candidate in [base.clone(), format!("{base}i0")] {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let names: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| {
                (
                    entry.file_name().to_string_lossy().to_lowercase(),
                    entry.path(),
                )
            })
            .collect();

        for candidate in &candidates {
            let prefix = format!("{candidate}.");
            if let Some((_, path)) = names.iter().find(|(name, _)| name.starts_with(&prefix)) {
                return Ok(Some(path.clone()));
            }
        }
        Ok(None)
    }

    /// Write an artifact and report its on-disk size.
    pub fn write_artifact(&self, filename: &str, bytes: &[u8]) -> Result<u64> {
        fs::create_dir_all(&self.root)?;
        let path = self.artifact_path(filename);
        fs::write(&path, bytes)?;
        Ok(fs::metadata(&path)?.len())
    }

    pub fn read_artifact(&self, filename: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.artifact_path(filename))?)
    }

    /// Register a file that exists on disk but was never indexed, deriving
    /// the mime type from its extension.
    pub fn register_existing(
        &self,
        inscription_id: &str,
        txid: &str,
        path: &Path,
    ) -> Result<ContentRecord> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| mime::FALLBACK_EXT.to_string());
        let mime_type = mime::mime_for_extension(&ext).to_string();
        let size = fs::metadata(path)?.len();

        self.upsert_master_entry(ContentRecord {
            inscription_id: inscription_id.to_string(),
            txid: txid.to_string(),
            filename,
            mime_type,
            ext,
            size,
            created_at: String::new(),
            complete: true,
        })
    }
}
