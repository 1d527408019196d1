//! The "already scraped" cache: an ordered map from identity key to merged
//! record, backed by a pretty-printed JSON array on disk, plus a page cursor
//! sidecar so an interrupted run can pick up where it stopped.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::record::{IdentityKey, RawRecord};

/// Where a run was when it last finished a list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Partition name (county, zip code); empty for unpartitioned targets.
    pub partition: String,
    pub partition_index: usize,
    /// Next list page to fetch.
    pub page: u32,
}

pub struct ScrapeStore {
    path: PathBuf,
    records: IndexMap<IdentityKey, RawRecord>,
    unsaved: usize,
}

impl ScrapeStore {
    /// Load the cache at `path`, keying each record with `key_fn`.
    ///
    /// A missing file yields an empty store. When a legacy file holds the same
    /// key twice, the first occurrence wins.
    pub fn load(
        path: impl Into<PathBuf>,
        key_fn: impl Fn(&RawRecord) -> IdentityKey,
    ) -> Result<Self> {
        let path = path.into();
        let loaded: Vec<RawRecord> = match fs::read_to_string(&path) {
            Ok(text) => crate::json::parse_json_with_context(&text)
                .with_context(|| format!("Failed to parse cache file {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read cache file {}", path.display()));
            }
        };

        let total = loaded.len();
        let mut records = IndexMap::with_capacity(total);
        for record in loaded {
            if let Entry::Vacant(slot) = records.entry(key_fn(&record)) {
                slot.insert(record);
            }
        }

        let duplicates = total - records.len();
        if duplicates > 0 {
            warn!(path = %path.display(), duplicates, "Dropped duplicate records from cache");
        }
        debug!(path = %path.display(), records = records.len(), "Loaded scrape cache");

        Ok(Self {
            path,
            records,
            unsaved: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.records.contains_key(key)
    }

    /// Add a record under `key`. Returns false, leaving the store untouched,
    /// when the key is already present.
    pub fn insert(&mut self, key: IdentityKey, record: RawRecord) -> bool {
        match self.records.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(record);
                self.unsaved += 1;
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records inserted since the last [`persist`](Self::persist).
    pub fn unsaved(&self) -> usize {
        self.unsaved
    }

    /// Records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &RawRecord> {
        self.records.values()
    }

    /// Rewrite the cache file with the full collection.
    ///
    /// The new contents go to a temporary file next to the cache which is then
    /// renamed over it, so a crash mid-write leaves the previous file intact.
    pub fn persist(&mut self) -> Result<()> {
        let records: Vec<&RawRecord> = self.records.values().collect();
        write_json_atomic(&self.path, &records)?;
        debug!(path = %self.path.display(), records = records.len(), "Persisted scrape cache");
        self.unsaved = 0;
        Ok(())
    }

    pub fn cursor_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".cursor.json");
        PathBuf::from(name)
    }

    /// The saved cursor, if a previous run stopped before finishing.
    pub fn cursor(&self) -> Result<Option<Cursor>> {
        let path = self.cursor_path();
        match fs::read_to_string(&path) {
            Ok(text) => {
                let cursor = crate::json::parse_json_with_context(&text)
                    .with_context(|| format!("Failed to parse cursor file {}", path.display()))?;
                Ok(Some(cursor))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read cursor file {}", path.display()))
            }
        }
    }

    pub fn save_cursor(&self, cursor: &Cursor) -> Result<()> {
        write_json_atomic(&self.cursor_path(), cursor)
    }

    pub fn clear_cursor(&self) -> Result<()> {
        let path = self.cursor_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove cursor file {}", path.display()))
            }
        }
    }
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
