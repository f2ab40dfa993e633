use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, ScrapeError};
use crate::model::{ExtractedRecord, Link};

/// Every record known so far, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: BTreeMap<String, ExtractedRecord>,
}

impl Dataset {
    pub fn from_records(records: impl IntoIterator<Item = ExtractedRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.identifier.clone(), r))
                .collect(),
        }
    }

    /// Load a previous run's output. A missing or unreadable file is an empty
    /// dataset, never an error.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("No existing data file found at {:?}, starting fresh", path);
            return Self::default();
        }

        info!("Loading existing data from {:?}", path);
        let loaded = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                serde_json::from_str::<Vec<ExtractedRecord>>(&text).map_err(|e| e.to_string())
            });

        match loaded {
            Ok(records) => {
                let dataset = Self::from_records(records);
                info!(
                    "Loaded previous data: {} entries, {} successful",
                    dataset.len(),
                    dataset.succeeded().len()
                );
                dataset
            }
            Err(e) => {
                warn!("Could not load {:?}, starting fresh: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&ExtractedRecord> {
        self.records.get(identifier)
    }

    pub fn records(&self) -> impl Iterator<Item = &ExtractedRecord> {
        self.records.values()
    }

    /// Identifiers whose latest record has no error.
    pub fn succeeded(&self) -> HashSet<&str> {
        self.records
            .values()
            .filter(|r| r.is_ok())
            .map(|r| r.identifier.as_str())
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.records.values().filter(|r| !r.is_ok()).count()
    }

    /// Drop links that already have a successful record. Failed and unseen
    /// links stay, in their original order.
    pub fn pending(&self, links: Vec<Link>) -> Vec<Link> {
        let done = self.succeeded();
        links
            .into_iter()
            .filter(|l| !done.contains(l.identifier.as_str()))
            .collect()
    }

    /// Overlay this run's records on the previous ones. The current record
    /// always wins, even when it is an error and the previous one was not.
    pub fn merge(mut self, current: impl IntoIterator<Item = ExtractedRecord>) -> Self {
        for record in current {
            self.records.insert(record.identifier.clone(), record);
        }
        self
    }

    /// Replace `path` with the whole dataset, sorted by identifier.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let records: Vec<&ExtractedRecord> = self.records.values().collect();
        write_json(path, &records)?;
        info!("Data saved to {:?} ({} records)", path, records.len());
        Ok(())
    }
}

/// Pretty-print `value` (two-space indent, no HTML escaping, trailing newline)
/// to a sibling temp file, then rename it over `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let persist_err = |reason: String| ScrapeError::Persist {
        path: path.to_path_buf(),
        reason,
    };

    let mut buf = serde_json::to_vec_pretty(value)
        .map_err(|e| persist_err(format!("failed to encode JSON: {}", e)))?;
    buf.push(b'\n');

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let written = fs::write(&tmp, &buf)
        .map_err(|e| persist_err(format!("failed to write JSON: {}", e)))
        .and_then(|()| {
            fs::rename(&tmp, path)
                .map_err(|e| persist_err(format!("failed to replace file: {}", e)))
        });
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}
