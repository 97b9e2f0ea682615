//! # On-disk Storage
//!
//! One pretty-printed JSON document per city per category, option lists read
//! from disk, and downloaded illustrations.

use crate::data::storage_key;
use crate::errors::{BatchError, ItemError};
use crate::types::{CityRecords, MissingReport, OptionList};
use reqwest::Client as ReqwestClient;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::ser::PrettyFormatter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The file the missing-item report is written to inside a category directory.
pub const MISSING_REPORT_FILE: &str = "missing.json";

/// Serializes `value` with a 4-space indent, keeping non-ASCII text as is.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Writes `value` as pretty JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BatchError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BatchError::io(parent, e))?;
    }
    let bytes = to_json_pretty(value).map_err(|e| BatchError::json(path, e))?;
    std::fs::write(path, bytes).map_err(|e| BatchError::io(path, e))
}

/// Reads a JSON document, returning `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, BatchError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BatchError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| BatchError::json(path, e))
}

/// Loads a city's option list.
pub fn load_options(path: &Path) -> Result<OptionList, BatchError> {
    read_json(path)?.ok_or_else(|| BatchError::NotFound(path.display().to_string()))
}

/// Persists the generated documents of one category.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, city_key: &str) -> PathBuf {
        self.root.join(format!("{city_key}.json"))
    }

    pub fn write_records(
        &self,
        city_key: &str,
        records: &CityRecords,
    ) -> Result<PathBuf, BatchError> {
        let path = self.write_document(city_key, records)?;
        debug!(path = %path.display(), records = records.len(), "Saved city document");
        Ok(path)
    }

    pub fn read_records(&self, city_key: &str) -> Result<Option<CityRecords>, BatchError> {
        self.read_document(city_key)
    }

    /// Writes any document as a city's file, e.g. a city-level answer that is
    /// not keyed by item.
    pub fn write_document<T: Serialize>(
        &self,
        city_key: &str,
        document: &T,
    ) -> Result<PathBuf, BatchError> {
        let path = self.path_for(city_key);
        write_json(&path, document)?;
        Ok(path)
    }

    pub fn read_document<T: DeserializeOwned>(
        &self,
        city_key: &str,
    ) -> Result<Option<T>, BatchError> {
        read_json(&self.path_for(city_key))
    }

    pub fn write_report(&self, report: &MissingReport) -> Result<PathBuf, BatchError> {
        let path = self.root.join(MISSING_REPORT_FILE);
        write_json(&path, report)?;
        info!(
            path = %path.display(),
            cities = report.cities.len(),
            items = report.items.values().map(Vec::len).sum::<usize>(),
            "Saved missing-item report"
        );
        Ok(path)
    }
}

/// Downloads generated illustrations into `<root>/<city_key>/`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    client: ReqwestClient,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, client: ReqwestClient) -> Self {
        Self {
            root: root.into(),
            client,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file name an item's illustration is stored under.
    pub fn file_name(item_key: &str, option: &str) -> String {
        let option: String = storage_key(option)
            .chars()
            .filter(|c| !matches!(c, '\'' | '.' | '/' | '\\' | '"'))
            .collect();
        format!("{item_key}_{option}.jpg")
    }

    /// Fetches `url` and stores the body, returning the stored file name.
    pub async fn download(
        &self,
        url: &str,
        city_key: &str,
        item_key: &str,
        option: &str,
    ) -> Result<String, ItemError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ItemError::Image(format!("download of {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ItemError::Image(format!(
                "download of {url} returned status {status}"
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ItemError::Image(format!("reading image body from {url} failed: {e}")))?;

        let dir = self.root.join(city_key);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ItemError::Image(format!("creating {}: {e}", dir.display())))?;
        let name = Self::file_name(item_key, option);
        let path = dir.join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ItemError::Image(format!("writing {}: {e}", path.display())))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Saved image");
        Ok(name)
    }
}
