//! Flat JSON data file.
//!
//! All application state lives in one pretty-printed JSON object:
//!
//! ```json
//! {
//!   "entries": [],
//!   "micro_grants": [],
//!   "profiles": [],
//!   "users": [],
//!   "documents": []
//! }
//! ```
//!
//! Top-level keys this crate does not know about are carried through
//! unchanged. So are individual records that do not fit their section's
//! schema: they are skipped with a warning on read and appended back to
//! their section on write. A file whose top level is an array is read as
//! the legacy entries-only layout.
//!
//! A file that cannot be read at all (not JSON, or a section that is not a
//! list) loads as empty data, but [`DataFile::update`] refuses to write
//! over it.
//!
//! Every mutation is a read-modify-write of the whole file. Writers in one
//! process are serialized by a mutex and the new contents are written to a
//! temporary file and renamed into place. Nothing guards against a second
//! process writing the same file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use medsplit_core::grants::MicroGrant;
use medsplit_core::models::{Document, Entry, Profile, User};
use medsplit_core::store::{upsert_into, Store};

use crate::config::Config;

/// Everything stored in the data file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Data {
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub micro_grants: Vec<MicroGrant>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
    /// Records that failed their section's schema, keyed by section.
    #[serde(skip)]
    unreadable: BTreeMap<String, Vec<Value>>,
}

impl Data {
    fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let mut data = Data::default();
        if value.is_array() {
            data.entries = section("entries", Some(value), &mut data.unreadable)?;
            return Ok(data);
        }
        let Value::Object(mut obj) = value else {
            bail!("top level is neither an object nor a list");
        };

        data.entries = section("entries", obj.remove("entries"), &mut data.unreadable)?;
        data.micro_grants =
            section("micro_grants", obj.remove("micro_grants"), &mut data.unreadable)?;
        data.profiles = section("profiles", obj.remove("profiles"), &mut data.unreadable)?;
        data.users = section("users", obj.remove("users"), &mut data.unreadable)?;
        data.documents = section("documents", obj.remove("documents"), &mut data.unreadable)?;
        data.extra = obj;
        Ok(data)
    }

    /// Drop the records of `section` that could not be read.
    pub fn discard_unreadable(&mut self, section: &str) -> usize {
        self.unreadable.remove(section).map_or(0, |r| r.len())
    }

    fn to_json(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            for (name, records) in &self.unreadable {
                if let Some(Value::Array(items)) = obj.get_mut(name) {
                    items.extend(records.iter().cloned());
                }
            }
        }
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

/// Parse one section record by record. Records that do not deserialize are
/// set aside in `unreadable` instead of failing the whole file.
fn section<T: DeserializeOwned>(
    name: &str,
    value: Option<Value>,
    unreadable: &mut BTreeMap<String, Vec<Value>>,
) -> Result<Vec<T>> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => bail!("`{}` is not a list", name),
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match T::deserialize(&item) {
            Ok(record) => out.push(record),
            Err(e) => {
                warn!(section = name, error = %e, "skipping unreadable record; it is kept on write");
                unreadable.entry(name.to_string()).or_default().push(item);
            }
        }
    }
    Ok(out)
}

/// Handle to the data file.
pub struct DataFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file (and parent directories) if it does not exist.
    ///
    /// Returns `true` if a new file was written.
    pub async fn init(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| format!("Failed to check data file: {}", self.path.display()))?;
        if exists {
            return Ok(false);
        }
        self.write(&Data::default()).await?;
        Ok(true)
    }

    /// Read the current contents.
    ///
    /// A missing file reads as empty data. So does a file that is not valid;
    /// a warning is logged.
    pub async fn load(&self) -> Result<Data> {
        let Some(text) = self.read_text().await? else {
            return Ok(Data::default());
        };
        match Data::from_json(&text) {
            Ok(data) => Ok(data),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "data file is not valid; treating as empty");
                Ok(Data::default())
            }
        }
    }

    /// Load, apply `f`, and write back if `f` succeeds.
    ///
    /// Fails without writing if the existing file is not valid.
    pub async fn update<T>(&self, f: impl FnOnce(&mut Data) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut data = match self.read_text().await? {
            Some(text) => Data::from_json(&text).with_context(|| {
                format!(
                    "Refusing to overwrite invalid data file: {}",
                    self.path.display()
                )
            })?,
            None => Data::default(),
        };
        let out = f(&mut data)?;
        self.write(&data).await?;
        Ok(out)
    }

    async fn read_text(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => Ok(Some(t)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read data file: {}", self.path.display())),
        }
    }

    async fn write(&self, data: &Data) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = data.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write data file: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace data file: {}", self.path.display()))?;
        debug!(path = %self.path.display(), "data file written");
        Ok(())
    }
}

#[async_trait]
impl Store for DataFile {
    async fn list_documents(&self) -> Result<Vec<Document>> {
        Ok(self.load().await?.documents)
    }

    async fn get_document(&self, id: u64) -> Result<Option<Document>> {
        Ok(self
            .load()
            .await?
            .documents
            .into_iter()
            .find(|d| d.id == id))
    }

    async fn upsert_document(&self, doc: &Document) -> Result<u64> {
        self.update(|data| Ok(upsert_into(&mut data.documents, doc)))
            .await
    }

    async fn delete_document(&self, id: u64) -> Result<bool> {
        self.update(|data| {
            let before = data.documents.len();
            data.documents.retain(|d| d.id != id);
            Ok(data.documents.len() != before)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use medsplit_core::models::{DocumentKind, FileType};
    use tempfile::TempDir;

    fn doc(name: &str) -> Document {
        Document {
            id: 0,
            name: name.into(),
            kind: DocumentKind::Insurance,
            file_type: FileType::Jpg,
            size: "1.2 MB".into(),
            upload_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            verified: true,
            file_url: None,
            shared_with: vec!["Dr. Smith".into()],
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let file = DataFile::new(tmp.path().join("nope.json"));
        let data = file.load().await.unwrap();
        assert!(data.entries.is_empty());
        assert!(data.documents.is_empty());
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let file = DataFile::new(tmp.path().join("nested/data.json"));
        assert!(file.init().await.unwrap());
        assert!(!file.init().await.unwrap());
        assert!(file.path().exists());
    }

    #[tokio::test]
    async fn test_unknown_keys_survive_writes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(
            &path,
            r#"{"medicines": [{"id": 1, "name": "Metformin"}], "documents": []}"#,
        )
        .unwrap();

        let file = DataFile::new(&path);
        file.upsert_document(&doc("Insurance Card")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["medicines"][0]["name"], "Metformin");
        assert_eq!(raw["documents"][0]["name"], "Insurance Card");
        assert_eq!(raw["documents"][0]["sharedWith"][0], "Dr. Smith");
    }

    #[tokio::test]
    async fn test_legacy_array_reads_as_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "text": "hello", "timestamp": "2024-01-01T00:00:00"}]"#,
        )
        .unwrap();
        let data = DataFile::new(&path).load().await.unwrap();
        assert_eq!(data.entries.len(), 1);
        assert_eq!(data.entries[0].text, "hello");
    }

    #[tokio::test]
    async fn test_invalid_json_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, "{not json").unwrap();
        let data = DataFile::new(&path).load().await.unwrap();
        assert!(data.micro_grants.is_empty());
    }

    #[tokio::test]
    async fn test_init_reports_stat_errors() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let file = DataFile::new(blocker.join("data.json"));
        let err = file.init().await.unwrap_err();
        assert!(err.to_string().contains("Failed to check data file"));
    }

    #[tokio::test]
    async fn test_update_refuses_invalid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, "{not json").unwrap();
        let file = DataFile::new(&path);

        let err = file
            .update(|d| {
                d.entries.clear();
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Refusing to overwrite"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");

        std::fs::write(&path, r#"{"documents": {"id": 1}}"#).unwrap();
        assert!(file.update(|_| Ok(())).await.is_err());
        assert!(file.load().await.unwrap().documents.is_empty());
    }

    #[tokio::test]
    async fn test_bad_record_does_not_wipe_neighbours() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(
            &path,
            r#"{
              "micro_grants": [{ "id": 1, "requesterName": "Lee", "title": "Inhaler",
                                 "description": "x", "amountNeeded": 40 }],
              "documents": [
                { "id": 1, "name": "Scan", "type": "other", "fileType": "pdf",
                  "size": "1 KB", "uploadDate": "2024-01-01", "verified": true },
                { "id": 2, "name": "No file type", "type": "other" }
              ],
              "medicines": [{ "id": 1, "name": "Insulin" }]
            }"#,
        )
        .unwrap();
        let file = DataFile::new(&path);

        let data = file.load().await.unwrap();
        assert_eq!(data.documents.len(), 1);
        assert_eq!(data.micro_grants.len(), 1);

        file.update(|d| {
            d.documents.retain(|doc| doc.id != 1);
            Ok(())
        })
        .await
        .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["micro_grants"].as_array().unwrap().len(), 1);
        assert_eq!(raw["medicines"][0]["name"], "Insulin");
        let docs = raw["documents"].as_array().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["name"], "No file type");
    }

    #[tokio::test]
    async fn test_failed_update_does_not_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        let file = DataFile::new(&path);
        let res: Result<()> = file.update(|_| anyhow::bail!("nope")).await;
        assert!(res.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_store_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let file = DataFile::new(tmp.path().join("data.json"));
        let id = file.upsert_document(&doc("Card")).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(file.get_document(1).await.unwrap().unwrap().name, "Card");
        assert!(file.delete_document(1).await.unwrap());
        assert!(file.list_documents().await.unwrap().is_empty());
    }
}
