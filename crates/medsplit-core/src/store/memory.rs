//! In-memory [`Store`] implementation for tests and embedding.
//!
//! Keeps documents in a `Vec` behind `std::sync::RwLock`.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::Document;

use super::{upsert_into, Store};

/// In-memory document store.
pub struct InMemoryStore {
    docs: RwLock<Vec<Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
        }
    }

    /// A store pre-loaded with `docs`, kept in the given order.
    pub fn with_documents(docs: Vec<Document>) -> Self {
        Self {
            docs: RwLock::new(docs),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_documents(&self) -> Result<Vec<Document>> {
        Ok(self.docs.read().map_err(poisoned)?.clone())
    }

    async fn get_document(&self, id: u64) -> Result<Option<Document>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.iter().find(|d| d.id == id).cloned())
    }

    async fn upsert_document(&self, doc: &Document) -> Result<u64> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        Ok(upsert_into(&mut docs, doc))
    }

    async fn delete_document(&self, id: u64) -> Result<bool> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKind, FileType};
    use chrono::NaiveDate;

    fn doc(id: u64, name: &str) -> Document {
        Document {
            id,
            name: name.into(),
            kind: DocumentKind::Prescription,
            file_type: FileType::Pdf,
            size: "10 KB".into(),
            upload_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            verified: false,
            file_url: None,
            shared_with: vec![],
        }
    }

    #[tokio::test]
    async fn test_upsert_assigns_ids() {
        let store = InMemoryStore::new();
        let a = store.upsert_document(&doc(0, "a")).await.unwrap();
        let b = store.upsert_document(&doc(0, "b")).await.unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.list_documents().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let store = InMemoryStore::with_documents(vec![doc(5, "old"), doc(6, "other")]);
        let mut updated = doc(5, "new");
        updated.verified = true;
        store.upsert_document(&updated).await.unwrap();

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs[0].name, "new");
        assert!(docs[0].verified);
        assert_eq!(docs.len(), 2);
        assert_eq!(store.get_document(5).await.unwrap().unwrap().name, "new");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::with_documents(vec![doc(1, "a")]);
        assert!(store.delete_document(1).await.unwrap());
        assert!(!store.delete_document(1).await.unwrap());
        assert!(store.get_document(1).await.unwrap().is_none());
    }
}
