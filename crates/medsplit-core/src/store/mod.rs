//! Storage abstraction for the document library.
//!
//! The [`Store`] trait covers the operations the CLI and HTTP server need
//! to manage documents, so search and handlers can run against either the
//! JSON data file or an in-memory store in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Document;

/// Abstract storage backend for documents.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_documents`](Store::list_documents) | All documents in stored order |
/// | [`get_document`](Store::get_document) | One document by id |
/// | [`upsert_document`](Store::upsert_document) | Insert or replace a document |
/// | [`delete_document`](Store::delete_document) | Remove a document by id |
#[async_trait]
pub trait Store: Send + Sync {
    /// All documents, in the order they were stored.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    async fn get_document(&self, id: u64) -> Result<Option<Document>>;

    /// Insert or replace a document.
    ///
    /// A document with id `0` is assigned one past the current maximum.
    /// Returns the id it was stored under.
    async fn upsert_document(&self, doc: &Document) -> Result<u64>;

    /// Returns `false` if no document had this id.
    async fn delete_document(&self, id: u64) -> Result<bool>;
}

/// Insert or replace `doc` in `docs`, assigning an id when it has none.
///
/// Shared by store implementations that keep documents in a `Vec`. New
/// documents are appended.
pub fn upsert_into(docs: &mut Vec<Document>, doc: &Document) -> u64 {
    let mut doc = doc.clone();
    if doc.id == 0 {
        doc.id = docs.iter().map(|d| d.id).max().unwrap_or(0) + 1;
    }
    let id = doc.id;
    match docs.iter_mut().find(|d| d.id == id) {
        Some(existing) => *existing = doc,
        None => docs.push(doc),
    }
    id
}
