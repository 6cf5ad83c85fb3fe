//! Document library management: the `documents` subcommands and the input
//! type shared with the HTTP server.

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use medsplit_core::models::{Document, DocumentKind, DocumentStats, FileType, TypeFilter};
use medsplit_core::store::Store;
use tracing::info;

use crate::config::Config;
use crate::data::DataFile;

/// A document as submitted by a client. Missing `uploadDate` means today.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub file_type: FileType,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub upload_date: Option<NaiveDate>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub shared_with: Vec<String>,
}

impl DocumentInput {
    pub fn into_document(self, today: NaiveDate) -> Result<Document> {
        let name = self.name.trim();
        if name.is_empty() {
            bail!("name is required");
        }
        Ok(Document {
            id: self.id,
            name: name.to_string(),
            kind: self.kind,
            file_type: self.file_type,
            size: self.size,
            upload_date: self.upload_date.unwrap_or(today),
            verified: self.verified,
            file_url: self.file_url.filter(|u| !u.is_empty()),
            shared_with: self.shared_with,
        })
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub async fn run_list(config: &Config, doc_type: &str) -> Result<()> {
    let filter: TypeFilter = doc_type.parse()?;
    let store = DataFile::from_config(config);
    let docs: Vec<Document> = store
        .list_documents()
        .await?
        .into_iter()
        .filter(|d| filter.allows(d.kind))
        .collect();

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!(
        "{:<5} {:<32} {:<18} {:<6} {:<12} STATUS",
        "ID", "NAME", "TYPE", "FILE", "UPLOADED"
    );
    for doc in &docs {
        println!(
            "{:<5} {:<32} {:<18} {:<6} {:<12} {}",
            doc.id,
            doc.name,
            doc.kind.label(),
            doc.file_type,
            doc.upload_date.format("%Y-%m-%d"),
            if doc.verified { "verified" } else { "pending" }
        );
    }
    Ok(())
}

pub async fn run_add(config: &Config, input: DocumentInput) -> Result<()> {
    let doc = input.into_document(today())?;
    let store = DataFile::from_config(config);
    let id = store.upsert_document(&doc).await?;
    info!(id, name = %doc.name, "document stored");
    println!("Stored document {} ({})", id, doc.name);
    Ok(())
}

pub async fn run_remove(config: &Config, id: u64) -> Result<()> {
    let store = DataFile::from_config(config);
    if !store.delete_document(id).await? {
        bail!("Document not found: {}", id);
    }
    println!("Removed document {}", id);
    Ok(())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = DataFile::from_config(config);
    let docs = store.list_documents().await?;
    let stats = DocumentStats::from_documents(&docs);

    println!("MedSplit — Document Library");
    println!("===========================");
    println!();
    println!("  Data file:   {}", config.data.path.display());
    println!();
    println!("  Documents:   {}", stats.total);
    println!("  Verified:    {}", stats.verified);
    println!("  Pending:     {}", stats.pending);

    if !docs.is_empty() {
        println!();
        println!("  By type:");
        for kind in DocumentKind::ALL {
            let count = docs.iter().filter(|d| d.kind == kind).count();
            if count > 0 {
                println!("    {:<18} {}", kind.label(), count);
            }
        }
    }
    Ok(())
}
