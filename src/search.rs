//! `medsplit search`: rank the document library against a query and print
//! the results.
//!
//! Ranking itself lives in [`medsplit_core::search`]; this module loads the
//! library from a [`Store`] and formats the output.

use anyhow::Result;
use serde::Serialize;

use medsplit_core::models::{Document, TypeFilter};
use medsplit_core::search::search_documents;
use medsplit_core::store::Store;

use crate::config::Config;
use crate::data::DataFile;

/// A ranked document detached from the library it was loaded from.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub document: Document,
    pub score: f64,
}

/// Rank every document in `store` for `query`, keeping at most `limit`.
pub async fn search_store<S: Store + ?Sized>(
    store: &S,
    query: &str,
    filter: TypeFilter,
    limit: Option<usize>,
) -> Result<Vec<SearchHit>> {
    let docs = store.list_documents().await?;
    let ranked = search_documents(&docs, query, filter);
    let take = limit.unwrap_or(ranked.len());
    Ok(ranked
        .into_iter()
        .take(take)
        .map(|r| SearchHit {
            document: r.document.clone(),
            score: r.score,
        })
        .collect())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    doc_type: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let filter: TypeFilter = doc_type.parse()?;
    let store = DataFile::from_config(config);
    let results = search_store(&store, query, filter, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    print_results(&results);
    Ok(())
}

fn print_results(results: &[SearchHit]) {
    for (i, result) in results.iter().enumerate() {
        let doc = &result.document;
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            result.score,
            doc.kind.label(),
            doc.name
        );
        println!("    uploaded: {}", doc.upload_date.format("%Y-%m-%d"));
        println!(
            "    status: {}",
            if doc.verified { "verified" } else { "pending" }
        );
        println!("    file: {} ({})", doc.file_type, doc.size);
        if !doc.shared_with.is_empty() {
            println!("    shared with: {}", doc.shared_with.join(", "));
        }
        println!("    id: {}", doc.id);
        println!();
    }
}
