//! Free-text entries (`/api/data` and `medsplit entries`).

use anyhow::{bail, Result};
use chrono::Local;

use medsplit_core::models::Entry;

use crate::config::Config;
use crate::data::DataFile;

pub async fn list(data: &DataFile) -> Result<Vec<Entry>> {
    Ok(data.load().await?.entries)
}

/// Append an entry stamped with the local time.
///
/// Ids are one past the current maximum so they stay unique after deletes.
pub async fn add(data: &DataFile, text: &str) -> Result<Entry> {
    if text.is_empty() {
        bail!("Text field is required");
    }
    let timestamp = Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string();
    data.update(|d| {
        let entry = Entry {
            id: d.entries.iter().map(|e| e.id).max().map_or(1, |m| m + 1),
            text: text.to_string(),
            timestamp,
        };
        d.entries.push(entry.clone());
        Ok(entry)
    })
    .await
}

/// Remove the entry with `id`. Returns `false` if there was none.
pub async fn delete(data: &DataFile, id: u64) -> Result<bool> {
    data.update(|d| {
        let before = d.entries.len();
        d.entries.retain(|e| e.id != id);
        Ok(d.entries.len() != before)
    })
    .await
}

/// Drop every entry. Other sections of the data file are kept.
pub async fn clear(data: &DataFile) -> Result<usize> {
    data.update(|d| {
        let n = d.entries.len() + d.discard_unreadable("entries");
        d.entries.clear();
        Ok(n)
    })
    .await
}

pub async fn run_list(config: &Config) -> Result<()> {
    let entries = list(&DataFile::from_config(config)).await?;
    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }
    for e in entries {
        println!("{:>4}  {}  {}", e.id, e.timestamp, e.text);
    }
    Ok(())
}

pub async fn run_add(config: &Config, text: &str) -> Result<()> {
    let entry = add(&DataFile::from_config(config), text).await?;
    println!("Added entry {}", entry.id);
    Ok(())
}

pub async fn run_remove(config: &Config, id: u64) -> Result<()> {
    if !delete(&DataFile::from_config(config), id).await? {
        bail!("Entry not found: {}", id);
    }
    println!("Removed entry {}", id);
    Ok(())
}

pub async fn run_clear(config: &Config) -> Result<()> {
    let n = clear(&DataFile::from_config(config)).await?;
    println!("Cleared {} entries", n);
    Ok(())
}
