//! Core data models used throughout MedSplit.
//!
//! These types mirror the records kept in the flat JSON data file. Field
//! names on the wire follow the file's camelCase convention.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category tag of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Prescription,
    Insurance,
    MedicalRecord,
    LabResult,
    Other,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Prescription,
        DocumentKind::Insurance,
        DocumentKind::MedicalRecord,
        DocumentKind::LabResult,
        DocumentKind::Other,
    ];

    /// Wire name, e.g. `"medical-record"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Prescription => "prescription",
            DocumentKind::Insurance => "insurance",
            DocumentKind::MedicalRecord => "medical-record",
            DocumentKind::LabResult => "lab-result",
            DocumentKind::Other => "other",
        }
    }

    /// Human-readable label with hyphens replaced by spaces.
    pub fn label(&self) -> String {
        self.as_str().replace('-', " ")
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace(' ', "-");
        DocumentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "invalid document type: '{}'. Use prescription, insurance, medical-record, lab-result, or other.",
                    s
                )
            })
    }
}

/// Stored file format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Jpg,
    Png,
    Doc,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Jpg => "jpg",
            FileType::Png => "png",
            FileType::Doc => "doc",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(FileType::Pdf),
            "jpg" | "jpeg" => Ok(FileType::Jpg),
            "png" => Ok(FileType::Png),
            "doc" | "docx" => Ok(FileType::Doc),
            other => bail!("invalid file type: '{}'. Use pdf, jpg, png, or doc.", other),
        }
    }
}

/// A medical document in a user's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Numeric id; `0` means "not yet assigned".
    #[serde(default)]
    pub id: u64,
    /// Display filename.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub file_type: FileType,
    /// Human-readable size, e.g. `"245 KB"`.
    #[serde(default)]
    pub size: String,
    pub upload_date: NaiveDate,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Providers the document has been shared with.
    #[serde(default)]
    pub shared_with: Vec<String>,
}

/// Which document categories a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Only(DocumentKind),
}

impl TypeFilter {
    pub fn allows(&self, kind: DocumentKind) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(k) => *k == kind,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(TypeFilter::All);
        }
        Ok(TypeFilter::Only(s.parse()?))
    }
}

/// Verified/pending counts over a document library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DocumentStats {
    pub total: usize,
    pub verified: usize,
    pub pending: usize,
}

impl DocumentStats {
    pub fn from_documents(docs: &[Document]) -> Self {
        let verified = docs.iter().filter(|d| d.verified).count();
        Self {
            total: docs.len(),
            verified,
            pending: docs.len() - verified,
        }
    }
}

/// Profile row from the data file, used to resolve display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: u64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// User account row from the data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub email: Option<String>,
}

/// Free-text entry posted through `/api/data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: u64,
    pub text: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_label_replaces_hyphen() {
        assert_eq!(DocumentKind::MedicalRecord.label(), "medical record");
        assert_eq!(DocumentKind::LabResult.label(), "lab result");
        assert_eq!(DocumentKind::Insurance.label(), "insurance");
    }

    #[test]
    fn test_kind_parse_accepts_label_and_wire_name() {
        assert_eq!(
            "medical-record".parse::<DocumentKind>().unwrap(),
            DocumentKind::MedicalRecord
        );
        assert_eq!(
            "Lab Result".parse::<DocumentKind>().unwrap(),
            DocumentKind::LabResult
        );
        assert!("receipt".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_type_filter_parse() {
        assert_eq!("all".parse::<TypeFilter>().unwrap(), TypeFilter::All);
        assert_eq!("".parse::<TypeFilter>().unwrap(), TypeFilter::All);
        let f: TypeFilter = "insurance".parse().unwrap();
        assert!(f.allows(DocumentKind::Insurance));
        assert!(!f.allows(DocumentKind::Prescription));
    }

    #[test]
    fn test_document_json_shape() {
        let json = r#"{
            "id": 3,
            "name": "Blood Test Results - January 2024",
            "type": "lab-result",
            "fileType": "pdf",
            "size": "180 KB",
            "uploadDate": "2024-01-08",
            "verified": false
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.kind, DocumentKind::LabResult);
        assert_eq!(doc.file_type, FileType::Pdf);
        assert!(doc.shared_with.is_empty());
        assert!(doc.file_url.is_none());

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["uploadDate"], "2024-01-08");
        assert_eq!(back["type"], "lab-result");
        assert!(back.get("fileUrl").is_none());
    }

    #[test]
    fn test_stats_counts() {
        let mk = |verified| Document {
            id: 0,
            name: "x".into(),
            kind: DocumentKind::Other,
            file_type: FileType::Pdf,
            size: String::new(),
            upload_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            verified,
            file_url: None,
            shared_with: vec![],
        };
        let stats = DocumentStats::from_documents(&[mk(true), mk(false), mk(true)]);
        assert_eq!(
            stats,
            DocumentStats {
                total: 3,
                verified: 2,
                pending: 1
            }
        );
    }
}
