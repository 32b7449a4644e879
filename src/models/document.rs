//! Document library nodes forming a directory tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parent id used by nodes that sit at the top of the tree.
pub const ROOT_PARENT_ID: i64 = 0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Dir,
    File,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Dir => "dir",
            DocumentType::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dir" => Some(DocumentType::Dir),
            "file" => Some(DocumentType::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNode {
    pub id: i64,
    pub parent_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub url: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new node.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub parent_id: i64,
    pub name: String,
    pub doc_type: DocumentType,
    pub is_private: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsQuery {
    #[serde(default)]
    pub parent_id: i64,
    #[serde(default)]
    pub include_private: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedDocuments {
    pub removed: usize,
}
