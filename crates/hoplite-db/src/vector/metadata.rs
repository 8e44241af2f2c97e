//! Filter criteria for chunk vector queries.

use serde::{Deserialize, Serialize};

// ============================================================================
// VectorSearchFilter
// ============================================================================

/// Filter criteria for vector search and corpus scans.
///
/// All fields are optional. When multiple fields are specified, they are
/// combined with AND logic. Empty/None fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchFilter {
    /// Filter by exact document type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,

    /// Filter by exact source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl VectorSearchFilter {
    /// Create an empty filter (matches all).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by document type.
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Filter by source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Check if the filter is empty (matches all).
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none() && self.source.is_none()
    }

    /// Check a record's filterable fields against this filter.
    pub fn matches(&self, doc_type: Option<&str>, source: Option<&str>) -> bool {
        if let Some(ref wanted) = self.doc_type {
            if doc_type != Some(wanted.as_str()) {
                return false;
            }
        }

        if let Some(ref wanted) = self.source {
            if source != Some(wanted.as_str()) {
                return false;
            }
        }

        true
    }
}
