use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::Error;

/// A document as listed by `GET /documents`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "PascalCase")]
#[builder(on(String, into))]
pub struct Document {
    #[serde(rename = "ID")]
    pub id: String,
    pub title: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// File names of the attachments
    #[builder(default)]
    pub attachments: Vec<String>,
    #[builder(default)]
    pub contributors: Vec<Contributor>,
}

/// A user who worked on a [`Document`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "PascalCase")]
#[builder(on(String, into))]
pub struct Contributor {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
}

/// Body of `POST /documents`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "PascalCase")]
#[builder(on(String, into))]
pub struct NewDocument {
    pub title: String,
    pub version: String,
}

impl NewDocument {
    /// Build a new document, rejecting blank fields.
    pub fn new<T: Into<String>, V: Into<String>>(title: T, version: V) -> Result<Self> {
        let document = Self {
            title: title.into(),
            version: version.into(),
        };
        document.validate()?;
        Ok(document)
    }

    /// Both the title and the version must contain something besides whitespace.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("document title must not be blank"));
        }
        if self.version.trim().is_empty() {
            return Err(Error::validation("document version must not be blank"));
        }
        Ok(())
    }
}

/// Orderings offered for document lists.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[non_exhaustive]
pub enum SortOrder {
    /// Oldest document first (default).
    #[default]
    #[serde(rename = "createdAt_asc")]
    #[strum(serialize = "Created (Oldest first)")]
    CreatedAtAsc,
    /// Newest document first.
    #[serde(rename = "createdAt_desc")]
    #[strum(serialize = "Created (Newest first)")]
    CreatedAtDesc,
}

impl SortOrder {
    pub const ALL: [Self; 2] = [Self::CreatedAtAsc, Self::CreatedAtDesc];
}

/// Sort `documents` by creation time. Documents created at the same instant keep their
/// relative order.
pub fn sort_documents(documents: &mut [Document], order: SortOrder) {
    match order {
        SortOrder::CreatedAtAsc => documents.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::CreatedAtDesc => documents.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}
