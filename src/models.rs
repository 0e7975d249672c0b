//! Core data models used throughout the document store.
//!
//! Collections form a closed set known at deployment time, so they are an
//! enum rather than a free-form string: an unknown name is rejected when it
//! is parsed, before any store operation runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// A JSON document. Shape is the caller's concern; the store only touches `id`.
pub type Document = Value;

/// File name (without extension) of the settings singleton.
pub const SETTINGS_NAME: &str = "settings";

/// A named, array-shaped set of documents stored at a well-known path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Events,
    Staff,
    Ministries,
    Content,
    Services,
    Sermons,
}

impl Collection {
    /// Every collection, in deployment order.
    pub const ALL: [Collection; 6] = [
        Collection::Events,
        Collection::Staff,
        Collection::Ministries,
        Collection::Content,
        Collection::Services,
        Collection::Sermons,
    ];

    /// The collection's name as used in URLs and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Events => "events",
            Collection::Staff => "staff",
            Collection::Ministries => "ministries",
            Collection::Content => "content",
            Collection::Services => "services",
            Collection::Sermons => "sermons",
        }
    }

    /// Singular noun for one document, used in commit messages.
    pub fn singular(&self) -> &'static str {
        match self {
            Collection::Events => "event",
            Collection::Staff => "staff member",
            Collection::Ministries => "ministry",
            Collection::Content => "content page",
            Collection::Services => "service",
            Collection::Sermons => "sermon",
        }
    }

    /// File name of the collection's JSON array (`events.json`).
    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}

/// Identifier of an object in the remote store (blob, tree or commit SHA).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub String);

impl Revision {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(s: &str) -> Self {
        Revision(s.to_string())
    }
}

/// One file to write as part of a multi-file commit.
#[derive(Debug, Clone)]
pub struct FileChange {
    /// Repository-relative path, e.g. `public/data/events.json`.
    pub path: String,
    pub content: Value,
}

impl FileChange {
    pub fn new(path: impl Into<String>, content: Value) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }
}

/// A decoded file read from the remote store.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: Value,
    /// Blob SHA of the file as read. Not consumed by the store today.
    pub revision: Revision,
}

/// Renders JSON the way every persisted file is written: two-space
/// pretty-printing, keys in insertion order, trailing newline.
pub fn to_file_text(content: &Value) -> Result<String, StoreError> {
    let mut text =
        serde_json::to_string_pretty(content).map_err(|e| StoreError::Decode(e.to_string()))?;
    text.push('\n');
    Ok(text)
}

/// Parses file text into JSON, dropping a leading byte-order mark first.
pub fn parse_file_text(text: &str) -> Result<Value, StoreError> {
    let clean = text.strip_prefix('\u{feff}').unwrap_or(text);
    serde_json::from_str(clean).map_err(|e| StoreError::Decode(format!("invalid JSON: {}", e)))
}
