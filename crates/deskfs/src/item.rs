//! Data model for filesystem items.
//!
//! Every entity comes in a stub form (metadata only) and a deep form
//! (content materialized). Reads choose between them with [`Depth`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// Metadata only, one level
    Shallow,
    /// Content included, fully recursive
    Deep,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Shallow => "shallow",
            Depth::Deep => "deep",
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a store finds at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
}

/// File content. Text when the bytes are valid UTF-8.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Content::Text(text),
            Err(err) => Content::Binary(err.into_bytes()),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Binary(_) => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsRef<[u8]> for Content {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

// Text and binary holding the same bytes are the same content
impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Binary(bytes)
    }
}

impl From<&[u8]> for Content {
    fn from(bytes: &[u8]) -> Self {
        Content::Binary(bytes.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubFile {
    pub name: String,
    /// Milliseconds since the Unix epoch
    pub last_modified: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepFile {
    pub name: String,
    pub last_modified: i64,
    pub content: Content,
}

/// A child folder as seen from its parent's shallow listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubFolder {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StubItem {
    File(StubFile),
    Folder(StubFolder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeepItem {
    File(DeepFile),
    Folder(DeepFolder),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShallowFolder {
    pub name: String,
    pub items: BTreeMap<String, StubItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeepFolder {
    pub name: String,
    pub items: BTreeMap<String, DeepItem>,
}

/// Result of a file read at a given depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum File {
    Stub(StubFile),
    Deep(DeepFile),
}

/// Result of a folder read at a given depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Folder {
    Shallow(ShallowFolder),
    Deep(DeepFolder),
}

/// Result of `get_item`: whichever kind lives at the path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    File(File),
    Folder(Folder),
}

impl StubItem {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            StubItem::File(f) => &f.name,
            StubItem::Folder(f) => &f.name,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            StubItem::File(_) => ItemKind::File,
            StubItem::Folder(_) => ItemKind::Directory,
        }
    }
}

impl DeepItem {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            DeepItem::File(f) => &f.name,
            DeepItem::Folder(f) => &f.name,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            DeepItem::File(_) => ItemKind::File,
            DeepItem::Folder(_) => ItemKind::Directory,
        }
    }

    /// Structural equality ignoring `last_modified`
    #[must_use]
    pub fn content_eq(&self, other: &DeepItem) -> bool {
        match (self, other) {
            (DeepItem::File(a), DeepItem::File(b)) => a.name == b.name && a.content == b.content,
            (DeepItem::Folder(a), DeepItem::Folder(b)) => a.content_eq(b),
            _ => false,
        }
    }

    /// Number of files and folders in this subtree, itself included
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            DeepItem::File(_) => 1,
            DeepItem::Folder(folder) => 1 + folder.items.values().map(DeepItem::count).sum::<usize>(),
        }
    }
}

impl DeepFile {
    pub fn new<S: Into<String>, C: Into<Content>>(name: S, content: C, last_modified: i64) -> Self {
        Self {
            name: name.into(),
            last_modified,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn stub(&self) -> StubFile {
        StubFile {
            name: self.name.clone(),
            last_modified: self.last_modified,
        }
    }
}

impl DeepFolder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            items: BTreeMap::new(),
        }
    }

    /// Adds a file child, keyed by its name
    #[must_use]
    pub fn with_file<S: Into<String>, C: Into<Content>>(mut self, name: S, content: C) -> Self {
        let file = DeepFile::new(name, content, 0);
        let _ = self.items.insert(file.name.clone(), DeepItem::File(file));
        self
    }

    /// Adds a folder child, keyed by its name
    #[must_use]
    pub fn with_folder(mut self, folder: DeepFolder) -> Self {
        let _ = self.items.insert(folder.name.clone(), DeepItem::Folder(folder));
        self
    }

    /// One-level view of this folder
    #[must_use]
    pub fn shallow(&self) -> ShallowFolder {
        let items = self
            .items
            .iter()
            .map(|(name, item)| {
                let stub = match item {
                    DeepItem::File(f) => StubItem::File(f.stub()),
                    DeepItem::Folder(f) => StubItem::Folder(StubFolder {
                        name: f.name.clone(),
                    }),
                };
                (name.clone(), stub)
            })
            .collect();
        ShallowFolder {
            name: self.name.clone(),
            items,
        }
    }

    /// Structural equality ignoring `last_modified`
    #[must_use]
    pub fn content_eq(&self, other: &DeepFolder) -> bool {
        self.name == other.name
            && self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|((ka, a), (kb, b))| ka == kb && a.content_eq(b))
    }
}

impl File {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            File::Stub(f) => &f.name,
            File::Deep(f) => &f.name,
        }
    }

    #[must_use]
    pub fn last_modified(&self) -> i64 {
        match self {
            File::Stub(f) => f.last_modified,
            File::Deep(f) => f.last_modified,
        }
    }

    /// Content, present only for deep reads
    #[must_use]
    pub fn content(&self) -> Option<&Content> {
        match self {
            File::Stub(_) => None,
            File::Deep(f) => Some(&f.content),
        }
    }

    #[must_use]
    pub fn into_deep(self) -> Option<DeepFile> {
        match self {
            File::Stub(_) => None,
            File::Deep(f) => Some(f),
        }
    }
}

impl Folder {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Folder::Shallow(f) => &f.name,
            Folder::Deep(f) => &f.name,
        }
    }

    /// Names of the immediate children, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Folder::Shallow(f) => f.items.keys().map(String::as_str).collect(),
            Folder::Deep(f) => f.items.keys().map(String::as_str).collect(),
        }
    }

    #[must_use]
    pub fn into_shallow(self) -> ShallowFolder {
        match self {
            Folder::Shallow(f) => f,
            Folder::Deep(f) => f.shallow(),
        }
    }

    #[must_use]
    pub fn into_deep(self) -> Option<DeepFolder> {
        match self {
            Folder::Shallow(_) => None,
            Folder::Deep(f) => Some(f),
        }
    }
}

impl Item {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Item::File(f) => f.name(),
            Item::Folder(f) => f.name(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::File(_) => ItemKind::File,
            Item::Folder(_) => ItemKind::Directory,
        }
    }
}
