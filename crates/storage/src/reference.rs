use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use storefront_core::{DomainError, ValueObject};

const DRIVE_HOST: &str = "drive.google.com";
const DOCS_HOST: &str = "docs.google.com";
const MAX_ID_LEN: usize = 128;

/// What a storage reference points at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    File,
    Folder,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::File => "file",
            StorageKind::Folder => "folder",
        }
    }
}

/// Normalized pointer into external storage: `{kind, id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageReference {
    kind: StorageKind,
    id: String,
}

impl ValueObject for StorageReference {}

impl StorageReference {
    /// Build a reference from an already-known provider id.
    pub fn new(kind: StorageKind, id: impl Into<String>) -> Result<Self, ReferenceError> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self { kind, id })
    }

    pub fn file(id: impl Into<String>) -> Result<Self, ReferenceError> {
        Self::new(StorageKind::File, id)
    }

    pub fn folder(id: impl Into<String>) -> Result<Self, ReferenceError> {
        Self::new(StorageKind::Folder, id)
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl core::fmt::Display for StorageReference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Parses the canonical `kind:id` form produced by `Display`.
impl FromStr for StorageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or(ReferenceError::UnrecognizedShape)?;
        let kind = match kind {
            "file" => StorageKind::File,
            "folder" => StorageKind::Folder,
            _ => return Err(ReferenceError::UnrecognizedShape),
        };
        Self::new(kind, id)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("sharing url is empty")]
    Empty,

    #[error("sharing url is malformed: {0}")]
    Malformed(String),

    #[error("sharing url must use https")]
    InsecureScheme,

    #[error("sharing url host is not a supported storage provider")]
    UnsupportedHost,

    #[error("sharing url does not match a known shape")]
    UnrecognizedShape,

    #[error("sharing url carries conflicting identifiers")]
    Ambiguous,

    #[error("storage id is invalid")]
    InvalidId,
}

impl From<ReferenceError> for DomainError {
    fn from(value: ReferenceError) -> Self {
        DomainError::invalid_reference(value.to_string())
    }
}

/// Parse a raw sharing URL into a [`StorageReference`].
///
/// Recognized shapes (anything else is rejected):
///
/// | shape                         | example                                            | kind   |
/// |-------------------------------|----------------------------------------------------|--------|
/// | direct file path              | `https://drive.google.com/file/d/<id>/view`        | file   |
/// | query-parameter file id       | `https://drive.google.com/open?id=<id>`, `/uc?id=` | file   |
/// | folder path                   | `https://drive.google.com/drive/folders/<id>`      | folder |
/// | editor document path          | `https://docs.google.com/document/d/<id>/edit`     | file   |
pub fn parse(raw: &str) -> Result<StorageReference, ReferenceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ReferenceError::Empty);
    }

    let url = Url::parse(raw).map_err(|e| ReferenceError::Malformed(e.to_string()))?;
    if url.scheme() != "https" {
        return Err(ReferenceError::InsecureScheme);
    }
    if !url.username().is_empty() || url.password().is_some() || url.port().is_some() {
        return Err(ReferenceError::UnsupportedHost);
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let query_ids: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())
        .collect();
    if query_ids.len() > 1 {
        return Err(ReferenceError::Ambiguous);
    }
    let query_id = query_ids.into_iter().next();

    match url.host_str() {
        Some(DRIVE_HOST) => parse_drive(&segments, query_id),
        Some(DOCS_HOST) => parse_docs(&segments, query_id),
        _ => Err(ReferenceError::UnsupportedHost),
    }
}

fn parse_drive(
    segments: &[&str],
    query_id: Option<String>,
) -> Result<StorageReference, ReferenceError> {
    match segments {
        ["file", "d", id, rest @ ..] if is_viewer_suffix(rest) => {
            path_id_with_query(StorageKind::File, id, query_id)
        }
        ["open"] | ["uc"] => {
            let id = query_id.ok_or(ReferenceError::UnrecognizedShape)?;
            StorageReference::file(id)
        }
        ["drive", "folders", id] => path_id_with_query(StorageKind::Folder, id, query_id),
        ["drive", "u", account, "folders", id] if is_account_index(account) => {
            path_id_with_query(StorageKind::Folder, id, query_id)
        }
        _ => Err(ReferenceError::UnrecognizedShape),
    }
}

fn parse_docs(
    segments: &[&str],
    query_id: Option<String>,
) -> Result<StorageReference, ReferenceError> {
    match segments {
        [doc_type, "d", id, rest @ ..]
            if matches!(*doc_type, "document" | "spreadsheets" | "presentation")
                && is_viewer_suffix(rest) =>
        {
            path_id_with_query(StorageKind::File, id, query_id)
        }
        _ => Err(ReferenceError::UnrecognizedShape),
    }
}

/// A path id may be accompanied by an `id=` query param only if both agree.
fn path_id_with_query(
    kind: StorageKind,
    path_id: &str,
    query_id: Option<String>,
) -> Result<StorageReference, ReferenceError> {
    if let Some(q) = query_id {
        if q != path_id {
            return Err(ReferenceError::Ambiguous);
        }
    }
    StorageReference::new(kind, path_id)
}

fn is_viewer_suffix(rest: &[&str]) -> bool {
    matches!(rest, [] | ["view"] | ["preview"] | ["edit"])
}

fn is_account_index(seg: &str) -> bool {
    !seg.is_empty() && seg.len() <= 3 && seg.bytes().all(|b| b.is_ascii_digit())
}

fn validate_id(id: &str) -> Result<(), ReferenceError> {
    let ok = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if ok { Ok(()) } else { Err(ReferenceError::InvalidId) }
}
