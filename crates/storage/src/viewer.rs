//! Embeddable viewer URLs built from normalized references.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::reference::{StorageKind, StorageReference};

/// A resolved, embeddable viewing URL.
///
/// `expires_at` bounds how long a client may keep using it before it has to
/// resolve its access token again (which re-checks entitlement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewingUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl ViewingUrl {
    pub fn for_reference(reference: &StorageReference, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            url: embed_url(reference),
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Provider-specific embed URL. Ids are validated on construction, so no
/// escaping is needed here.
pub fn embed_url(reference: &StorageReference) -> String {
    match reference.kind() {
        StorageKind::File => format!("https://drive.google.com/file/d/{}/preview", reference.id()),
        StorageKind::Folder => format!(
            "https://drive.google.com/embeddedfolderview?id={}#grid",
            reference.id()
        ),
    }
}
