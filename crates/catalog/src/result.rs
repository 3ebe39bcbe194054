use serde::{Deserialize, Serialize};

/// Why one item failed to persist during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Every slug candidate in the retry budget was already taken.
    SlugCollision,
    /// The listing reported the same external id more than once.
    DuplicateExternalId,
    /// The store rejected the write for another reason.
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
    pub external_id: String,
    pub kind: SyncErrorKind,
    pub reason: String,
}

impl SyncError {
    pub fn new(external_id: impl Into<String>, kind: SyncErrorKind, reason: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            kind,
            reason: reason.into(),
        }
    }
}

/// Outcome of one reconciliation run. Errors keep the order items were processed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: Vec<SyncError>,
}

impl SyncResult {
    /// Nothing written and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0 && self.errors.is_empty()
    }

    pub fn record_error(&mut self, error: SyncError) {
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut r = SyncResult {
            created: 1,
            ..Default::default()
        };
        r.record_error(SyncError::new("X1", SyncErrorKind::SlugCollision, "exhausted"));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["created"], 1);
        assert_eq!(json["errors"][0]["externalId"], "X1");
        assert_eq!(json["errors"][0]["kind"], "slug_collision");
        assert!(!r.is_noop());
        assert!(SyncResult::default().is_noop());
    }
}
