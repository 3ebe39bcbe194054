use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{OrderId, SubjectId, TokenId};

/// Opaque, revocable access handle for an order's solution.
///
/// The token id carries no claims. Whoever presents it is checked against the
/// order's purchaser every time it is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub token_id: TokenId,
    pub order_id: OrderId,
    pub subject_id: SubjectId,
    pub issued_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn issue(
        token_id: TokenId,
        order_id: OrderId,
        subject_id: SubjectId,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token_id,
            order_id,
            subject_id,
            issued_at,
            revoked: false,
            revoked_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.revoked
    }

    pub(crate) fn revoke(&mut self, at: DateTime<Utc>) {
        if !self.revoked {
            self.revoked = true;
            self.revoked_at = Some(at);
        }
    }
}
