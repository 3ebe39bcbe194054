use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "catalog.sync"). The wildcard `"*"`
/// lets policy layers say "allow all" without listing domain permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const CATALOG_SYNC: Permission = Permission(Cow::Borrowed("catalog.sync"));
    pub const CATALOG_READ: Permission = Permission(Cow::Borrowed("catalog.read"));
    pub const CATALOG_WRITE: Permission = Permission(Cow::Borrowed("catalog.write"));

    /// Status edits, solution enable/disable, deletion, and reading any order.
    pub const ORDERS_MANAGE: Permission = Permission(Cow::Borrowed("orders.manage"));
    /// Placing and reading one's own orders.
    pub const ORDERS_OWN: Permission = Permission(Cow::Borrowed("orders.own"));
    pub const SOLUTION_ACCESS: Permission = Permission(Cow::Borrowed("solution.access"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
