//! `storefront-auth`: authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage. Bearer credentials are verified by an
//! [`IdentityProvider`]; everything past that point works on plain claims.

pub mod authorize;
pub mod claims;
pub mod identity;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError, CommandAuthorization, Principal};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use identity::{Hs256IdentityProvider, IdentityProvider};
pub use permissions::Permission;
pub use principal::TenantMembership;
pub use roles::Role;
