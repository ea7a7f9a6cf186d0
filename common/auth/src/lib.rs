pub mod claims;
pub mod config;
pub mod directory;
pub mod error;
pub mod guards;
pub mod issuer;
pub mod keys;
pub mod roles;
pub mod service;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

pub use claims::{Identity, TokenClaims};
pub use config::{load_auth_settings, AuthSettings, ClaimNames, RoleNames};
pub use directory::{LocalCredentialRecord, UserDirectory};
pub use error::{AuthError, AuthResult};
pub use guards::RoleGate;
pub use issuer::{Token, TokenIssuer};
pub use keys::{CacheEntry, KeyCache};
pub use roles::{RequiredRoles, ROLE_ADMIN, ROLE_ANNOTATOR, ROLE_REVIEWER, ROLE_USER};
pub use service::AuthService;
pub use verifier::{default_identity, TokenValidator};
