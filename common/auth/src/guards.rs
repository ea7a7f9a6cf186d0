use std::sync::Arc;

use tracing::warn;

use crate::claims::Identity;
use crate::config::AuthSettings;
use crate::error::{AuthError, AuthResult};
use crate::roles::RequiredRoles;

const UNSPECIFIED_ROLE: &str = "<unspecified>";

/// Role-based access check for protected operations.
///
/// Roles are flat: holding `admin` does not satisfy a `reviewer` requirement.
#[derive(Debug, Clone)]
pub struct RoleGate {
    settings: Arc<AuthSettings>,
}

impl RoleGate {
    pub fn new(settings: Arc<AuthSettings>) -> Self {
        Self { settings }
    }

    /// Expand the wildcard into the configured role names.
    pub fn expand(&self, required: &RequiredRoles) -> Vec<String> {
        match required {
            RequiredRoles::AnyKnown => self.settings.roles.all(),
            RequiredRoles::OneOf(roles) => roles.clone(),
        }
    }

    /// Pass `identity` through when it holds any of the required roles.
    ///
    /// A denial names the last role checked. With authentication disabled
    /// every identity passes.
    pub fn authorize(&self, identity: Identity, required: &RequiredRoles) -> AuthResult<Identity> {
        if !self.settings.enabled {
            return Ok(identity);
        }

        let required = self.expand(required);
        if required.iter().any(|role| identity.has_role(role)) {
            return Ok(identity);
        }

        warn!(
            username = %identity.username,
            roles = ?identity.roles,
            ?required,
            "role check failed"
        );
        let role = required
            .last()
            .cloned()
            .unwrap_or_else(|| UNSPECIFIED_ROLE.to_string());
        Err(AuthError::Forbidden { role })
    }
}
