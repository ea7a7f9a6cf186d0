use std::sync::Arc;

use tracing::info;

use crate::claims::Identity;
use crate::config::AuthSettings;
use crate::directory::UserDirectory;
use crate::error::AuthResult;
use crate::guards::RoleGate;
use crate::issuer::{Token, TokenIssuer};
use crate::keys::KeyCache;
use crate::roles::RequiredRoles;
use crate::verifier::TokenValidator;

/// All authentication components, built once at startup and shared by the
/// request handlers. Each protected operation calls [`AuthService::require`]
/// with its own role requirement.
#[derive(Clone)]
pub struct AuthService {
    settings: Arc<AuthSettings>,
    directory: Arc<UserDirectory>,
    keys: Arc<KeyCache>,
    issuer: Arc<TokenIssuer>,
    validator: TokenValidator,
    gate: RoleGate,
}

impl AuthService {
    pub fn new(settings: AuthSettings) -> AuthResult<Self> {
        let settings = Arc::new(settings);
        let keys = Arc::new(KeyCache::new(settings.fetch_timeout)?);
        let directory = Arc::new(UserDirectory::new(settings.user_table_path()));
        Ok(Self::from_parts(settings, directory, keys))
    }

    pub fn from_parts(
        settings: Arc<AuthSettings>,
        directory: Arc<UserDirectory>,
        keys: Arc<KeyCache>,
    ) -> Self {
        info!(
            enabled = settings.enabled,
            provider = settings.provider_uri.as_deref().unwrap_or("none"),
            users = %directory.path().display(),
            "auth configured"
        );
        let issuer = Arc::new(TokenIssuer::new(settings.clone(), directory.clone()));
        let validator = TokenValidator::new(settings.clone(), keys.clone());
        let gate = RoleGate::new(settings.clone());
        Self {
            settings,
            directory,
            keys,
            issuer,
            validator,
            gate,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn keys(&self) -> &KeyCache {
        &self.keys
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    pub fn gate(&self) -> &RoleGate {
        &self.gate
    }

    /// Local username/password login.
    pub fn login(&self, username: &str, password: &str) -> AuthResult<Token> {
        self.issuer.login(username, password)
    }

    pub async fn current_user(&self, token: &str) -> AuthResult<Identity> {
        self.validator.validate(token).await
    }

    /// Validate `token` and check it against `required`.
    pub async fn require(&self, token: &str, required: &RequiredRoles) -> AuthResult<Identity> {
        let identity = self.validator.validate(token).await?;
        self.gate.authorize(identity, required)
    }

    /// Where password grants should go when an identity provider is in use.
    pub async fn token_endpoint(&self) -> AuthResult<Option<String>> {
        match &self.settings.provider_uri {
            Some(provider) => self.keys.token_endpoint(provider).await.map(Some),
            None => Ok(None),
        }
    }
}
