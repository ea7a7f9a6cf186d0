use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::{debug, warn};

use crate::claims::{resolve_claim_path, roles_from_value, string_claim, Identity};
use crate::config::AuthSettings;
use crate::error::{AuthError, AuthResult};
use crate::keys::KeyCache;

/// Identity used for every request while authentication is disabled.
pub fn default_identity(settings: &AuthSettings) -> Identity {
    Identity {
        username: "admin".to_string(),
        email: Some("admin@monailabel.com".to_string()),
        display_name: Some("UNK".to_string()),
        roles: settings.roles.all(),
    }
}

/// Turns a bearer token into an [`Identity`].
///
/// With a provider configured, signatures are checked (RS256) against the
/// provider's public key. Otherwise the shared secret (HS256) used for local
/// issuance is the only accepted key. Audience is not checked.
#[derive(Clone)]
pub struct TokenValidator {
    settings: Arc<AuthSettings>,
    keys: Arc<KeyCache>,
    secret: DecodingKey,
}

impl TokenValidator {
    pub fn new(settings: Arc<AuthSettings>, keys: Arc<KeyCache>) -> Self {
        let secret = DecodingKey::from_secret(settings.shared_secret.as_bytes());
        Self {
            settings,
            keys,
            secret,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub async fn validate(&self, token: &str) -> AuthResult<Identity> {
        if !self.settings.enabled {
            return Ok(default_identity(&self.settings));
        }

        let payload = match &self.settings.provider_uri {
            Some(provider) => {
                let key = self.keys.public_key(provider).await?;
                self.verify(token, &key, Algorithm::RS256)?
            }
            None => self.verify(token, &self.secret, Algorithm::HS256)?,
        };

        let identity = self.identity_from_payload(&payload)?;
        debug!(username = %identity.username, roles = ?identity.roles, "verified token");
        Ok(identity)
    }

    fn verify(&self, token: &str, key: &DecodingKey, algorithm: Algorithm) -> AuthResult<Value> {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        validation.validate_exp = true;
        validation.leeway = self.settings.leeway_seconds.into();

        decode::<Value>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                warn!(error = %err, "token rejected");
                AuthError::from(err)
            })
    }

    fn identity_from_payload(&self, payload: &Value) -> AuthResult<Identity> {
        let names = &self.settings.claims;

        let username = string_claim(payload, &names.username)
            .or_else(|| string_claim(payload, "sub"))
            .ok_or_else(|| {
                warn!(claim = %names.username, "token carries no username");
                AuthError::InvalidToken(format!("missing '{}' claim", names.username))
            })?;

        let roles = match resolve_claim_path(payload, &names.roles) {
            Some(value) => roles_from_value(value).unwrap_or_else(|| {
                warn!(path = ?names.roles, "role claim is not a list of strings");
                Vec::new()
            }),
            None => {
                warn!(path = ?names.roles, "role claim path not present in token");
                Vec::new()
            }
        };

        Ok(Identity {
            username,
            email: string_claim(payload, &names.email),
            display_name: string_claim(payload, &names.display_name),
            roles,
        })
    }
}
