use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::claims::TokenClaims;
use crate::config::AuthSettings;
use crate::directory::{LocalCredentialRecord, UserDirectory};
use crate::error::{AuthError, AuthResult};

pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// Login response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

/// Authenticates local users and signs HS256 session tokens with the shared
/// secret. Never consults the identity provider.
pub struct TokenIssuer {
    settings: Arc<AuthSettings>,
    directory: Arc<UserDirectory>,
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(settings: Arc<AuthSettings>, directory: Arc<UserDirectory>) -> Self {
        let encoding_key = EncodingKey::from_secret(settings.shared_secret.as_bytes());
        Self {
            settings,
            directory,
            encoding_key,
        }
    }

    /// Check a username/password pair against the local user table.
    ///
    /// Unknown users and wrong passwords fail identically.
    pub fn authenticate(&self, username: &str, password: &str) -> AuthResult<LocalCredentialRecord> {
        match self.directory.get(username) {
            Some(record) if record.password_matches(password) => Ok(record.clone()),
            _ => {
                warn!(username, "local authentication failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    pub fn issue(&self, username: &str, record: &LocalCredentialRecord) -> AuthResult<Token> {
        let now = Utc::now();
        let lifetime = Duration::from_std(self.settings.session_lifetime)
            .map_err(|err| AuthError::Config(format!("session lifetime out of range: {err}")))?;
        let expires_at = now
            .checked_add_signed(lifetime)
            .ok_or_else(|| AuthError::Config("session lifetime out of range".to_string()))?;

        let claims = TokenClaims {
            subject: username.to_string(),
            issued_at: now,
            expires_at,
            roles: record.roles.clone(),
            local_issued: true,
            username: username.to_string(),
            email: record.email.clone(),
            display_name: Some(username.to_string()),
        };

        let payload = claims.to_payload(&self.settings.claims);
        let access_token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|err| AuthError::Config(format!("failed to sign token: {err}")))?;
        debug!(username, expires_at = %claims.expires_at, "issued local token");

        Ok(Token {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
        })
    }

    /// Authenticate then issue.
    pub fn login(&self, username: &str, password: &str) -> AuthResult<Token> {
        let record = self.authenticate(username, password)?;
        self.issue(username, &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use serde_json::Value;
    use std::io::Write;

    fn issuer_with_users(json: &str) -> (TokenIssuer, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(json.as_bytes()).expect("write");
        let settings = Arc::new(AuthSettings::enabled().with_shared_secret("issuer-test"));
        let directory = Arc::new(UserDirectory::new(file.path()));
        (TokenIssuer::new(settings, directory), file)
    }

    const USERS: &str = r#"{"auth": {"users": {
        "alice": {"password": "correctpw", "email": "alice@example.org", "roles": ["annotator"]}
    }}}"#;

    #[test]
    fn authenticate_is_deterministic() {
        let (issuer, _file) = issuer_with_users(USERS);
        for _ in 0..3 {
            assert!(matches!(
                issuer.authenticate("alice", "wrongpw"),
                Err(AuthError::InvalidCredentials)
            ));
            let record = issuer.authenticate("alice", "correctpw").expect("valid");
            assert_eq!(record.username, "alice");
        }
    }

    #[test]
    fn unknown_user_and_bad_password_look_the_same() {
        let (issuer, _file) = issuer_with_users(USERS);
        let unknown = issuer.authenticate("mallory", "correctpw").unwrap_err();
        let wrong = issuer.authenticate("alice", "nope").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn issued_token_carries_configured_claims() {
        let (issuer, _file) = issuer_with_users(USERS);
        let token = issuer.login("alice", "correctpw").expect("login");
        assert_eq!(token.token_type, "bearer");

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        let data = decode::<Value>(
            &token.access_token,
            &DecodingKey::from_secret(b"issuer-test"),
            &validation,
        )
        .expect("decodes with shared secret");
        let payload = data.claims;

        assert_eq!(payload["sub"], "alice");
        assert_eq!(payload["preferred_username"], "alice");
        assert_eq!(payload["email"], "alice@example.org");
        assert_eq!(payload["name"], "alice");
        assert_eq!(payload["local_auth"], true);
        assert_eq!(payload["realm_access"]["roles"], serde_json::json!(["annotator"]));

        let lifetime = payload["exp"].as_i64().unwrap() - payload["iat"].as_i64().unwrap();
        assert_eq!(lifetime, 3600);
    }

    #[test]
    fn oversized_session_lifetime_is_a_config_error() {
        // Fits in a chrono Duration but lands past the largest representable date.
        let (_, file) = issuer_with_users(USERS);
        let settings = Arc::new(
            AuthSettings::enabled()
                .with_shared_secret("issuer-test")
                .with_session_lifetime(std::time::Duration::from_secs(8_500_000_000_000)),
        );
        let issuer = TokenIssuer::new(settings, Arc::new(UserDirectory::new(file.path())));
        assert!(matches!(
            issuer.login("alice", "correctpw"),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn entry_without_password_never_authenticates() {
        let (issuer, _file) = issuer_with_users(r#"{"auth": {"users": {"nopw": {"roles": ["admin"]}}}}"#);
        assert!(matches!(
            issuer.authenticate("nopw", ""),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn empty_directory_rejects_everyone() {
        let settings = Arc::new(AuthSettings::enabled());
        let directory = Arc::new(UserDirectory::new("/nonexistent/label-auth/config.json"));
        let issuer = TokenIssuer::new(settings, directory);
        assert!(matches!(
            issuer.login("admin", "admin"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
