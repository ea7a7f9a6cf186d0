use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::roles::{ROLE_ADMIN, ROLE_ANNOTATOR, ROLE_REVIEWER, ROLE_USER};

/// Development-only signing secret used when `AUTH_SHARED_SECRET` is unset.
pub const DEFAULT_SHARED_SECRET: &str =
    "3f1c9a0d7e4b4c2a8d6e5f1a0b9c8d7e6f5a4b3c2d1e0f9a8b7c6d5e4f3a2b1c";

pub const ROLE_PATH_SEPARATOR: char = '#';

/// Names of the token claims identity fields are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimNames {
    pub username: String,
    pub email: String,
    pub display_name: String,
    /// Ordered keys walked into the payload to reach the role list.
    pub roles: Vec<String>,
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self {
            username: "preferred_username".to_string(),
            email: "email".to_string(),
            display_name: "name".to_string(),
            roles: parse_role_path("realm_access#roles"),
        }
    }
}

/// The four recognised role names, as they appear in tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNames {
    pub admin: String,
    pub reviewer: String,
    pub annotator: String,
    pub user: String,
}

impl RoleNames {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.admin.clone(),
            self.reviewer.clone(),
            self.annotator.clone(),
            self.user.clone(),
        ]
    }
}

impl Default for RoleNames {
    fn default() -> Self {
        Self {
            admin: ROLE_ADMIN.to_string(),
            reviewer: ROLE_REVIEWER.to_string(),
            annotator: ROLE_ANNOTATOR.to_string(),
            user: ROLE_USER.to_string(),
        }
    }
}

/// Runtime configuration for token issuance, verification and role checks.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// When false every request runs as the default administrator.
    pub enabled: bool,
    /// External identity provider (realm) URI. When set, tokens are verified
    /// against the provider's public key instead of the shared secret.
    pub provider_uri: Option<String>,
    pub shared_secret: String,
    /// Lifetime of locally issued tokens.
    pub session_lifetime: Duration,
    /// Bound on every provider request.
    pub fetch_timeout: Duration,
    /// Allowable clock skew in seconds when validating exp.
    pub leeway_seconds: u32,
    pub claims: ClaimNames,
    pub roles: RoleNames,
    /// Directory holding `config.json` with the local user table.
    pub app_dir: PathBuf,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider_uri: None,
            shared_secret: DEFAULT_SHARED_SECRET.to_string(),
            session_lifetime: Duration::from_secs(3600),
            fetch_timeout: Duration::from_secs(10),
            leeway_seconds: 0,
            claims: ClaimNames::default(),
            roles: RoleNames::default(),
            app_dir: PathBuf::from("."),
        }
    }
}

impl AuthSettings {
    /// Settings with authentication switched on and everything else defaulted.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, uri: impl Into<String>) -> Self {
        self.provider_uri = Some(uri.into());
        self
    }

    pub fn with_shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.shared_secret = secret.into();
        self
    }

    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_role_path(mut self, path: &str) -> Self {
        self.claims.roles = parse_role_path(path);
        self
    }

    pub fn with_app_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.app_dir = dir.into();
        self
    }

    pub fn user_table_path(&self) -> PathBuf {
        self.app_dir.join("config.json")
    }
}

pub fn load_auth_settings() -> Result<AuthSettings> {
    let defaults = AuthSettings::default();

    let enabled = bool_from_env("AUTH_ENABLED").unwrap_or(defaults.enabled);
    let provider_uri = env::var("AUTH_REALM_URI")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .map(|value| value.trim_end_matches('/').to_string());

    let shared_secret = match env::var("AUTH_SHARED_SECRET")
        .ok()
        .and_then(|value| normalize_optional(&value))
    {
        Some(secret) => secret,
        None => {
            if enabled && provider_uri.is_none() {
                warn!("AUTH_SHARED_SECRET not set; signing local tokens with the built-in development secret");
            }
            defaults.shared_secret
        }
    };

    let session_lifetime = seconds_from_env("AUTH_SESSION_EXPIRY_SECONDS")
        .context("Failed to parse AUTH_SESSION_EXPIRY_SECONDS")?
        .map(Duration::from_secs)
        .unwrap_or(defaults.session_lifetime);
    let fetch_timeout = seconds_from_env("AUTH_FETCH_TIMEOUT_SECONDS")
        .context("Failed to parse AUTH_FETCH_TIMEOUT_SECONDS")?
        .map(Duration::from_secs)
        .unwrap_or(defaults.fetch_timeout);
    let leeway_seconds = seconds_from_env("AUTH_LEEWAY_SECONDS")
        .context("Failed to parse AUTH_LEEWAY_SECONDS")?
        .map(u32::try_from)
        .transpose()
        .context("AUTH_LEEWAY_SECONDS out of range")?
        .unwrap_or(defaults.leeway_seconds);

    let claim_defaults = ClaimNames::default();
    let claims = ClaimNames {
        username: string_from_env("AUTH_TOKEN_USERNAME_CLAIM").unwrap_or(claim_defaults.username),
        email: string_from_env("AUTH_TOKEN_EMAIL_CLAIM").unwrap_or(claim_defaults.email),
        display_name: string_from_env("AUTH_TOKEN_NAME_CLAIM")
            .unwrap_or(claim_defaults.display_name),
        roles: string_from_env("AUTH_TOKEN_ROLES_CLAIM")
            .map(|value| parse_role_path(&value))
            .filter(|path| !path.is_empty())
            .unwrap_or(claim_defaults.roles),
    };

    let role_defaults = RoleNames::default();
    let roles = RoleNames {
        admin: string_from_env("AUTH_ROLE_ADMIN").unwrap_or(role_defaults.admin),
        reviewer: string_from_env("AUTH_ROLE_REVIEWER").unwrap_or(role_defaults.reviewer),
        annotator: string_from_env("AUTH_ROLE_ANNOTATOR").unwrap_or(role_defaults.annotator),
        user: string_from_env("AUTH_ROLE_USER").unwrap_or(role_defaults.user),
    };

    let app_dir = string_from_env("APP_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.app_dir);

    Ok(AuthSettings {
        enabled,
        provider_uri,
        shared_secret,
        session_lifetime,
        fetch_timeout,
        leeway_seconds,
        claims,
        roles,
        app_dir,
    })
}

/// Split a `#`-joined claim path into its ordered keys, dropping empty segments.
pub fn parse_role_path(value: &str) -> Vec<String> {
    value
        .split(ROLE_PATH_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn bool_from_env(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn string_from_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| normalize_optional(&value))
}

fn seconds_from_env(key: &str) -> Result<Option<u64>> {
    string_from_env(key)
        .map(|value| {
            value
                .parse::<u64>()
                .with_context(|| format!("'{value}' is not a whole number of seconds"))
        })
        .transpose()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
