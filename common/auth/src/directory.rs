use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{AuthError, AuthResult};

/// A user entry from the local user table.
///
/// Passwords are stored and compared in plain text. This matches how the user
/// table has always been written and is a known weakness of local login.
/// An entry without a password never authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LocalCredentialRecord {
    #[serde(skip)]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub roles: Vec<String>,
}

impl LocalCredentialRecord {
    pub fn password_matches(&self, candidate: &str) -> bool {
        self.password.as_deref() == Some(candidate)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

pub type UserTable = HashMap<String, LocalCredentialRecord>;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    auth: Option<AuthSection>,
}

#[derive(Debug, Deserialize)]
struct AuthSection {
    #[serde(default)]
    users: Option<HashMap<String, Value>>,
}

/// Lazily loaded, process-lifetime cache of the local user table.
#[derive(Debug)]
pub struct UserDirectory {
    path: PathBuf,
    users: OnceLock<UserTable>,
}

impl UserDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            users: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The user table. Read from disk on first call only; a missing or
    /// unreadable file yields an empty table and an error log.
    pub fn load(&self) -> &UserTable {
        self.users.get_or_init(|| match read_user_table(&self.path) {
            Ok(users) => {
                info!(path = %self.path.display(), count = users.len(), "loaded local users");
                users
            }
            Err(err) => {
                error!(path = %self.path.display(), error = %err, "no local users available");
                UserTable::new()
            }
        })
    }

    pub fn get(&self, username: &str) -> Option<&LocalCredentialRecord> {
        self.load().get(username)
    }
}

/// Read and parse a user table file without caching.
pub fn read_user_table(path: &Path) -> AuthResult<UserTable> {
    if !path.exists() {
        return Err(AuthError::Config(format!(
            "config file not found at {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| AuthError::Config(format!("failed to read {}: {err}", path.display())))?;
    let parsed: ConfigFile = serde_json::from_str(&raw)
        .map_err(|err| AuthError::Config(format!("failed to parse {}: {err}", path.display())))?;

    let entries = parsed
        .auth
        .and_then(|section| section.users)
        .unwrap_or_default();

    let mut users = UserTable::with_capacity(entries.len());
    for (username, entry) in entries {
        match serde_json::from_value::<LocalCredentialRecord>(entry) {
            Ok(mut record) => {
                record.username = username.clone();
                users.insert(username, record);
            }
            Err(err) => {
                warn!(path = %path.display(), username, error = %err, "skipping malformed user entry");
            }
        }
    }
    Ok(users)
}
