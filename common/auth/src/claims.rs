use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ClaimNames;

/// Claim marking a token as minted by this service rather than a provider.
pub const LOCAL_AUTH_CLAIM: &str = "local_auth";

/// Verified caller identity for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|value| value == role)
    }
}

/// Payload of a locally issued token before it is laid out under the
/// configured claim names.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub roles: Vec<String>,
    pub local_issued: bool,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl TokenClaims {
    /// Serialise into a JSON payload using `names` for the identity claims.
    /// The role list is nested along the whole role path so that reading it
    /// back with the same path finds it.
    pub fn to_payload(&self, names: &ClaimNames) -> Value {
        let mut payload = Map::new();
        payload.insert("exp".into(), Value::from(self.expires_at.timestamp()));
        payload.insert("iat".into(), Value::from(self.issued_at.timestamp()));
        payload.insert("sub".into(), Value::from(self.subject.clone()));
        payload.insert(names.username.clone(), Value::from(self.username.clone()));
        payload.insert(
            names.email.clone(),
            Value::from(self.email.clone().unwrap_or_default()),
        );
        payload.insert(
            names.display_name.clone(),
            Value::from(self.display_name.clone().unwrap_or_default()),
        );
        payload.insert(LOCAL_AUTH_CLAIM.into(), Value::Bool(self.local_issued));

        let roles = Value::from(self.roles.clone());
        if let Some((first, rest)) = names.roles.split_first() {
            let nested = rest
                .iter()
                .rev()
                .fold(roles, |inner, key| {
                    let mut level = Map::new();
                    level.insert(key.clone(), inner);
                    Value::Object(level)
                });
            payload.insert(first.clone(), nested);
        }

        Value::Object(payload)
    }
}

/// Walk `path` into `payload`, one object key per segment.
///
/// Stops with `None` as soon as a segment is missing or the current value is
/// not an object. Never panics, whatever shape the payload has.
pub fn resolve_claim_path<'a>(payload: &'a Value, path: &[String]) -> Option<&'a Value> {
    match path.split_first() {
        None => None,
        Some((head, [])) => payload.as_object()?.get(head),
        Some((head, rest)) => resolve_claim_path(payload.as_object()?.get(head)?, rest),
    }
}

/// Interpret a claim value as a role list. Anything other than an array of
/// strings yields `None`.
pub fn roles_from_value(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

/// Read an optional string claim. Empty strings count as absent.
pub fn string_claim(payload: &Value, name: &str) -> Option<String> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
