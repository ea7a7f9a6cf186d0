use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::DecodingKey;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::error::{AuthError, AuthResult};

pub const DISCOVERY_PATH: &str = ".well-known/openid-configuration";
pub const TOKEN_ENDPOINT: &str = "token_endpoint";

pub type DiscoveryDocument = Map<String, Value>;

/// A value fetched from a provider, keyed by provider URI.
#[derive(Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

/// Per-key cells so that concurrent first lookups of one key share a single
/// fetch. A failed fetch leaves its cell empty and the next caller retries.
struct SingleFlight<T> {
    slots: Mutex<HashMap<String, Arc<OnceCell<CacheEntry<T>>>>>,
}

impl<T: Clone> SingleFlight<T> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &str) -> Arc<OnceCell<CacheEntry<T>>> {
        let mut guard = self.slots.lock().expect("cache mutex poisoned");
        guard.entry(key.to_string()).or_default().clone()
    }

    fn cached(&self, key: &str) -> Option<CacheEntry<T>> {
        let guard = self.slots.lock().expect("cache mutex poisoned");
        guard.get(key).and_then(|cell| cell.get().cloned())
    }

    async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> AuthResult<CacheEntry<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        let slot = self.slot(key);
        let entry = slot
            .get_or_try_init(|| async {
                let value = fetch().await?;
                Ok::<_, AuthError>(CacheEntry {
                    key: key.to_string(),
                    value,
                    fetched_at: Utc::now(),
                })
            })
            .await?;
        Ok(entry.clone())
    }
}

/// Provider public keys and discovery documents, fetched once per provider
/// URI and kept for the life of the process. Key rotation at the provider is
/// only picked up after a restart.
pub struct KeyCache {
    client: Client,
    keys: SingleFlight<Arc<DecodingKey>>,
    discovery: SingleFlight<DiscoveryDocument>,
}

impl KeyCache {
    /// Build a cache whose provider requests give up after `timeout`.
    pub fn new(timeout: Duration) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AuthError::ProviderUnreachable(err.to_string()))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            keys: SingleFlight::new(),
            discovery: SingleFlight::new(),
        }
    }

    /// Verification key advertised by the provider at `provider_uri`.
    pub async fn public_key(&self, provider_uri: &str) -> AuthResult<Arc<DecodingKey>> {
        let entry = self
            .keys
            .get_or_fetch(provider_uri, || self.fetch_public_key(provider_uri))
            .await?;
        Ok(entry.value)
    }

    /// The provider's OpenID discovery document. A document that arrives but
    /// does not parse is cached as an empty map.
    pub async fn discovery_document(&self, provider_uri: &str) -> AuthResult<DiscoveryDocument> {
        let entry = self
            .discovery
            .get_or_fetch(provider_uri, || self.fetch_discovery(provider_uri))
            .await?;
        Ok(entry.value)
    }

    pub async fn token_endpoint(&self, provider_uri: &str) -> AuthResult<String> {
        let document = self.discovery_document(provider_uri).await?;
        document
            .get(TOKEN_ENDPOINT)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(AuthError::MissingEndpoint(TOKEN_ENDPOINT))
    }

    pub fn cached_public_key(&self, provider_uri: &str) -> Option<CacheEntry<Arc<DecodingKey>>> {
        self.keys.cached(provider_uri)
    }

    pub fn cached_discovery(&self, provider_uri: &str) -> Option<CacheEntry<DiscoveryDocument>> {
        self.discovery.cached(provider_uri)
    }

    async fn fetch_public_key(&self, provider_uri: &str) -> AuthResult<Arc<DecodingKey>> {
        info!(provider = provider_uri, "fetching provider public key");
        let body: RealmResponse = self
            .get(provider_uri)
            .await?
            .json()
            .await
            .map_err(|err| {
                AuthError::ProviderUnreachable(format!("invalid realm response: {err}"))
            })?;

        let pem = public_key_pem(&body.public_key);
        let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|err| {
            AuthError::ProviderUnreachable(format!("invalid public key from {provider_uri}: {err}"))
        })?;
        Ok(Arc::new(key))
    }

    async fn fetch_discovery(&self, provider_uri: &str) -> AuthResult<DiscoveryDocument> {
        let url = format!("{}/{DISCOVERY_PATH}", provider_uri.trim_end_matches('/'));
        info!(provider = provider_uri, url = %url, "fetching provider discovery document");
        let body = self
            .get(&url)
            .await?
            .bytes()
            .await
            .map_err(|err| AuthError::ProviderUnreachable(err.to_string()))?;

        match serde_json::from_slice::<DiscoveryDocument>(&body) {
            Ok(document) => Ok(document),
            Err(err) => {
                error!(
                    provider = provider_uri,
                    url = %url,
                    error = %err,
                    "discovery document did not parse; is the realm URI correct?"
                );
                Ok(DiscoveryDocument::new())
            }
        }
    }

    async fn get(&self, url: &str) -> AuthResult<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| AuthError::ProviderUnreachable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::ProviderUnreachable(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct RealmResponse {
    public_key: String,
}

/// Wrap a bare base64 SubjectPublicKeyInfo as PEM. Input that is already PEM
/// is returned unchanged.
fn public_key_pem(encoded: &str) -> String {
    if encoded.trim_start().starts_with("-----BEGIN") {
        return encoded.to_string();
    }

    let compact: Vec<char> = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for line in compact.chunks(64) {
        pem.extend(line);
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}
