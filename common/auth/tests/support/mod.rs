#![allow(dead_code)]

use std::fs;

use anyhow::{anyhow, Result};
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePublicKey;
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;
use tempfile::{tempdir, TempDir};

pub const USERS: &str = r#"{
    "auth": {
        "users": {
            "alice": {"password": "correctpw", "email": "alice@example.org", "roles": ["annotator", "user"]},
            "rita": {"password": "review", "roles": ["reviewer"]},
            "root": {"password": "toor", "email": "root@example.org", "roles": ["admin", "user"]},
            "ghost": {"password": "boo", "roles": []}
        }
    }
}"#;

/// App directory holding a `config.json` user table.
pub fn app_dir_with(users: &str) -> Result<TempDir> {
    let dir = tempdir()?;
    fs::write(dir.path().join("config.json"), users)?;
    Ok(dir)
}

pub struct RealmKey {
    pub encoding: EncodingKey,
    pub public_key_b64: String,
}

pub fn realm_key() -> Result<RealmKey> {
    let mut rng = OsRng;
    let private_key =
        RsaPrivateKey::new(&mut rng, 2048).map_err(|err| anyhow!("key generation: {err}"))?;
    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|err| anyhow!("private pem: {err}"))?;
    let public_pem = private_key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|err| anyhow!("public pem: {err}"))?;

    Ok(RealmKey {
        encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes())?,
        public_key_b64: public_pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect(),
    })
}
