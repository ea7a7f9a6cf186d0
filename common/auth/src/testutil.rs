use std::sync::OnceLock;

use jsonwebtoken::EncodingKey;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePublicKey;
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;

/// RSA key pair standing in for an identity provider's realm key.
pub struct ProviderKeys {
    pub encoding: EncodingKey,
    /// Base64 SubjectPublicKeyInfo, as a realm endpoint publishes it.
    pub public_key_b64: String,
}

pub fn provider_keys() -> &'static ProviderKeys {
    static KEYS: OnceLock<ProviderKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("private pem");
        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("public pem");

        ProviderKeys {
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
            public_key_b64: public_pem
                .lines()
                .filter(|line| !line.starts_with("-----"))
                .collect(),
        }
    })
}
