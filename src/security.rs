use std::convert::TryInto;
use std::path::PathBuf;
use std::{env, fs};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

use crate::config::Config;
use crate::error::SecurityError;

const USER_AUTH_PUBLIC: &str = "user_auth.pem.pub";
const USER_AUTH_PRIVATE: &str = "user_auth.pem";

pub type Salt = [u8; 16];

#[derive(Clone)]
pub struct KeySet {
    pub public: Vec<u8>,
    pub private: Vec<u8>,
}

/// Material used to sign and verify bearer tokens.
#[derive(Clone)]
pub enum JwtKeys {
    /// PS256 key pair stored in the security directory.
    Rsa(KeySet),
    /// HS256 shared secret.
    Secret(Vec<u8>),
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtKeys::Rsa(_) => write!(f, "JwtKeys::Rsa(..)"),
            JwtKeys::Secret(_) => write!(f, "JwtKeys::Secret(..)"),
        }
    }
}

impl JwtKeys {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            JwtKeys::Rsa(_) => Algorithm::PS256,
            JwtKeys::Secret(_) => Algorithm::HS256,
        }
    }

    pub fn encoding_key(&self) -> Result<EncodingKey, jsonwebtoken::errors::Error> {
        match self {
            JwtKeys::Rsa(keys) => EncodingKey::from_rsa_pem(keys.private.as_slice()),
            JwtKeys::Secret(secret) => Ok(EncodingKey::from_secret(secret)),
        }
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        match self {
            JwtKeys::Rsa(keys) => DecodingKey::from_rsa_pem(keys.public.as_slice()),
            JwtKeys::Secret(secret) => Ok(DecodingKey::from_secret(secret)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Security {
    pub jwt_keys: JwtKeys,
    /// bcrypt work factor for new password hashes.
    pub password_cost: u32,
    pub token_ttl: chrono::Duration,
}

#[inline]
fn security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or("./security".to_string()))
}

impl Security {
    pub fn from_secret(secret: impl AsRef<[u8]>, password_cost: u32) -> Security {
        Security {
            jwt_keys: JwtKeys::Secret(secret.as_ref().to_vec()),
            password_cost,
            token_ttl: chrono::Duration::hours(24),
        }
    }

    pub fn random_salt() -> Salt {
        rand::random()
    }

    pub fn load(config: &Config) -> Result<Security, SecurityError> {
        let jwt_keys = match &config.jwt_secret {
            Some(secret) => {
                tracing::info!("Using configured JWT secret (HS256).");
                JwtKeys::Secret(secret.as_bytes().to_vec())
            }
            None => JwtKeys::Rsa(load_key_set()?),
        };

        Ok(Security {
            jwt_keys,
            password_cost: config.password_cost.clamp(4, 31),
            token_ttl: chrono::Duration::hours(config.token_ttl_hours),
        })
    }
}

fn load_key_set() -> Result<KeySet, SecurityError> {
    let dir = security_dir();

    tracing::info!("Loading JWT signing keys...");
    let pub_key = fs::read(dir.join(USER_AUTH_PUBLIC)).ok();
    let priv_key = fs::read(dir.join(USER_AUTH_PRIVATE)).ok();

    match (pub_key, priv_key) {
        (Some(public), Some(private)) if !public.is_empty() && !private.is_empty() => {
            tracing::info!("Loaded JWT keys.");
            Ok(KeySet { public, private })
        }
        #[cfg(feature = "generate-security")]
        _ => generate_key_set(dir),
        #[cfg(not(feature = "generate-security"))]
        _ => Err(SecurityError::MissingKeys(dir)),
    }
}

#[cfg(feature = "generate-security")]
fn generate_key_set(dir: PathBuf) -> Result<KeySet, SecurityError> {
    use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
    use rsa::pkcs8::EncodePublicKey;

    fs::create_dir_all(&dir)?;

    tracing::info!(
        "Unable to load private and/or public user auth key(s). Generating a new pair."
    );

    tracing::info!("Generating a private RSA key. This will take a while...");
    let mut rng = rand::thread_rng();
    let rsa_sk = rsa::RsaPrivateKey::new(&mut rng, 4096)
        .map_err(|e| SecurityError::KeyGeneration(e.to_string()))?;

    tracing::info!("Creating PS256 private key...");
    let private = rsa_sk
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| SecurityError::KeyGeneration(e.to_string()))?
        .to_string()
        .into_bytes();

    fs::write(dir.join(USER_AUTH_PRIVATE), private.as_slice())?;

    tracing::info!("Creating PS256 public key...");
    let public = rsa_sk
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| SecurityError::KeyGeneration(e.to_string()))?
        .into_bytes();

    fs::write(dir.join(USER_AUTH_PUBLIC), public.as_slice())?;

    tracing::info!("Done generating JWT keys.");

    Ok(KeySet { public, private })
}

/// Converts stored salt bytes back into a fixed size salt.
pub fn salt_from_bytes(bytes: &[u8]) -> Option<Salt> {
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_config_selects_hs256() {
        let mut config = Config::default();
        config.jwt_secret = Some("secret".to_string());
        config.password_cost = 99;
        config.token_ttl_hours = 2;

        let security = Security::load(&config).expect("secret keys never touch disk");

        assert_eq!(security.jwt_keys.algorithm(), Algorithm::HS256);
        assert_eq!(security.password_cost, 31);
        assert_eq!(security.token_ttl, chrono::Duration::hours(2));
        assert!(format!("{:?}", security).contains("JwtKeys::Secret(..)"));
    }

    #[test]
    fn salts_roundtrip_through_bytes() {
        let salt = Security::random_salt();
        assert_eq!(salt_from_bytes(&salt), Some(salt));
        assert_eq!(salt_from_bytes(&salt[..8]), None);
    }
}
