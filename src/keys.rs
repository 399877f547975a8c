use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use near_api::AccountId;
use near_api_types::{PublicKey, SecretKey};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential file {path} could not be read: {source}")]
    Missing {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("credential file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("credential file {path} has an invalid {field}: {reason}")]
    InvalidKey {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },
    #[error("credential file {path}: public key does not belong to the secret key")]
    KeyMismatch { path: PathBuf },
    #[error("failed to generate a secret key: {0}")]
    Generate(String),
}

/// A keypair and the network it signs for.
#[derive(Clone)]
pub struct SigningCredential {
    pub network_id: String,
    pub public_key: PublicKey,
    pub secret_key: SecretKey,
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("network_id", &self.network_id)
            .field("public_key", &self.public_key.to_string())
            .finish_non_exhaustive()
    }
}

impl SigningCredential {
    pub fn new(network_id: impl Into<String>, secret_key: SecretKey) -> Self {
        Self {
            network_id: network_id.into(),
            public_key: secret_key.public_key(),
            secret_key,
        }
    }

    /// Generates a fresh ed25519 credential on the same network.
    pub fn generate(network_id: impl Into<String>) -> Result<Self, CredentialError> {
        let secret_key = near_api::signer::generate_secret_key()
            .map_err(|e| CredentialError::Generate(e.to_string()))?;
        Ok(Self::new(network_id, secret_key))
    }
}

#[derive(Deserialize)]
struct CredentialFile {
    #[serde(alias = "private_key")]
    secret_key: String,
    public_key: String,
}

/// Reads a `{ "secret_key": .., "public_key": .. }` JSON key file, as written by the sandbox
/// node for its validator account.
pub fn load_credential(
    path: impl AsRef<Path>,
    network_id: &str,
) -> Result<SigningCredential, CredentialError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| CredentialError::Missing {
        path: path.to_path_buf(),
        source,
    })?;
    let file: CredentialFile =
        serde_json::from_str(&raw).map_err(|source| CredentialError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

    let secret_key = file
        .secret_key
        .parse::<SecretKey>()
        .map_err(|e| CredentialError::InvalidKey {
            path: path.to_path_buf(),
            field: "secret_key",
            reason: e.to_string(),
        })?;
    let public_key = file
        .public_key
        .parse::<PublicKey>()
        .map_err(|e| CredentialError::InvalidKey {
            path: path.to_path_buf(),
            field: "public_key",
            reason: e.to_string(),
        })?;

    if secret_key.public_key() != public_key {
        return Err(CredentialError::KeyMismatch {
            path: path.to_path_buf(),
        });
    }

    Ok(SigningCredential {
        network_id: network_id.to_string(),
        public_key,
        secret_key,
    })
}

#[derive(Debug, thiserror::Error)]
#[error("a signing key for {account_id} on {network_id} is already registered")]
pub struct DuplicateKey {
    pub network_id: String,
    pub account_id: AccountId,
}

/// Maps `(network, account)` to the credential that signs for it. Entries are never replaced.
#[derive(Debug, Default, Clone)]
pub struct KeyRegistry {
    keys: HashMap<(String, AccountId), SigningCredential>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        account_id: AccountId,
        credential: SigningCredential,
    ) -> Result<(), DuplicateKey> {
        let key = (credential.network_id.clone(), account_id);
        if self.keys.contains_key(&key) {
            return Err(DuplicateKey {
                network_id: key.0,
                account_id: key.1,
            });
        }
        self.keys.insert(key, credential);
        Ok(())
    }

    pub fn get(&self, network_id: &str, account_id: &AccountId) -> Option<&SigningCredential> {
        self.keys.get(&(network_id.to_string(), account_id.clone()))
    }

    pub fn contains(&self, network_id: &str, account_id: &AccountId) -> bool {
        self.get(network_id, account_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
