// File: orchestrator/src/config/secrets.rs
//! Secrets loader for SSH credentials.
//!
//! Secrets are stored in a separate TOML file (config/secrets.toml) that should
//! be excluded from version control. Inventory resources carry a reference
//! (`credential_ref`), and this module resolves it to the actual secret.
//!
//! Example secrets.toml:
//! ```toml
//! [credentials.web]
//! password = "secret-password"
//!
//! [credentials.edge]
//! private_key = "/etc/orchestrator/keys/edge_ed25519"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// One credential entry; a private key path takes precedence over a password
#[derive(Clone, Deserialize, Default)]
pub struct CredentialSecret {
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub private_key_passphrase: Option<String>,
}

impl fmt::Debug for CredentialSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSecret")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .finish()
    }
}

/// Structure matching the secrets.toml file format
#[derive(Debug, Deserialize, Default)]
pub struct SecretsFile {
    #[serde(default)]
    pub credentials: HashMap<String, CredentialSecret>,
}

/// Loader for secrets from the secrets.toml file
pub struct SecretsLoader {
    secrets: SecretsFile,
}

impl SecretsLoader {
    /// Load secrets from the specified file path.
    /// Returns an empty loader if the file doesn't exist.
    pub fn load(secrets_path: &Path) -> Result<Self> {
        if !secrets_path.exists() {
            warn!(
                "Secrets file not found at {:?}, remote resources will be unreachable",
                secrets_path
            );
            return Ok(Self {
                secrets: SecretsFile::default(),
            });
        }

        let content = std::fs::read_to_string(secrets_path)
            .with_context(|| format!("Failed to read secrets file: {:?}", secrets_path))?;

        let secrets: SecretsFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse secrets file: {:?}", secrets_path))?;

        info!(
            "Loaded {} credentials from {:?}",
            secrets.credentials.len(),
            secrets_path
        );

        Ok(Self { secrets })
    }

    pub fn from_entries(entries: HashMap<String, CredentialSecret>) -> Self {
        Self {
            secrets: SecretsFile {
                credentials: entries,
            },
        }
    }

    /// Get a credential by its reference name.
    /// Entries with neither a password nor a key are treated as missing.
    pub fn get_credential(&self, credential_ref: &str) -> Option<&CredentialSecret> {
        self.secrets
            .credentials
            .get(credential_ref)
            .filter(|c| c.password.is_some() || c.private_key.is_some())
    }

    pub fn has_reference(&self, credential_ref: &str) -> bool {
        self.secrets.credentials.contains_key(credential_ref)
    }
}
