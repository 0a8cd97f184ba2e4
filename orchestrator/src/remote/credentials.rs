// File: orchestrator/src/remote/credentials.rs
use super::{Credentials, SshAuth};
use crate::config::{Resource, SecretsLoader};
use crate::errors::CredentialError;
use std::sync::Arc;

/// Turns an inventory record into connectable credentials
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, resource: &Resource) -> Result<Credentials, CredentialError>;
}

/// Resolves `credential_ref` against secrets.toml
pub struct SecretsCredentialResolver {
    secrets: Arc<SecretsLoader>,
}

impl SecretsCredentialResolver {
    pub fn new(secrets: Arc<SecretsLoader>) -> Self {
        Self { secrets }
    }
}

impl CredentialResolver for SecretsCredentialResolver {
    fn resolve(&self, resource: &Resource) -> Result<Credentials, CredentialError> {
        let host = resource
            .ip_address
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| CredentialError::MissingAddress {
                resource: resource.name.clone(),
            })?;

        let reference = resource.credential_ref.as_deref().ok_or_else(|| {
            CredentialError::MissingCredentials {
                resource: resource.name.clone(),
            }
        })?;

        if !self.secrets.has_reference(reference) {
            return Err(CredentialError::UnknownReference {
                resource: resource.name.clone(),
                reference: reference.to_string(),
            });
        }

        let secret = self.secrets.get_credential(reference).ok_or_else(|| {
            CredentialError::MissingCredentials {
                resource: resource.name.clone(),
            }
        })?;

        let auth = match (&secret.private_key, &secret.password) {
            (Some(path), _) => SshAuth::PrivateKey {
                path: path.clone(),
                passphrase: secret.private_key_passphrase.clone(),
            },
            (None, Some(password)) => SshAuth::Password(password.clone()),
            (None, None) => {
                return Err(CredentialError::MissingCredentials {
                    resource: resource.name.clone(),
                })
            }
        };

        Ok(Credentials {
            host: host.to_string(),
            port: resource.ssh_port,
            username: resource.ssh_username.clone(),
            auth,
        })
    }
}
