//! Test configuration builder for creating test configs

use orchestrator::config::{Config, Resource};
use orchestrator::errors::CredentialError;
use orchestrator::remote::{CredentialResolver, Credentials, SshAuth};
use std::sync::Arc;

/// Builder for test configurations
pub struct TestConfigBuilder {
    config: Config,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.database_path = ":memory:".to_string();
        // Keep timeouts short so timeout scenarios finish quickly
        config.execution.connect_timeout_seconds = 1;
        config.execution.exec_timeout_seconds = 1;
        Self { config }
    }

    /// Add a resource reachable at `ip`
    pub fn with_resource(mut self, id: i64, name: &str, ip: &str) -> Self {
        self.config.resources.insert(
            id,
            Resource {
                id,
                name: name.to_string(),
                ip_address: Some(ip.to_string()),
                ssh_port: 22,
                ssh_username: "root".to_string(),
                credential_ref: Some("default".to_string()),
            },
        );
        self
    }

    /// Add a resource with no address
    pub fn with_unaddressed_resource(mut self, id: i64, name: &str) -> Self {
        self.config.resources.insert(
            id,
            Resource {
                id,
                name: name.to_string(),
                ip_address: None,
                ssh_port: 22,
                ssh_username: "root".to_string(),
                credential_ref: None,
            },
        );
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.config.execution.max_output_bytes = max;
        self
    }

    pub fn with_max_servers(mut self, max: usize) -> Self {
        self.config.deploy.max_servers = max;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }

    pub fn build_arc(self) -> Arc<Config> {
        Arc::new(self.config)
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves every addressed resource to a root password login
pub struct StaticCredentials;

impl CredentialResolver for StaticCredentials {
    fn resolve(&self, resource: &Resource) -> Result<Credentials, CredentialError> {
        let host = resource
            .ip_address
            .clone()
            .ok_or_else(|| CredentialError::MissingAddress {
                resource: resource.name.clone(),
            })?;

        Ok(Credentials {
            host,
            port: resource.ssh_port,
            username: resource.ssh_username.clone(),
            auth: SshAuth::Password("test-password".to_string()),
        })
    }
}
