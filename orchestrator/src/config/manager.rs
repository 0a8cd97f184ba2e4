// File: orchestrator/src/config/manager.rs
use super::{Config, InventoryFile, Resource};
use anyhow::{anyhow, Result};
use glob::glob;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

const MAIN_CONFIG: &str = "main.toml";
const SECRETS_CONFIG: &str = "secrets.toml";

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_dir: String) -> Result<Self> {
        let config = Self::load_configuration(&config_dir).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_dir: &str) -> Result<Config> {
        let main_config_path = format!("{}/{}", config_dir, MAIN_CONFIG);
        let main_config_content = fs::read_to_string(&main_config_path)
            .await
            .map_err(|e| anyhow!("Failed to read main config {}: {}", main_config_path, e))?;

        let mut config: Config = toml::from_str(&main_config_content)
            .map_err(|e| anyhow!("Failed to parse main config: {}", e))?;

        // Every other TOML file in the directory is an inventory file
        let pattern = format!("{}/*.toml", config_dir);
        let mut resources: HashMap<i64, Resource> = HashMap::new();

        for entry in glob(&pattern).map_err(|e| anyhow!("Glob pattern error: {}", e))? {
            let path = entry.map_err(|e| anyhow!("Glob entry error: {}", e))?;
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("Invalid filename"))?;

            if filename == MAIN_CONFIG || filename == SECRETS_CONFIG {
                continue;
            }

            debug!("Loading inventory file: {}", path.display());

            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;

            let inventory: InventoryFile = toml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;

            for resource in inventory.resources {
                if let Some(existing) = resources.get(&resource.id) {
                    return Err(anyhow!(
                        "Duplicate resource id {} ('{}' and '{}') in {}",
                        resource.id,
                        existing.name,
                        resource.name,
                        path.display()
                    ));
                }
                if resource.credential_ref.is_none() {
                    warn!(
                        "Resource {} ('{}') has no credential reference",
                        resource.id, resource.name
                    );
                }
                resources.insert(resource.id, resource);
            }
        }

        config.resources = resources;

        info!(
            "Loaded {} resources, session limit {}, deploy base {}",
            config.resources.len(),
            config.execution.max_concurrent_sessions,
            config.deploy.base_dir
        );

        Ok(config)
    }
}
