use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub recommendation: RecommendationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port).parse().unwrap()
    }
}

/// Locations of the two persisted blobs: the model checkpoint and the
/// identifier mapping store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub model_path: String,
    pub mapping_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub default_top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                workers: num_cpus::get(),
            },
            storage: StorageConfig {
                model_path: "./models/lightgcn_checkpoint.json".to_string(),
                mapping_path: "./models/id_mappings.json".to_string(),
            },
            recommendation: RecommendationConfig { default_top_k: 10 },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("GCNREC"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
