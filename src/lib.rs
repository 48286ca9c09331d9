pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{RecError, RecResult};
pub use models::*;

use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub recommender: Arc<services::recommendation::RecommenderService>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let recommender = Arc::new(services::recommendation::RecommenderService::new(
            config.clone(),
        ));

        // Model load happens exactly once before serving; a failure here
        // aborts startup rather than serving against a half-loaded state.
        recommender.load().await?;

        Ok(Self {
            config,
            recommender,
        })
    }
}

pub async fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
