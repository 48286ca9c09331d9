use crate::algorithms::graph::SparseGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub item_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub recommendations: Vec<RecommendationItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecommendationRequest {
    pub user_ids: Vec<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// One user's slot in a batch response: the bare recommendation list, or
/// an error descriptor that never aborts the rest of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Recommendations(Vec<RecommendationItem>),
    Error { error: String },
}

pub type BatchRecommendationResponse = HashMap<String, BatchEntry>;

/// Health/status summary. Producing it never fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub model_loaded: bool,
    pub generation: u64,
    pub total_users: usize,
    pub total_items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AggregationKind {
    #[serde(rename = "mean")]
    Mean,
    #[serde(rename = "attention")]
    Attention,
}

/// Persisted model parameter blob. Schema-tagged and shape-tagged so a
/// checkpoint from an incompatible trainer fails the load instead of
/// serving garbage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub schema: String,
    pub num_users: usize,
    pub num_items: usize,
    pub embedding_dim: usize,
    pub n_layers: usize,
    pub aggregation: AggregationKind,
    pub user_embeddings: Vec<Vec<f32>>,
    pub item_embeddings: Vec<Vec<f32>>,
    /// Raw per-layer attention weights, length `n_layers + 1`. Required
    /// when `aggregation` is `attention`, ignored for `mean`.
    pub layer_attention: Option<Vec<f32>>,
    pub graph: Option<SparseGraph>,
}

impl ModelCheckpoint {
    pub const SCHEMA: &'static str = "gcnrec/lightgcn-v1";
}
