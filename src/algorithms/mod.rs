pub mod graph;
pub mod initializer;
pub mod scorer;

use crate::error::{RecError, RecResult};
use crate::models::ModelCheckpoint;
use crate::utils::softmax;
use graph::SparseGraph;
use ndarray::{concatenate, Array2, Axis};
use parking_lot::RwLock;
use std::sync::Arc;

/// How the per-layer embedding snapshots are folded into one final table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    Mean,
    /// Weighted sum with learned per-layer weights, softmax-normalized
    /// before use so they are non-negative and sum to 1.
    Attention { layer_weights: Vec<f32> },
}

/// Final embeddings after propagation and layer aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalEmbeddings {
    pub users: Array2<f32>,
    pub items: Array2<f32>,
}

/// Inference-only LightGCN model: fixed embedding tables, an optional
/// propagation graph, and a memoized copy of the final embeddings.
/// Tables and graph are immutable after construction; the cache is the
/// only interior-mutable state and recomputation is pure, so concurrent
/// misses are wasteful but safe.
pub struct LightGcn {
    pub num_users: usize,
    pub num_items: usize,
    pub embedding_dim: usize,
    pub n_layers: usize,
    pub aggregation: AggregationMode,
    user_embeddings: Array2<f32>,
    item_embeddings: Array2<f32>,
    graph: Option<SparseGraph>,
    cache: RwLock<Option<Arc<FinalEmbeddings>>>,
}

impl LightGcn {
    /// Fresh xavier-initialized model. Serving normally restores from a
    /// checkpoint instead; this path exists for tests and local demos.
    pub fn new(
        num_users: usize,
        num_items: usize,
        embedding_dim: usize,
        n_layers: usize,
        aggregation: AggregationMode,
    ) -> Self {
        Self {
            num_users,
            num_items,
            embedding_dim,
            n_layers,
            aggregation,
            user_embeddings: initializer::embedding_table(num_users, embedding_dim),
            item_embeddings: initializer::embedding_table(num_items, embedding_dim),
            graph: None,
            cache: RwLock::new(None),
        }
    }

    /// Restore a model from a persisted checkpoint, validating every
    /// declared shape. Any mismatch is fatal to the load.
    pub fn from_checkpoint(checkpoint: ModelCheckpoint) -> RecResult<Self> {
        if checkpoint.schema != ModelCheckpoint::SCHEMA {
            return Err(RecError::shape_mismatch(
                "checkpoint schema",
                ModelCheckpoint::SCHEMA,
                &checkpoint.schema,
            ));
        }

        let user_embeddings = rows_to_table(
            "user embedding table",
            checkpoint.user_embeddings,
            checkpoint.num_users,
            checkpoint.embedding_dim,
        )?;
        let item_embeddings = rows_to_table(
            "item embedding table",
            checkpoint.item_embeddings,
            checkpoint.num_items,
            checkpoint.embedding_dim,
        )?;

        if let Some(ref graph) = checkpoint.graph {
            let expected = checkpoint.num_users + checkpoint.num_items;
            if graph.size != expected {
                return Err(RecError::shape_mismatch(
                    "propagation graph size",
                    expected,
                    graph.size,
                ));
            }
        }

        let aggregation = match checkpoint.aggregation {
            crate::models::AggregationKind::Mean => AggregationMode::Mean,
            crate::models::AggregationKind::Attention => {
                let weights = checkpoint.layer_attention.ok_or_else(|| {
                    RecError::shape_mismatch(
                        "layer attention weights",
                        checkpoint.n_layers + 1,
                        "absent",
                    )
                })?;
                if weights.len() != checkpoint.n_layers + 1 {
                    return Err(RecError::shape_mismatch(
                        "layer attention weights",
                        checkpoint.n_layers + 1,
                        weights.len(),
                    ));
                }
                AggregationMode::Attention {
                    layer_weights: weights,
                }
            }
        };

        let model = Self {
            num_users: checkpoint.num_users,
            num_items: checkpoint.num_items,
            embedding_dim: checkpoint.embedding_dim,
            n_layers: checkpoint.n_layers,
            aggregation,
            user_embeddings,
            item_embeddings,
            graph: checkpoint.graph,
            cache: RwLock::new(None),
        };
        model.invalidate_cache();
        Ok(model)
    }

    pub fn with_graph(mut self, graph: SparseGraph) -> RecResult<Self> {
        let expected = self.num_users + self.num_items;
        if graph.size != expected {
            return Err(RecError::shape_mismatch(
                "propagation graph size",
                expected,
                graph.size,
            ));
        }
        self.graph = Some(graph);
        self.invalidate_cache();
        Ok(self)
    }

    /// Layer-wise graph convolution. Pure and deterministic: does not touch
    /// the cache or any other model state.
    pub fn compute_final_embeddings(&self) -> FinalEmbeddings {
        let graph = match &self.graph {
            Some(graph) => graph,
            // No graph: the model degenerates to raw embeddings and the
            // layer count is ignored.
            None => {
                return FinalEmbeddings {
                    users: self.user_embeddings.clone(),
                    items: self.item_embeddings.clone(),
                }
            }
        };

        let mut combined = concatenate(
            Axis(0),
            &[self.user_embeddings.view(), self.item_embeddings.view()],
        )
        .expect("user and item tables share the embedding dimension");

        let mut layers = vec![combined.clone()];
        for _ in 0..self.n_layers {
            combined = graph.multiply(&combined);
            layers.push(combined.clone());
        }

        let aggregated = match &self.aggregation {
            AggregationMode::Mean => {
                let mut sum = layers[0].clone();
                for layer in &layers[1..] {
                    sum += layer;
                }
                sum / layers.len() as f32
            }
            AggregationMode::Attention { layer_weights } => {
                let weights = softmax(layer_weights);
                let mut sum = &layers[0] * weights[0];
                for (layer, &w) in layers[1..].iter().zip(&weights[1..]) {
                    sum += &(layer * w);
                }
                sum
            }
        };

        let (users, items) = split_combined(aggregated, self.num_users);
        FinalEmbeddings { users, items }
    }

    /// Cache protocol: return the memoized final embeddings, computing them
    /// first if the cache is invalid. Concurrent callers observing an
    /// invalid cache may each recompute; last write wins with an identical
    /// value.
    pub fn final_embeddings(&self) -> Arc<FinalEmbeddings> {
        if let Some(cached) = self.cache.read().clone() {
            return cached;
        }
        let computed = Arc::new(self.compute_final_embeddings());
        *self.cache.write() = Some(computed.clone());
        computed
    }

    pub fn invalidate_cache(&self) {
        *self.cache.write() = None;
    }

    pub fn cache_valid(&self) -> bool {
        self.cache.read().is_some()
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }
}

fn rows_to_table(
    what: &str,
    rows: Vec<Vec<f32>>,
    count: usize,
    dim: usize,
) -> RecResult<Array2<f32>> {
    if rows.len() != count {
        return Err(RecError::shape_mismatch(
            what,
            format!("{} rows", count),
            rows.len(),
        ));
    }
    let mut flat = Vec::with_capacity(count * dim);
    for row in &rows {
        if row.len() != dim {
            return Err(RecError::shape_mismatch(
                what,
                format!("dimension {}", dim),
                row.len(),
            ));
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((count, dim), flat)
        .map_err(|_| RecError::shape_mismatch(what, format!("{}x{}", count, dim), "ragged rows"))
}

fn split_combined(combined: Array2<f32>, num_users: usize) -> (Array2<f32>, Array2<f32>) {
    let users = combined.slice(ndarray::s![..num_users, ..]).to_owned();
    let items = combined.slice(ndarray::s![num_users.., ..]).to_owned();
    (users, items)
}
