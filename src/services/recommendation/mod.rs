use crate::algorithms::{scorer, LightGcn};
use crate::config::Config;
use crate::error::{RecError, RecResult};
use crate::models::*;
use crate::services::mapping::{IdMappings, MappingStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// One self-consistent, immutable bundle of loaded model parameters and
/// identifier mappings. Reload builds a complete new snapshot before
/// swapping the single Arc, so in-flight requests always observe one
/// fully-consistent generation, never a model paired with stale mappings.
pub struct Snapshot {
    pub model: LightGcn,
    pub mappings: IdMappings,
    pub generation: u64,
}

pub struct RecommenderService {
    config: Arc<Config>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    generation: AtomicU64,
}

impl RecommenderService {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            snapshot: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Read the checkpoint and mapping blobs from their configured
    /// locations and swap in a fresh snapshot. Any failure leaves the
    /// previously loaded snapshot serving.
    pub async fn load(&self) -> RecResult<()> {
        let model_path = self.config.storage.model_path.clone();
        let mapping_path = self.config.storage.mapping_path.clone();

        info!("loading model from {}...", model_path);
        let raw = std::fs::read_to_string(&model_path)
            .map_err(|e| RecError::storage(&model_path, e))?;
        let checkpoint: ModelCheckpoint = serde_json::from_str(&raw)?;
        let model = LightGcn::from_checkpoint(checkpoint)?;
        info!(
            "model loaded: {} users, {} items, dim {}, {} layers, graph: {}",
            model.num_users,
            model.num_items,
            model.embedding_dim,
            model.n_layers,
            model.has_graph()
        );

        info!("loading mappings from {}...", mapping_path);
        let store = MappingStore::load(&mapping_path)?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(Snapshot {
            model,
            mappings: store.mappings,
            generation,
        });

        *self.snapshot.write().await = Some(snapshot);
        info!("snapshot generation {} now serving", generation);
        Ok(())
    }

    pub async fn reload(&self) -> RecResult<()> {
        self.load().await
    }

    async fn current_snapshot(&self) -> RecResult<Arc<Snapshot>> {
        self.snapshot
            .read()
            .await
            .clone()
            .ok_or(RecError::ModelNotLoaded)
    }

    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> RecResult<RecommendationResponse> {
        let snapshot = self.current_snapshot().await?;

        let user_index = match snapshot.mappings.resolve_user(&request.user_id) {
            Some(index) => index,
            // Unknown user is an expected case, not an error.
            None => return Ok(self.cold_start_recommendations(&request.user_id)),
        };

        // Manual mapping edits can point past the embedding table.
        if user_index >= snapshot.model.num_users {
            return Err(RecError::InvalidUser {
                index: user_index,
                num_users: snapshot.model.num_users,
            });
        }

        let top_k = request.top_k.min(snapshot.model.num_items);
        let scoring_snapshot = snapshot.clone();
        let recommendations = tokio::task::spawn_blocking(move || {
            let finals = scoring_snapshot.model.final_embeddings();
            let scores = scorer::score_items(finals.users.row(user_index), finals.items.view());
            scorer::top_k_ranked(&scores, top_k)
                .into_iter()
                .filter_map(|(index, score)| {
                    // Indices without a reverse entry are silently skipped.
                    scoring_snapshot
                        .mappings
                        .resolve_item_reverse(index)
                        .map(|item_id| RecommendationItem {
                            item_id: item_id.to_string(),
                            score,
                        })
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| RecError::Internal(format!("scoring task failed: {}", e)))?;

        Ok(RecommendationResponse {
            user_id: request.user_id.clone(),
            recommendations,
        })
    }

    /// Cold start: the identifier has no internal index. Returns a valid
    /// empty list without consulting the model.
    /// TODO: rank by interaction counts once a popularity source is wired in.
    fn cold_start_recommendations(&self, user_id: &str) -> RecommendationResponse {
        RecommendationResponse {
            user_id: user_id.to_string(),
            recommendations: Vec::new(),
        }
    }

    /// Per-user results; one user's failure never aborts the batch.
    pub async fn recommend_batch(
        &self,
        user_ids: &[String],
        top_k: usize,
    ) -> BatchRecommendationResponse {
        let mut results = HashMap::new();
        for user_id in user_ids {
            let request = RecommendationRequest {
                user_id: user_id.clone(),
                top_k,
            };
            let entry = match self.recommend(&request).await {
                Ok(response) => BatchEntry::Recommendations(response.recommendations),
                Err(e) => {
                    error!("batch recommendation failed for {}: {}", user_id, e);
                    BatchEntry::Error {
                        error: e.to_string(),
                    }
                }
            };
            results.insert(user_id.clone(), entry);
        }
        results
    }

    /// Never fails; reports whatever is currently loaded.
    pub async fn status(&self) -> ServiceStatus {
        match self.snapshot.read().await.as_ref() {
            Some(snapshot) => ServiceStatus {
                model_loaded: true,
                generation: snapshot.generation,
                total_users: snapshot.mappings.user_mapping.len(),
                total_items: snapshot.mappings.item_mapping.len(),
            },
            None => ServiceStatus {
                model_loaded: false,
                generation: 0,
                total_users: 0,
                total_items: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::AggregationKind;

    fn write_fixtures(dir: &std::path::Path) -> Config {
        let checkpoint = ModelCheckpoint {
            schema: ModelCheckpoint::SCHEMA.to_string(),
            num_users: 2,
            num_items: 2,
            embedding_dim: 4,
            n_layers: 1,
            aggregation: AggregationKind::Mean,
            user_embeddings: vec![
                vec![1.0, 0.0, 0.0, 0.0],
                vec![0.0, 0.0, 1.0, 0.0],
            ],
            item_embeddings: vec![
                vec![1.0, 0.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0, 0.0],
            ],
            layer_attention: None,
            graph: None,
        };
        let model_path = dir.join("model.json");
        std::fs::write(&model_path, serde_json::to_string(&checkpoint).unwrap()).unwrap();

        let mappings = IdMappings::from_identifiers(
            vec!["alice".to_string(), "bob".to_string()],
            vec!["item_a".to_string(), "item_b".to_string()],
        );
        let mapping_path = dir.join("mappings.json");
        std::fs::write(&mapping_path, serde_json::to_string(&mappings).unwrap()).unwrap();

        let mut config = Config::default();
        config.storage.model_path = model_path.display().to_string();
        config.storage.mapping_path = mapping_path.display().to_string();
        config
    }

    #[tokio::test]
    async fn test_not_loaded_errors() {
        let service = RecommenderService::new(Arc::new(Config::default()));
        let request = RecommendationRequest {
            user_id: "alice".to_string(),
            top_k: 5,
        };
        assert!(matches!(
            service.recommend(&request).await,
            Err(RecError::ModelNotLoaded)
        ));

        let status = service.status().await;
        assert!(!status.model_loaded);
        assert_eq!(status.generation, 0);
    }

    #[tokio::test]
    async fn test_recommend_orders_by_inner_product() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path());
        let service = RecommenderService::new(Arc::new(config));
        service.load().await.unwrap();

        // alice -> index 0 with embedding [1,0,0,0]; item_a scores 1, item_b 0
        let response = service
            .recommend(&RecommendationRequest {
                user_id: "alice".to_string(),
                top_k: 2,
            })
            .await
            .unwrap();
        assert_eq!(response.recommendations.len(), 2);
        assert_eq!(response.recommendations[0].item_id, "item_a");
        assert!(response.recommendations[0].score > response.recommendations[1].score);
    }

    #[tokio::test]
    async fn test_cold_start_returns_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path());
        let service = RecommenderService::new(Arc::new(config));
        service.load().await.unwrap();

        let response = service
            .recommend(&RecommendationRequest {
                user_id: "u1".to_string(),
                top_k: 10,
            })
            .await
            .unwrap();
        assert_eq!(response.user_id, "u1");
        assert!(response.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_clamped_to_num_items() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path());
        let service = RecommenderService::new(Arc::new(config));
        service.load().await.unwrap();

        let response = service
            .recommend(&RecommendationRequest {
                user_id: "bob".to_string(),
                top_k: 100,
            })
            .await
            .unwrap();
        assert!(response.recommendations.len() <= 2);
    }

    #[tokio::test]
    async fn test_invalid_user_index_detected() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path());

        // Manually edit the mapping so a user points past the table.
        let mut store = MappingStore::load(&config.storage.mapping_path).unwrap();
        store.mappings.user_mapping.insert("broken".to_string(), 17);
        std::fs::write(
            &config.storage.mapping_path,
            serde_json::to_string(&store.mappings).unwrap(),
        )
        .unwrap();

        let service = RecommenderService::new(Arc::new(config));
        service.load().await.unwrap();

        let result = service
            .recommend(&RecommendationRequest {
                user_id: "broken".to_string(),
                top_k: 5,
            })
            .await;
        assert!(matches!(
            result,
            Err(RecError::InvalidUser {
                index: 17,
                num_users: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_serving_old_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path());
        let service = RecommenderService::new(Arc::new(config.clone()));
        service.load().await.unwrap();
        assert_eq!(service.status().await.generation, 1);

        // Corrupt the checkpoint, then attempt a reload.
        std::fs::write(&config.storage.model_path, "not json").unwrap();
        assert!(service.reload().await.is_err());

        let status = service.status().await;
        assert!(status.model_loaded);
        assert_eq!(status.generation, 1);

        let response = service
            .recommend(&RecommendationRequest {
                user_id: "alice".to_string(),
                top_k: 1,
            })
            .await
            .unwrap();
        assert_eq!(response.recommendations[0].item_id, "item_a");
    }

    #[tokio::test]
    async fn test_batch_mixes_results_and_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path());
        let service = RecommenderService::new(Arc::new(config));
        service.load().await.unwrap();

        let results = service
            .recommend_batch(
                &["alice".to_string(), "stranger".to_string()],
                2,
            )
            .await;
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results.get("alice"),
            Some(BatchEntry::Recommendations(recommendations)) if !recommendations.is_empty()
        ));
        assert!(matches!(
            results.get("stranger"),
            Some(BatchEntry::Recommendations(recommendations)) if recommendations.is_empty()
        ));

        // The wire shape for a successful slot is the bare list.
        let json = serde_json::to_value(results.get("stranger").unwrap()).unwrap();
        assert!(json.is_array());
    }

    #[tokio::test]
    async fn test_unmapped_indices_silently_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path());

        // Drop item_b's reverse entry; results shrink instead of erroring.
        let mut store = MappingStore::load(&config.storage.mapping_path).unwrap();
        store.mappings.reverse_item_mapping.remove(&1);
        store.mappings.item_mapping.remove("item_b");
        std::fs::write(
            &config.storage.mapping_path,
            serde_json::to_string(&store.mappings).unwrap(),
        )
        .unwrap();

        let service = RecommenderService::new(Arc::new(config));
        service.load().await.unwrap();

        let response = service
            .recommend(&RecommendationRequest {
                user_id: "alice".to_string(),
                top_k: 2,
            })
            .await
            .unwrap();
        assert_eq!(response.recommendations.len(), 1);
        assert_eq!(response.recommendations[0].item_id, "item_a");
    }
}
