use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use gcnrec::{init_tracing, AppState, Config, RecError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

/// Structured error body distinguishing "model absent" from "computation
/// error". Unknown users never reach this path; they get a normal empty
/// result.
fn error_response(e: RecError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match e {
        RecError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let kind = match e {
        RecError::ModelNotLoaded => "model_not_loaded",
        _ => "computation_error",
    };
    (status, Json(json!({ "error": e.to_string(), "kind": kind })))
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.recommender.status().await;
    Json(json!({
        "service": "gcnrec recommendation API",
        "status": "running",
        "model_loaded": status.model_loaded,
        "generation": status.generation,
        "total_users": status.total_users,
        "total_items": status.total_items,
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.recommender.status().await;
    Json(json!({ "status": "healthy", "model_loaded": status.model_loaded }))
}

async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<gcnrec::RecommendationRequest>,
) -> Result<Json<gcnrec::RecommendationResponse>, (StatusCode, Json<serde_json::Value>)> {
    match state.recommender.recommend(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::error!("failed to get recommendations: {}", e);
            Err(error_response(e))
        }
    }
}

async fn recommend_batch(
    State(state): State<AppState>,
    Json(request): Json<gcnrec::BatchRecommendationRequest>,
) -> Json<gcnrec::BatchRecommendationResponse> {
    Json(
        state
            .recommender
            .recommend_batch(&request.user_ids, request.top_k)
            .await,
    )
}

async fn reload_model(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, (StatusCode, Json<ApiResponse<String>>)> {
    match state.recommender.reload().await {
        Ok(()) => Ok(Json(ApiResponse::success(
            "Model reloaded successfully".to_string(),
        ))),
        Err(e) => {
            tracing::error!("reload failed, previous snapshot still serving: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Error reloading model: {}", e))),
            ))
        }
    }
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/recommend", post(recommend))
        .route("/recommend/batch", post(recommend_batch))
        .route("/reload", post(reload_model))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing().await;

    let config = match std::env::var("GCNREC_CONFIG") {
        Ok(path) => Config::from_file(&path)?,
        Err(_) => Config::default(),
    };
    info!("Starting gcnrec server with config: {:?}", config.server);

    let state = AppState::new(config.clone()).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.socket_addr()).await?;
    info!("Server listening on {}", config.server.socket_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
