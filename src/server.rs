use crate::config::Config;
use crate::domain::{Marketplace, Region};
use crate::error::{DealscanError, Result};
use crate::pipeline::trends::{classify_trend, history_stats, predict_next_week};
use crate::pipeline::{SearchPipeline, SearchRequest};
use crate::storage::Storage;
use axum::{
    extract::{Path, Query},
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use chrono::{Duration, Utc};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Everything the handlers need, wired once at startup. No ambient global
/// clients; the pipeline and storage are injected here.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SearchPipeline>,
    pub storage: Arc<dyn Storage>,
    pub default_top_n: usize,
    pub default_min_trust: f64,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "dealscan",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    filters: SearchFilters,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFilters {
    min_trust_score: Option<f64>,
}

/// POST /api/v1/search — the full pipeline behind one endpoint. An empty
/// query is the caller's fault (400); a batch where every marketplace failed
/// is a valid empty result (200); anything unexpected is a generic 500 with
/// details kept in the logs.
async fn search_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<SearchBody>,
) -> impl IntoResponse {
    let query = body.query.unwrap_or_default();
    let request = SearchRequest {
        query,
        region: Region::parse(body.region.as_deref().unwrap_or("US")),
        min_trust_score: body.filters.min_trust_score.unwrap_or(state.default_min_trust),
        top_n: state.default_top_n,
    };

    let report = match state.pipeline.run(&request).await {
        Ok(report) => report,
        Err(DealscanError::Validation(message)) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
        }
        Err(err) => {
            error!(error = %err, "search pipeline failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Search failed" })),
            )
                .into_response();
        }
    };

    // Cache the ranked products and record this scan's costs so the trend
    // estimator has history to read.
    let now = Utc::now();
    if let Err(err) = state.storage.upsert_products(&report.products).await {
        error!(error = %err, "failed to cache ranked products");
    }
    if let Err(err) = state.storage.record_price_points(&report.products, now).await {
        error!(error = %err, "failed to record price points");
    }

    Json(report.into_response()).into_response()
}

#[derive(Debug, Deserialize)]
struct TrendsQuery {
    days: Option<i64>,
    marketplace: Option<String>,
}

/// GET /api/v1/trends/:product_id — price history with trend classification
/// and a short-horizon forecast.
async fn trends_handler(
    Extension(state): Extension<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<TrendsQuery>,
) -> impl IntoResponse {
    let days = params.days.unwrap_or(30).clamp(1, 365);
    let marketplace = params
        .marketplace
        .as_deref()
        .and_then(|m| m.parse::<Marketplace>().ok());
    let since = Utc::now() - Duration::days(days);

    let history = match state.storage.price_history(&product_id, since, marketplace).await {
        Ok(history) => history,
        Err(err) => {
            error!(error = %err, "failed to read price history");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to retrieve price history" })),
            )
                .into_response();
        }
    };

    if history.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No price history found for this product" })),
        )
            .into_response();
    }

    let prices: Vec<f64> = history.iter().map(|p| p.true_cost).collect();
    Json(json!({
        "productId": product_id,
        "priceHistory": history
            .iter()
            .map(|p| json!({
                "date": p.timestamp,
                "price": p.true_cost,
                "marketplace": p.marketplace,
                "vendor": p.vendor,
            }))
            .collect::<Vec<_>>(),
        "trend": classify_trend(&prices),
        "prediction": predict_next_week(&prices),
        "stats": history_stats(&prices),
    }))
    .into_response()
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

/// Builds the full application router. Split out from `serve` so tests can
/// drive it in-process.
pub fn router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/search", post(search_handler))
        .route("/api/v1/trends/:product_id", get(trends_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(Extension(metrics_handle))
        .layer(cors)
}

pub async fn serve(config: &Config, state: AppState) -> Result<()> {
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| DealscanError::Internal(format!("failed to install metrics recorder: {e}")))?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| DealscanError::Config(format!("invalid server address: {e}")))?;

    let app = router(state, metrics_handle);
    info!(%addr, "dealscan server listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| DealscanError::Internal(format!("server error: {e}")))?;

    Ok(())
}
