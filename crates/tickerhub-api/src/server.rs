//! HTTP server implementation using axum.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tickerhub_core::ExchangeId;
use tickerhub_fetcher::{ArbitrageOutcome, ComparisonOutcome, FetchOrchestrator, TickerQuery};
use tickerhub_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::types::{ExchangeList, StatusReport, StreamingToggle, SymbolRefresh, TickerList};

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<FetchOrchestrator>,
    config: ApiConfig,
}

impl AppState {
    pub fn new(orchestrator: Arc<FetchOrchestrator>, config: ApiConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/tickers", get(list_tickers))
        .route("/api/v1/exchanges", get(list_exchanges))
        .route("/api/v1/status", get(status))
        .route("/api/v1/streaming/enable", post(enable_streaming))
        .route("/api/v1/streaming/disable", post(disable_streaming))
        .route("/api/v1/symbols/{exchange}/refresh", post(refresh_symbols))
        .route("/api/v1/comparison/{symbol}", get(compare))
        .route("/api/v1/comparison/{symbol}/arbitrage", get(arbitrage))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn list_tickers(
    State(state): State<AppState>,
    Query(mut query): Query<TickerQuery>,
) -> Json<TickerList> {
    query.limit = Some(query.limit.unwrap_or(state.config.page_size));
    let tickers = state.orchestrator.tickers(&query);
    Json(TickerList {
        count: tickers.len(),
        tickers,
    })
}

async fn list_exchanges(State(state): State<AppState>) -> Json<ExchangeList> {
    Json(ExchangeList {
        exchanges: state.orchestrator.available_exchanges(),
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    let orchestrator = &state.orchestrator;
    Json(StatusReport {
        streaming_enabled: orchestrator.is_streaming_enabled(),
        cached_tickers: orchestrator.cache().live_snapshot().len(),
        exchanges: orchestrator.status(),
    })
}

async fn enable_streaming(State(state): State<AppState>) -> Json<StreamingToggle> {
    state.orchestrator.enable_streaming();
    Json(StreamingToggle {
        streaming_enabled: true,
    })
}

async fn disable_streaming(State(state): State<AppState>) -> Json<StreamingToggle> {
    state.orchestrator.disable_streaming().await;
    Json(StreamingToggle {
        streaming_enabled: false,
    })
}

async fn refresh_symbols(
    State(state): State<AppState>,
    Path(exchange): Path<String>,
) -> ApiResult<Json<SymbolRefresh>> {
    let exchange =
        ExchangeId::from_str(&exchange).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let symbols = state.orchestrator.refresh_symbols(exchange).await?;
    Ok(Json(SymbolRefresh {
        exchange,
        tracked_symbols: symbols.len(),
    }))
}

async fn compare(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<ComparisonOutcome> {
    Json(state.orchestrator.compare(&symbol))
}

async fn arbitrage(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<ArbitrageOutcome> {
    Json(state.orchestrator.arbitrage(&symbol))
}

async fn metrics() -> ApiResult<impl IntoResponse> {
    let body = Metrics::gather_text()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// Run the HTTP server until `shutdown` is cancelled.
pub async fn run_server(
    orchestrator: Arc<FetchOrchestrator>,
    config: ApiConfig,
    shutdown: CancellationToken,
) -> ApiResult<()> {
    let port = config.port;
    let app = create_router(AppState::new(orchestrator, config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("API server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use tickerhub_core::{Symbol, TickerData};
    use tickerhub_fetcher::{OrchestratorConfig, TickerCache};
    use tickerhub_registry::{InMemoryTtlCache, SymbolCatalog};
    use tower::ServiceExt;

    fn ticker(exchange: ExchangeId, symbol: &str, price: u32, volume: u32) -> TickerData {
        let mut t = TickerData::new(exchange, Symbol::canonical(symbol).unwrap(), Utc::now());
        t.last_price = price.into();
        t.volume_24h = volume.into();
        t
    }

    fn app() -> Router {
        let cache = Arc::new(TickerCache::new());
        cache.put(ticker(ExchangeId::Binance, "BTCUSDT", 100, 5));
        cache.put(ticker(ExchangeId::Bybit, "BTCUSDT", 105, 3));
        cache.put(ticker(ExchangeId::Kraken, "ETHUSD", 3000, 0));

        let catalog = SymbolCatalog::new(Arc::new(InMemoryTtlCache::new()));
        let orchestrator = FetchOrchestrator::new(
            Vec::new(),
            cache,
            Arc::new(catalog),
            OrchestratorConfig::default(),
        );
        create_router(AppState::new(Arc::new(orchestrator), ApiConfig::default()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        send(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_tickers_hide_zero_volume() {
        let (status, body) = get_json(app(), "/api/v1/tickers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["tickers"][0]["exchangeName"], "BINANCE");
        assert_eq!(body["tickers"][1]["exchangeName"], "BYBIT");
    }

    #[tokio::test]
    async fn test_tickers_filters() {
        let (_, body) = get_json(app(), "/api/v1/tickers?exchange=bybit&symbol=btc").await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["tickers"][0]["symbol"], "BTCUSDT");

        let (_, body) = get_json(app(), "/api/v1/tickers?limit=1").await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_exchanges_listed_from_live_data() {
        let (_, body) = get_json(app(), "/api/v1/exchanges").await;
        assert_eq!(body["exchanges"], serde_json::json!(["BINANCE", "BYBIT"]));
    }

    #[tokio::test]
    async fn test_comparison_route() {
        let (status, body) = get_json(app(), "/api/v1/comparison/BTCUSDT").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "available");
        assert_eq!(body["lowest"]["exchange"], "BINANCE");
        assert_eq!(body["highest"]["exchange"], "BYBIT");
        assert_eq!(body["spread"], "5");
        assert_eq!(body["spreadPercent"], "5.0000");
    }

    #[tokio::test]
    async fn test_comparison_no_data_is_explicit() {
        let (status, body) = get_json(app(), "/api/v1/comparison/ETHUSD").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "no_data");
    }

    #[tokio::test]
    async fn test_arbitrage_route() {
        let (_, body) = get_json(app(), "/api/v1/comparison/btcusdt/arbitrage").await;
        assert_eq!(body["status"], "opportunity");
        assert_eq!(body["buyFrom"]["exchange"], "BINANCE");
        assert_eq!(body["sellTo"]["exchange"], "BYBIT");

        let (_, body) = get_json(app(), "/api/v1/comparison/ETHUSD/arbitrage").await;
        assert_eq!(body["status"], "insufficient_data");
        assert_eq!(body["available"], 0);
    }

    #[tokio::test]
    async fn test_streaming_toggle_routes() {
        let app = app();
        let request = Request::post("/api/v1/streaming/disable")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["streamingEnabled"], false);

        let (_, body) = get_json(app.clone(), "/api/v1/status").await;
        assert_eq!(body["streamingEnabled"], false);
        assert_eq!(body["cachedTickers"], 2);

        let request = Request::post("/api/v1/streaming/enable")
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(app, request).await;
        assert_eq!(body["streamingEnabled"], true);
    }

    #[tokio::test]
    async fn test_refresh_rejects_bad_exchange() {
        let request = Request::post("/api/v1/symbols/mtgox/refresh")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::post("/api/v1/symbols/kraken/refresh")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("KRAKEN"));
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }
}
