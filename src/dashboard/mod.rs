//! Web dashboard
//!
//! Routes:
//! - `GET /`               HTML table of active pools
//! - `GET /api/pools`      the same rows as JSON
//! - `GET /stats`          summary counts
//! - `GET /health`
//! - `POST /graphql-proxy` forwards the body to the GraphQL endpoint

pub mod html;
pub mod rows;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use console::style;
use eyre::{Result, WrapErr};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::commands::App;
use crate::indexer::rest::ApiVersion;
use crate::indexer::types::PoolSnapshot;
use crate::nav::NetNav;
use rows::{assemble, DashboardData, PoolNav};

/// Concurrent NAV/lifespan computations while building the table
const CONCURRENCY: usize = 4;

#[derive(Clone)]
pub struct DashboardState {
    app: App,
    pools: TtlCache<ApiVersion, Vec<PoolSnapshot>>,
    lifetimes: TtlCache<String, Option<(f64, Option<f64>)>>,
    data: TtlCache<u64, Arc<DashboardData>>,
}

impl DashboardState {
    pub fn new(app: App) -> Self {
        let ttl = Duration::from_secs(app.config.dashboard_cache_ttl_secs);
        Self {
            app,
            pools: TtlCache::new(ttl),
            // lifespans move slowly; keep them ten times longer
            lifetimes: TtlCache::new(ttl * 10),
            data: TtlCache::new(ttl),
        }
    }

    async fn pools(&self, version: ApiVersion) -> Result<Vec<PoolSnapshot>> {
        let chain = self.app.chain();
        let rest = &self.app.clients.rest;
        self.pools
            .get_or_fetch(version, || rest.fetch_pools(version, chain, None))
            .await
    }

    /// Annualized lifespan return; failures are remembered as `None`
    async fn lifetime(&self, pool: &str) -> Option<(f64, Option<f64>)> {
        let key = pool.to_lowercase();
        let fetched = self
            .lifetimes
            .get_or_fetch(key.clone(), || async {
                match self.app.lifespan().lifespan_return(&key).await {
                    Ok(l) => Ok(l
                        .result
                        .period
                        .annualized
                        .map(|apy| (apy, l.result.period.days))),
                    Err(e) => {
                        debug!("No lifespan for {}: {}", key, e);
                        Ok(None)
                    }
                }
            })
            .await;
        fetched.ok().flatten()
    }

    async fn pool_nav(&self, snapshot: PoolSnapshot, nav: Option<NetNav>) -> PoolNav {
        let pair = self
            .app
            .tokens
            .pair_label(&snapshot.vault0.asset, &snapshot.vault1.asset)
            .await;
        let lifetime = self.lifetime(&snapshot.pool).await;
        PoolNav {
            snapshot,
            pair,
            nav,
            lifetime,
        }
    }

    async fn build(&self) -> Result<DashboardData> {
        let v1 = self.pools(ApiVersion::V1).await?;
        let v2 = self.pools(ApiVersion::V2).await?;
        let active: Vec<PoolSnapshot> = v1.into_iter().filter(|p| p.active).collect();
        info!("📊 Building dashboard for {} active pools", active.len());

        let mut navs: HashMap<String, NetNav> =
            self.app.nav.calculate_all(&active).await.into_iter().collect();

        let rows: Vec<PoolNav> = stream::iter(active)
            .map(|snapshot| {
                let nav = navs.remove(&snapshot.pool);
                self.pool_nav(snapshot, nav)
            })
            .buffer_unordered(CONCURRENCY)
            .collect()
            .await;

        Ok(assemble(
            &rows,
            &v2,
            self.app.config.dashboard_max_pools,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ))
    }

    pub async fn data(&self) -> Result<Arc<DashboardData>> {
        self.data
            .get_or_fetch(self.app.chain(), || async { Ok(Arc::new(self.build().await?)) })
            .await
    }
}

// ============================================
// HANDLERS
// ============================================

fn error_json(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn index(State(state): State<DashboardState>) -> Html<String> {
    match state.data().await {
        Ok(data) => Html(html::render(&data)),
        Err(e) => {
            warn!("⚠️ Dashboard load failed: {:#}", e);
            Html(html::render_error(&e.to_string()))
        }
    }
}

async fn api_pools(State(state): State<DashboardState>) -> Response {
    match state.data().await {
        Ok(data) => Json(data.as_ref().clone()).into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn stats(State(state): State<DashboardState>) -> Response {
    match state.data().await {
        Ok(data) => Json(data.stats()).into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn graphql_proxy(State(state): State<DashboardState>, body: Bytes) -> Response {
    match state.app.clients.graphql.forward_raw(body.to_vec()).await {
        Ok((status, bytes)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response()
        }
        Err(e) => {
            warn!("⚠️ GraphQL proxy error: {}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(index))
        .route("/api/pools", get(api_pools))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .route("/graphql-proxy", post(graphql_proxy).options(preflight))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve(app: App, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {}", addr))?;

    println!("{} Dashboard listening on http://{}", style("✓").green(), addr);
    println!("   - GET  /");
    println!("   - GET  /api/pools");
    println!("   - GET  /stats");
    println!("   - GET  /health");
    println!("   - POST /graphql-proxy");
    println!();

    axum::serve(listener, router(DashboardState::new(app)))
        .await
        .wrap_err("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn spawn(config: Config) -> String {
        let app = App::new(config).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(DashboardState::new(app))).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config(dir: &TempDir, graphql_url: String, rest_url: String) -> Config {
        Config {
            graphql_url,
            rest_api_v1: format!("{}/v1", rest_url),
            rest_api_v2: format!("{}/v2", rest_url),
            max_retries: 1,
            initial_retry_delay_secs: 0,
            pool_cache_path: dir.path().join("pools.csv").display().to_string(),
            token_cache_path: dir.path().join("tokens.csv").display().to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_health_and_cors() {
        let dir = tempdir().unwrap();
        let base = spawn(config(&dir, "http://127.0.0.1:1".into(), "http://127.0.0.1:1".into())).await;

        let response = reqwest::Client::new()
            .get(format!("{}/health", base))
            .header("Origin", "http://example.com")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_graphql_proxy_forwards_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("priceCrons"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "ok": true } })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let base = spawn(config(&dir, format!("{}/graphql", server.uri()), server.uri())).await;

        let response = reqwest::Client::new()
            .post(format!("{}/graphql-proxy", base))
            .body(r#"{"query":"{ priceCrons { items { price } } }"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["data"]["ok"], true);
    }

    #[tokio::test]
    async fn test_graphql_proxy_error_is_500() {
        let dir = tempdir().unwrap();
        let base = spawn(config(&dir, "http://127.0.0.1:1/graphql".into(), "http://127.0.0.1:1".into())).await;

        let response = reqwest::Client::new()
            .post(format!("{}/graphql-proxy", base))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_index_renders_error_page_when_index_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let base = spawn(config(&dir, "http://127.0.0.1:1/graphql".into(), server.uri())).await;

        let response = reqwest::get(format!("{}/", base)).await.unwrap();
        assert_eq!(response.status(), 200);
        let text = response.text().await.unwrap();
        assert!(text.contains("Error loading data"));

        let stats = reqwest::get(format!("{}/stats", base)).await.unwrap();
        assert_eq!(stats.status(), 500);
    }

    #[tokio::test]
    async fn test_empty_index_gives_empty_dashboard() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let base = spawn(config(&dir, "http://127.0.0.1:1/graphql".into(), server.uri())).await;

        let body: Value = reqwest::get(format!("{}/api/pools", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["activePools"], 0);
        assert_eq!(body["pools"], json!([]));
    }
}
