//!
//! habgate HTTP server
//! -------------------
//! Axum router placed between the reverse proxy and openHAB.
//!
//! Responsibilities:
//! - `auth_request` decision endpoints (`/auth/*`) answering 200/403.
//! - Filtered mirrors of the openHAB REST endpoints for Items, Pages and Sitemaps.
//! - Identity extraction from the proxy headers (400 when the user is missing).
//! - Optional background sweep of expired cache entries.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::backend::{HttpBackend, ResourceBackend};
use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};
use crate::gateway::{AuthorizationGateway, Decision, Guarded};
use crate::identity::{RequestContext, ORIGINAL_URI_HEADER};
use crate::model::{BackendReply, ItemQuery, ResourceKind};

static ITEM_URI: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/items/([A-Za-z_0-9]+)").ok());
static PAGE_URI: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/page/([A-Za-z_0-9]+)").ok());
static SITEMAP_URI: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\?|&)sitemap=([A-Za-z_0-9]+)").ok());

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: AuthorizationGateway,
    /// Base URL of the openHAB backend, reported by `/`.
    pub backend_host: String,
}

impl AppState {
    pub fn new(config: GatewayConfig, backend: Arc<dyn ResourceBackend>, backend_host: impl Into<String>) -> Self {
        Self { gateway: AuthorizationGateway::new(Arc::new(config), backend), backend_host: backend_host.into() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(target: "habgate::server", code = self.code_str(), "request failed: {}", self.message());
        } else {
            debug!(target: "habgate::server", code = self.code_str(), status = status.as_u16(), "request rejected: {}", self.message());
        }
        (status, Json(json!({"status": "error", "code": self.code_str(), "error": self.message()}))).into_response()
    }
}

impl IntoResponse for Decision {
    fn into_response(self) -> Response {
        match self {
            Decision::Allow => StatusCode::OK.into_response(),
            Decision::Deny => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        RequestContext::from_headers(&parts.headers, &state.gateway.config().org_delimiter)
    }
}

fn status_of(code: u16) -> StatusCode { StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY) }

fn json_reply(res: AppResult<Value>) -> Response {
    match res {
        Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn guarded_json(res: AppResult<Guarded<Value>>) -> Response {
    match res {
        Ok(Guarded::Allowed(v)) => (StatusCode::OK, Json(v)).into_response(),
        Ok(Guarded::Denied) => StatusCode::FORBIDDEN.into_response(),
        Err(e) => e.into_response(),
    }
}

fn status_reply(res: AppResult<u16>) -> Response {
    match res {
        Ok(code) => status_of(code).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Resource id captured from the `X-ORIGINAL-URI` header by `re`.
fn original_uri_capture(headers: &HeaderMap, re: &Option<Regex>, group: usize) -> AppResult<Option<String>> {
    let uri = headers
        .get(ORIGINAL_URI_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::identity("missing_original_uri", "X-ORIGINAL-URI header is required"))?;
    Ok(re.as_ref().and_then(|re| re.captures(uri)).and_then(|c| c.get(group)).map(|m| m.as_str().to_string()))
}

async fn decide(state: &AppState, ctx: &RequestContext, headers: &HeaderMap, kind: ResourceKind, re: &Option<Regex>, group: usize) -> Response {
    match original_uri_capture(headers, re, group) {
        Ok(Some(id)) => state.gateway.authorize(ctx, kind, &id).await.into_response(),
        Ok(None) => Decision::Deny.into_response(),
        Err(e) => e.into_response(),
    }
}

// ----- Handlers -----

async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "description": "Multi-tenant authorization gateway for the openHAB REST API.",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.backend_host,
        "links": [{"type": "rest-api", "path": "/rest"}]
    }))
}

async fn auth_admin(State(state): State<AppState>, ctx: RequestContext) -> Decision { state.gateway.authorize_admin(&ctx.identity) }

async fn auth_items(State(state): State<AppState>, ctx: RequestContext, headers: HeaderMap) -> Response {
    decide(&state, &ctx, &headers, ResourceKind::Item, &ITEM_URI, 1).await
}

async fn auth_pages(State(state): State<AppState>, ctx: RequestContext, headers: HeaderMap) -> Response {
    decide(&state, &ctx, &headers, ResourceKind::Page, &PAGE_URI, 1).await
}

async fn auth_sitemaps(State(state): State<AppState>, ctx: RequestContext, headers: HeaderMap) -> Response {
    decide(&state, &ctx, &headers, ResourceKind::Sitemap, &SITEMAP_URI, 2).await
}

async fn list_items(State(state): State<AppState>, ctx: RequestContext, Query(q): Query<ItemQuery>) -> Response {
    json_reply(state.gateway.items(&ctx, &q).await)
}

async fn get_item(State(state): State<AppState>, ctx: RequestContext, Path(itemname): Path<String>, Query(q): Query<ItemQuery>) -> Response {
    guarded_json(state.gateway.item(&ctx, &itemname, &q).await)
}

async fn post_item_command(State(state): State<AppState>, ctx: RequestContext, Path(itemname): Path<String>, command: String) -> Response {
    match state.gateway.send_command(&ctx, &itemname, command).await {
        Ok(Guarded::Allowed(code)) => status_of(code).into_response(),
        Ok(Guarded::Denied) => StatusCode::FORBIDDEN.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_item_state(State(state): State<AppState>, ctx: RequestContext, Path(itemname): Path<String>) -> Response {
    match state.gateway.item_state(&ctx, &itemname).await {
        Ok(Guarded::Allowed(BackendReply { status, body })) => (status_of(status), body).into_response(),
        Ok(Guarded::Denied) => StatusCode::FORBIDDEN.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_item_semantic(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((itemname, semantic_class)): Path<(String, String)>,
) -> Response {
    match state.gateway.item_semantic(&ctx, &itemname, &semantic_class).await {
        Ok(Guarded::Allowed(BackendReply { status, body })) => (status_of(status), Json(body)).into_response(),
        Ok(Guarded::Denied) => StatusCode::FORBIDDEN.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn post_event_items(State(state): State<AppState>, ctx: RequestContext, Path(connection_id): Path<String>, body: String) -> Response {
    let items: Vec<String> = match serde_json::from_str(&body) {
        Ok(items) => items,
        Err(e) => return AppError::invalid("invalid_items_list".to_string(), e.to_string()).into_response(),
    };
    status_reply(state.gateway.send_event_items(&ctx, &connection_id, items).await)
}

async fn list_pages(State(state): State<AppState>, ctx: RequestContext) -> Response { json_reply(state.gateway.pages(&ctx).await) }

async fn get_page(State(state): State<AppState>, ctx: RequestContext, Path(page_uid): Path<String>) -> Response {
    guarded_json(state.gateway.page(&ctx, &page_uid).await)
}

async fn list_sitemaps(State(state): State<AppState>, ctx: RequestContext) -> Response { json_reply(state.gateway.sitemaps(&ctx).await) }

async fn get_sitemap(State(state): State<AppState>, ctx: RequestContext, Path(sitemapname): Path<String>) -> Response {
    guarded_json(state.gateway.sitemap(&ctx, &sitemapname).await)
}

/// All gateway routes. Page routes are mounted under both the literal and the
/// percent-encoded form of `ui:page`.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(service_info))
        .route("/auth/admin", get(auth_admin))
        .route("/auth/items", get(auth_items))
        .route("/auth/pages", get(auth_pages))
        .route("/auth/sitemaps", get(auth_sitemaps))
        .route("/rest/items", get(list_items))
        .route("/rest/items/{itemname}", get(get_item).post(post_item_command))
        .route("/rest/items/{itemname}/state", get(get_item_state))
        .route("/rest/items/{itemname}/semantic/{semanticClass}", get(get_item_semantic))
        .route("/rest/events/states/{connectionId}", axum::routing::post(post_event_items))
        .route("/rest/sitemaps", get(list_sitemaps))
        .route("/rest/sitemaps/{sitemapname}", get(get_sitemap));
    for component in ["ui:page", "ui%3Apage", "ui%3apage"] {
        app = app
            .route(&format!("/rest/ui/components/{}", component), get(list_pages))
            .route(&format!("/rest/ui/components/{}/{{pageUid}}", component), get(get_page));
    }
    app.with_state(state)
}

/// Periodically drop expired cache entries. Lazy eviction keeps working without it.
fn spawn_sweeper(state: &AppState, interval: Duration) {
    let gateway = state.gateway.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = gateway.evaluator().pools().sweep_all();
            if removed > 0 {
                debug!(target: "habgate::cache", removed, "cache sweep");
            }
        }
    });
}

/// Start the gateway on `0.0.0.0:port` in front of the openHAB instance at `backend_host`.
pub async fn run(port: u16, backend_host: &str, config: GatewayConfig) -> anyhow::Result<()> {
    let backend = HttpBackend::new(backend_host)?;
    let sweep_ms = config.sweep_interval_ms;
    info!(
        target: "startup",
        "habgate starting: backend={}, admin_org={}, everyone_org={}, acl_prefix={}, listing_ttl_ms={}, allow_set_ttl_ms={}, sitemaps_disabled={}",
        backend.base(), config.admin_org, config.everyone_org, config.acl_prefix,
        config.listing_ttl_ms, config.allow_set_ttl_ms, config.sitemaps_disabled
    );
    for (route, re) in [("/auth/items", &*ITEM_URI), ("/auth/pages", &*PAGE_URI), ("/auth/sitemaps", &*SITEMAP_URI)] {
        if re.is_none() {
            error!(target: "startup", route, "X-ORIGINAL-URI pattern failed to compile; every request will be denied");
        }
    }
    let state = AppState::new(config, Arc::new(backend), backend_host);
    if sweep_ms > 0 {
        spawn_sweeper(&state, Duration::from_millis(sweep_ms));
    } else {
        info!(target: "startup", "background cache sweep disabled");
    }

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
