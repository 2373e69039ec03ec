use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};

use super::ResourceBackend;
use crate::error::{AppError, AppResult};
use crate::identity::ForwardedHeaders;
use crate::model::{BackendReply, ResourceKind};

/// Query appended to single-sitemap reads; hidden widgets are needed to filter
/// the full tree.
const SITEMAP_DETAIL_QUERY: &str = "jsoncallback=callback&includeHidden=true";

/// reqwest-backed `ResourceBackend` against one openHAB instance.
#[derive(Clone)]
pub struct HttpBackend {
    base: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// `base` is scheme, host and port, e.g. `http://127.0.0.1:8080`.
    pub fn new(base: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::internal("http_client".to_string(), e.to_string()))?;
        Ok(Self::with_client(base, client))
    }

    pub fn with_client(base: impl Into<String>, client: reqwest::Client) -> Self {
        let base = base.into();
        Self { base: base.trim_end_matches('/').to_string(), client }
    }

    pub fn base(&self) -> &str { &self.base }

    fn collection_path(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::Item => "/rest/items",
            ResourceKind::Page => "/rest/ui/components/ui%3Apage",
            ResourceKind::Sitemap => "/rest/sitemaps",
        }
    }

    fn url(&self, path: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.base, path)
        } else {
            format!("{}{}?{}", self.base, path, query)
        }
    }

    async fn get_json(&self, url: String, headers: &ForwardedHeaders) -> AppResult<Value> {
        let resp = self.client.get(&url).headers(headers.header_map()).send().await.map_err(|e| {
            warn!(target: "habgate::backend", url = %url, error = %e, "backend request failed");
            AppError::from(e)
        })?;
        let status = resp.status();
        debug!(target: "habgate::backend", url = %url, status = status.as_u16(), "backend responded");
        if !status.is_success() {
            return Err(AppError::backend(Some(status.as_u16()), format!("GET {} returned {}", url, status)));
        }
        Ok(resp.json::<Value>().await?)
    }

    async fn post(&self, url: String, content_type: &'static str, body: String, headers: &ForwardedHeaders) -> AppResult<u16> {
        let mut h: HeaderMap = headers.header_map();
        h.insert(ACCEPT, HeaderValue::from_static("*/*"));
        h.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        let resp = self.client.post(&url).headers(h).body(body).send().await.map_err(|e| {
            warn!(target: "habgate::backend", url = %url, error = %e, "backend request failed");
            AppError::from(e)
        })?;
        let status = resp.status().as_u16();
        debug!(target: "habgate::backend", url = %url, status, "backend responded");
        Ok(status)
    }
}

fn segment(s: &str) -> std::borrow::Cow<'_, str> { urlencoding::encode(s) }

impl ResourceBackend for HttpBackend {
    fn list_resources<'a>(&'a self, kind: ResourceKind, query: &'a str, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<Value>> {
        async move { self.get_json(self.url(Self::collection_path(kind), query), headers).await }.boxed()
    }

    fn get_resource<'a>(&'a self, kind: ResourceKind, id: &'a str, query: &'a str, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<Value>> {
        async move {
            let path = format!("{}/{}", Self::collection_path(kind), segment(id));
            let query = match kind {
                ResourceKind::Sitemap if query.is_empty() => SITEMAP_DETAIL_QUERY,
                _ => query,
            };
            self.get_json(self.url(&path, query), headers).await
        }
        .boxed()
    }

    fn get_item_state<'a>(&'a self, item: &'a str, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<BackendReply<String>>> {
        async move {
            let url = self.url(&format!("/rest/items/{}/state", segment(item)), "");
            let resp = self.client.get(&url).headers(headers.header_map()).send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            debug!(target: "habgate::backend", url = %url, status, "backend responded");
            Ok(BackendReply { status, body })
        }
        .boxed()
    }

    fn get_item_semantic<'a>(&'a self, item: &'a str, semantic_class: &'a str, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<BackendReply<Value>>> {
        async move {
            let url = self.url(&format!("/rest/items/{}/semantic/{}", segment(item), segment(semantic_class)), "");
            let resp = self.client.get(&url).headers(headers.header_map()).send().await?;
            let status = resp.status().as_u16();
            // Error answers may carry an empty or non-JSON body.
            let bytes = resp.bytes().await?;
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            debug!(target: "habgate::backend", url = %url, status, "backend responded");
            Ok(BackendReply { status, body })
        }
        .boxed()
    }

    fn send_command<'a>(&'a self, item: &'a str, command: String, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<u16>> {
        async move { self.post(self.url(&format!("/rest/items/{}", segment(item)), ""), "text/plain", command, headers).await }.boxed()
    }

    fn send_event_items<'a>(&'a self, connection_id: &'a str, items: Vec<String>, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<u16>> {
        async move {
            let body = serde_json::to_string(&items).map_err(|e| AppError::internal("encode".to_string(), e.to_string()))?;
            let url = self.url(&format!("/rest/events/states/{}", segment(connection_id)), "");
            self.post(url, "application/json", body, headers).await
        }
        .boxed()
    }
}
