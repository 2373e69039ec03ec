//! Access to the openHAB REST backend.
//!
//! The gateway, evaluator and tests only see `ResourceBackend`; `HttpBackend`
//! is the production implementation over reqwest.

mod client;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::AppResult;
use crate::identity::ForwardedHeaders;
use crate::model::{BackendReply, ResourceKind};

pub use client::HttpBackend;

/// Operations the gateway needs from openHAB. Every call replays the caller's
/// forwarded headers; nothing here retries or caches.
///
/// JSON reads fail with `BackendUnavailable` on transport errors and non-2xx
/// answers. Writes and the state read return the upstream status instead.
pub trait ResourceBackend: Send + Sync {
    /// Collection of `kind`. `query` is a pre-encoded query string without `?`.
    fn list_resources<'a>(&'a self, kind: ResourceKind, query: &'a str, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<Value>>;

    fn get_resource<'a>(&'a self, kind: ResourceKind, id: &'a str, query: &'a str, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<Value>>;

    /// Plain-text state of an Item.
    fn get_item_state<'a>(&'a self, item: &'a str, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<BackendReply<String>>>;

    /// Item carrying `semantic_class` for the given Item.
    fn get_item_semantic<'a>(&'a self, item: &'a str, semantic_class: &'a str, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<BackendReply<Value>>>;

    fn send_command<'a>(&'a self, item: &'a str, command: String, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<u16>>;

    /// Tell an event-stream connection which Items it receives state updates for.
    fn send_event_items<'a>(&'a self, connection_id: &'a str, items: Vec<String>, headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<u16>>;
}
