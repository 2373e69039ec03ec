//! Authorization gateway: the single entry point the routing layer talks to.
//!
//! Decisions come from the `AclEvaluator`; payloads fetched from the backend are
//! pruned by the `filter` functions. A request resolves its allow-set once and
//! runs one filter pass over the payload.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::acl::{AclEvaluator, AllowSet};
use crate::backend::ResourceBackend;
use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};
use crate::filter;
use crate::identity::{Identity, RequestContext};
use crate::model::{BackendReply, ItemNode, ItemQuery, ResourceKind, Sitemap};

const HOME_PAGE: &str = "home";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn from_bool(allowed: bool) -> Self { if allowed { Decision::Allow } else { Decision::Deny } }
    pub fn is_allow(&self) -> bool { matches!(self, Decision::Allow) }
    pub fn http_status(&self) -> u16 { if self.is_allow() { 200 } else { 403 } }
}

/// Outcome of a guarded single-resource operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    Denied,
    Allowed(T),
}

/// A backend payload in typed form, ready for filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Items(Vec<ItemNode>),
    /// A single, already authorized Item; only its group members are filtered.
    Item(ItemNode),
    Pages(Vec<Value>),
    /// A single, already authorized Page; the home page has its cards filtered.
    Page(Value),
    Sitemaps(Vec<Value>),
    /// A single, already authorized Sitemap; widgets are filtered by Item.
    Sitemap(Sitemap),
    /// Item names an event-stream connection subscribes to.
    EventItems(Vec<String>),
}

impl Payload {
    /// Kind whose allow-set prunes this payload.
    pub fn allow_kind(&self) -> ResourceKind {
        match self {
            Payload::Pages(_) => ResourceKind::Page,
            Payload::Sitemaps(_) => ResourceKind::Sitemap,
            Payload::Items(_) | Payload::Item(_) | Payload::Page(_) | Payload::Sitemap(_) | Payload::EventItems(_) => {
                ResourceKind::Item
            }
        }
    }

    pub fn into_value(self) -> AppResult<Value> {
        let v = match self {
            Payload::Items(items) => serde_json::to_value(items),
            Payload::Item(item) => serde_json::to_value(item),
            Payload::Pages(pages) | Payload::Sitemaps(pages) => Ok(Value::Array(pages)),
            Payload::Page(page) => Ok(page),
            Payload::Sitemap(sitemap) => serde_json::to_value(sitemap),
            Payload::EventItems(names) => serde_json::to_value(names),
        };
        v.map_err(|e| AppError::internal("encode_payload".to_string(), e.to_string()))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(kind: ResourceKind, value: &Value) -> AppResult<T> {
    T::deserialize(value).map_err(|e| AppError::internal(format!("invalid_{}_payload", kind), e.to_string()))
}

fn listing_entries(kind: ResourceKind, value: &Value) -> AppResult<Vec<Value>> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| AppError::internal(format!("invalid_{}_payload", kind), "expected a JSON array".to_string()))
}

#[derive(Clone)]
pub struct AuthorizationGateway {
    evaluator: AclEvaluator,
}

impl AuthorizationGateway {
    pub fn new(config: Arc<GatewayConfig>, backend: Arc<dyn ResourceBackend>) -> Self {
        Self { evaluator: AclEvaluator::new(config, backend) }
    }

    pub fn evaluator(&self) -> &AclEvaluator { &self.evaluator }
    pub fn config(&self) -> &GatewayConfig { self.evaluator.config() }
    fn backend(&self) -> &Arc<dyn ResourceBackend> { self.evaluator.backend() }

    pub async fn authorize(&self, ctx: &RequestContext, kind: ResourceKind, resource: &str) -> Decision {
        Decision::from_bool(self.evaluator.is_allowed(&ctx.identity, kind, resource, &ctx.forwarded).await)
    }

    pub fn authorize_admin(&self, identity: &Identity) -> Decision {
        let allowed = identity.is_admin(&self.config().admin_org);
        info!(target: "habgate::acl", user = %identity.user, orgs = ?identity.orgs, allowed, "admin check");
        Decision::from_bool(allowed)
    }

    /// Prune `payload` to what the caller may see. The allow-set is resolved
    /// once; the input is left untouched.
    pub async fn filter_collection(&self, ctx: &RequestContext, payload: &Payload) -> AppResult<Payload> {
        let kind = payload.allow_kind();
        let allow = self.evaluator.allow_set_for(&ctx.identity, kind, &ctx.forwarded).await;
        debug!(target: "habgate::gateway", user = %ctx.identity.user, kind = %kind, "filtering payload");
        self.apply(payload, &allow)
    }

    fn apply(&self, payload: &Payload, allow: &AllowSet) -> AppResult<Payload> {
        let out = match payload {
            Payload::Items(items) => Payload::Items(filter::filter_items(items, allow)),
            Payload::Item(item) => Payload::Item(filter::filter_members(item, allow)),
            Payload::Pages(pages) => Payload::Pages(filter::filter_listing(pages, ResourceKind::Page.id_field(), allow)),
            Payload::Page(page) if page.get("uid").and_then(Value::as_str) == Some(HOME_PAGE) => {
                Payload::Page(filter::filter_home_page(page, allow, self.config().home_separator_collapse)?)
            }
            Payload::Page(page) => Payload::Page(page.clone()),
            Payload::Sitemaps(maps) => {
                Payload::Sitemaps(filter::filter_listing(maps, ResourceKind::Sitemap.id_field(), allow))
            }
            Payload::Sitemap(sitemap) => Payload::Sitemap(filter::filter_sitemap(sitemap, allow)),
            Payload::EventItems(names) => Payload::EventItems(names.iter().filter(|n| allow.contains(n)).cloned().collect()),
        };
        Ok(out)
    }

    // ----- Items -----

    /// Item collection, cached per query string, filtered for the caller.
    pub async fn items(&self, ctx: &RequestContext, query: &ItemQuery) -> AppResult<Value> {
        let raw = self.evaluator.listing(ResourceKind::Item, &query.listing_query(), &ctx.forwarded).await?;
        let payload = Payload::Items(parse(ResourceKind::Item, &raw)?);
        self.filter_collection(ctx, &payload).await?.into_value()
    }

    pub async fn item(&self, ctx: &RequestContext, name: &str, query: &ItemQuery) -> AppResult<Guarded<Value>> {
        if !self.authorize(ctx, ResourceKind::Item, name).await.is_allow() {
            return Ok(Guarded::Denied);
        }
        let raw = self.backend().get_resource(ResourceKind::Item, name, &query.detail_query(), &ctx.forwarded).await?;
        let payload = Payload::Item(parse(ResourceKind::Item, &raw)?);
        Ok(Guarded::Allowed(self.filter_collection(ctx, &payload).await?.into_value()?))
    }

    pub async fn item_state(&self, ctx: &RequestContext, name: &str) -> AppResult<Guarded<BackendReply<String>>> {
        if !self.authorize(ctx, ResourceKind::Item, name).await.is_allow() {
            return Ok(Guarded::Denied);
        }
        Ok(Guarded::Allowed(self.backend().get_item_state(name, &ctx.forwarded).await?))
    }

    pub async fn item_semantic(&self, ctx: &RequestContext, name: &str, semantic_class: &str) -> AppResult<Guarded<BackendReply<Value>>> {
        if !self.authorize(ctx, ResourceKind::Item, name).await.is_allow() {
            return Ok(Guarded::Denied);
        }
        Ok(Guarded::Allowed(self.backend().get_item_semantic(name, semantic_class, &ctx.forwarded).await?))
    }

    pub async fn send_command(&self, ctx: &RequestContext, name: &str, command: String) -> AppResult<Guarded<u16>> {
        if !self.authorize(ctx, ResourceKind::Item, name).await.is_allow() {
            return Ok(Guarded::Denied);
        }
        info!(target: "habgate::gateway", user = %ctx.identity.user, resource = name, command = %command, "forwarding command");
        Ok(Guarded::Allowed(self.backend().send_command(name, command, &ctx.forwarded).await?))
    }

    /// Forward an event-stream subscription with denied Items removed.
    pub async fn send_event_items(&self, ctx: &RequestContext, connection_id: &str, items: Vec<String>) -> AppResult<u16> {
        let names = match self.filter_collection(ctx, &Payload::EventItems(items)).await? {
            Payload::EventItems(names) => names,
            _ => Vec::new(),
        };
        self.backend().send_event_items(connection_id, names, &ctx.forwarded).await
    }

    // ----- Pages -----

    pub async fn pages(&self, ctx: &RequestContext) -> AppResult<Value> {
        let raw = self.evaluator.listing(ResourceKind::Page, "", &ctx.forwarded).await?;
        let pages = match self.filter_collection(ctx, &Payload::Pages(listing_entries(ResourceKind::Page, &raw)?)).await? {
            Payload::Pages(pages) => pages,
            _ => Vec::new(),
        };
        let Some(pos) = pages.iter().position(|p| p.get("uid").and_then(Value::as_str) == Some(HOME_PAGE)) else {
            return Ok(Value::Array(pages));
        };
        let mut pages = pages;
        let home = std::mem::take(&mut pages[pos]);
        pages[pos] = self.filter_collection(ctx, &Payload::Page(home)).await?.into_value()?;
        Ok(Value::Array(pages))
    }

    pub async fn page(&self, ctx: &RequestContext, uid: &str) -> AppResult<Guarded<Value>> {
        if !self.authorize(ctx, ResourceKind::Page, uid).await.is_allow() {
            return Ok(Guarded::Denied);
        }
        let raw = self.backend().get_resource(ResourceKind::Page, uid, "", &ctx.forwarded).await?;
        Ok(Guarded::Allowed(self.filter_collection(ctx, &Payload::Page(raw)).await?.into_value()?))
    }

    // ----- Sitemaps -----

    pub async fn sitemaps(&self, ctx: &RequestContext) -> AppResult<Value> {
        let raw = self.evaluator.listing(ResourceKind::Sitemap, "", &ctx.forwarded).await?;
        let payload = Payload::Sitemaps(listing_entries(ResourceKind::Sitemap, &raw)?);
        self.filter_collection(ctx, &payload).await?.into_value()
    }

    pub async fn sitemap(&self, ctx: &RequestContext, name: &str) -> AppResult<Guarded<Value>> {
        if !self.authorize(ctx, ResourceKind::Sitemap, name).await.is_allow() {
            return Ok(Guarded::Denied);
        }
        let raw = self.backend().get_resource(ResourceKind::Sitemap, name, "", &ctx.forwarded).await?;
        let payload = Payload::Sitemap(parse(ResourceKind::Sitemap, &raw)?);
        Ok(Guarded::Allowed(self.filter_collection(ctx, &payload).await?.into_value()?))
    }
}
