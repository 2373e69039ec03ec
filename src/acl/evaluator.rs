use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use super::allow_set::AllowSet;
use super::sitemap_names::sitemap_allowed;
use super::tags::allow_set_from_listing;
use crate::backend::ResourceBackend;
use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{ForwardedHeaders, Identity};
use crate::model::ResourceKind;
use crate::storage::{CachePools, TtlCache};

/// Query used to fetch the listing an allow-set is computed from.
fn acl_listing_query(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Item => "recursive=false&fields=name%2C%20tags",
        ResourceKind::Page => "summary=true",
        ResourceKind::Sitemap => "",
    }
}

/// Decides what an identity may see, per resource kind.
///
/// Raw listings and allow-sets are cached in `CachePools`; allow-sets are keyed
/// by user name only, so a change of organization membership is picked up once
/// the user's entry expires.
#[derive(Clone)]
pub struct AclEvaluator {
    config: Arc<GatewayConfig>,
    backend: Arc<dyn ResourceBackend>,
    pools: CachePools,
}

impl AclEvaluator {
    pub fn new(config: Arc<GatewayConfig>, backend: Arc<dyn ResourceBackend>) -> Self {
        let pools = CachePools::new(&config);
        Self { config, backend, pools }
    }

    pub fn config(&self) -> &GatewayConfig { &self.config }
    pub fn backend(&self) -> &Arc<dyn ResourceBackend> { &self.backend }
    pub fn pools(&self) -> &CachePools { &self.pools }

    /// Raw backend listing of `kind` for `query`, through the listing cache.
    pub async fn listing(&self, kind: ResourceKind, query: &str, headers: &ForwardedHeaders) -> AppResult<Arc<Value>> {
        fetch_listing(self.pools.partition(kind).listings.clone(), self.backend.clone(), kind, query.to_string(), headers.clone()).await
    }

    /// Everything `identity` may see of `kind`. Never fails: an upstream error
    /// yields an empty set, which is not cached.
    pub async fn allow_set_for(&self, identity: &Identity, kind: ResourceKind, headers: &ForwardedHeaders) -> Arc<AllowSet> {
        if identity.is_admin(&self.config.admin_org) {
            return Arc::new(AllowSet::Unrestricted);
        }
        if kind == ResourceKind::Sitemap && self.config.sitemaps_disabled {
            return Arc::new(AllowSet::empty());
        }
        let partition = self.pools.partition(kind);
        let listings = partition.listings.clone();
        let backend = self.backend.clone();
        let config = self.config.clone();
        let who = identity.clone();
        let headers = headers.clone();
        let res = partition
            .allow_sets
            .get_or_try_insert_with(&identity.user, None, move || async move {
                let listing = fetch_listing(listings, backend, kind, acl_listing_query(kind).to_string(), headers).await?;
                compute_allow_set(&listing, kind, &who, &config)
            })
            .await;
        match res {
            Ok(set) => {
                debug!(target: "habgate::acl", user = %identity.user, kind = %kind, size = ?set.len(), "allow-set resolved");
                set
            }
            Err(e) => {
                error!(target: "habgate::acl", user = %identity.user, orgs = ?identity.orgs, kind = %kind, error = %e,
                    "allow-set computation failed; denying");
                Arc::new(AllowSet::empty())
            }
        }
    }

    /// Single-resource decision. Sitemaps are decided from the name alone and
    /// never touch the backend.
    pub async fn is_allowed(&self, identity: &Identity, kind: ResourceKind, resource: &str, headers: &ForwardedHeaders) -> bool {
        let (allowed, reason) = if identity.is_admin(&self.config.admin_org) {
            (true, "admin")
        } else {
            match kind {
                ResourceKind::Sitemap if self.config.sitemaps_disabled => (false, "sitemaps_disabled"),
                ResourceKind::Sitemap => (sitemap_allowed(identity, resource, &self.config), "name"),
                ResourceKind::Item | ResourceKind::Page => {
                    (self.allow_set_for(identity, kind, headers).await.contains(resource), "tags")
                }
            }
        };
        info!(target: "habgate::acl", user = %identity.user, orgs = ?identity.orgs, kind = %kind, resource, allowed, reason,
            "authorization decision");
        allowed
    }
}

async fn fetch_listing(
    cache: TtlCache<Value>,
    backend: Arc<dyn ResourceBackend>,
    kind: ResourceKind,
    query: String,
    headers: ForwardedHeaders,
) -> AppResult<Arc<Value>> {
    let key = query.clone();
    cache
        .get_or_try_insert_with(&key, None, move || async move { backend.list_resources(kind, &query, &headers).await })
        .await
}

fn compute_allow_set(listing: &Value, kind: ResourceKind, identity: &Identity, config: &GatewayConfig) -> AppResult<AllowSet> {
    match kind {
        ResourceKind::Item | ResourceKind::Page => {
            allow_set_from_listing(listing, kind, identity, &config.acl_prefix, &config.everyone_org)
        }
        ResourceKind::Sitemap => {
            let entries = listing
                .as_array()
                .ok_or_else(|| AppError::internal("unexpected_sitemap_listing", "backend listing is not an array"))?;
            Ok(entries
                .iter()
                .filter_map(|e| e.get("name").and_then(Value::as_str))
                .filter(|n| sitemap_allowed(identity, n, config))
                .collect())
        }
    }
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod evaluator_tests;
