use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::ttl_cache::{CacheStats, TtlCache};
use crate::acl::AllowSet;
use crate::config::GatewayConfig;
use crate::model::ResourceKind;

/// The two caches kept for one resource kind.
#[derive(Clone)]
pub struct Partition {
    /// Raw backend listings keyed by query string.
    pub listings: TtlCache<Value>,
    /// Per-user allow-sets keyed by user name.
    pub allow_sets: TtlCache<AllowSet>,
}

impl Partition {
    fn new(listing_name: &'static str, allow_name: &'static str, listing_ttl: Duration, allow_ttl: Duration) -> Self {
        Self { listings: TtlCache::new(listing_name, listing_ttl), allow_sets: TtlCache::new(allow_name, allow_ttl) }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PartitionStats {
    pub listings: CacheStats,
    pub allow_sets: CacheStats,
}

/// Every cache the gateway owns, one partition per resource kind.
#[derive(Clone)]
pub struct CachePools {
    items: Partition,
    pages: Partition,
    sitemaps: Partition,
}

impl CachePools {
    pub fn new(config: &GatewayConfig) -> Self {
        let (l, a) = (config.listing_ttl(), config.allow_set_ttl());
        Self {
            items: Partition::new("item_listings", "item_allow_sets", l, a),
            pages: Partition::new("page_listings", "page_allow_sets", l, a),
            sitemaps: Partition::new("sitemap_listings", "sitemap_allow_sets", l, a),
        }
    }

    pub fn partition(&self, kind: ResourceKind) -> &Partition {
        match kind {
            ResourceKind::Item => &self.items,
            ResourceKind::Page => &self.pages,
            ResourceKind::Sitemap => &self.sitemaps,
        }
    }

    /// Drop stale entries from every cache. Returns the total removed.
    pub fn sweep_all(&self) -> usize {
        ResourceKind::ALL
            .iter()
            .map(|k| {
                let p = self.partition(*k);
                p.listings.sweep() + p.allow_sets.sweep()
            })
            .sum()
    }

    pub fn stats(&self, kind: ResourceKind) -> PartitionStats {
        let p = self.partition(kind);
        PartitionStats { listings: p.listings.stats(), allow_sets: p.allow_sets.stats() }
    }
}
