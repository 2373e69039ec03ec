//! Gateway tunables.
//!
//! Built once at process start (usually from the environment) and handed to the
//! evaluator, filters and caches by reference. Nothing below reads the
//! environment on its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Members of this organization bypass every ACL check.
    pub admin_org: String,
    /// Organization name meaning "all identities".
    pub everyone_org: String,
    /// Prefix marking an ACL tag on Items and Pages, e.g. `acl:`.
    pub acl_prefix: String,
    /// Separates the owning organization from the rest of a sitemap name.
    pub org_separator: String,
    /// Literal prefix carried by sitemaps authored in the UI editor; stripped before decoding.
    pub sitemap_prefix: String,
    /// Delimiter used by the identity proxy to join organization names.
    pub org_delimiter: String,
    /// TTL of raw backend listings.
    pub listing_ttl_ms: u64,
    /// TTL of per-user allow-sets.
    pub allow_set_ttl_ms: u64,
    /// Deny every sitemap to non-admins (deployments that only use MainUI).
    pub sitemaps_disabled: bool,
    /// Drop separators of empty sections from the filtered home page.
    pub home_separator_collapse: bool,
    /// Interval of the background sweep of expired cache entries; 0 disables it.
    pub sweep_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            admin_org: "admin".to_string(),
            everyone_org: "everyone".to_string(),
            acl_prefix: "acl:".to_string(),
            org_separator: "_org_".to_string(),
            sitemap_prefix: "uicomponents_".to_string(),
            org_delimiter: ".".to_string(),
            listing_ttl_ms: 300_000,
            allow_set_ttl_ms: 3_600_000,
            sitemaps_disabled: true,
            home_separator_collapse: true,
            sweep_interval_ms: 0,
        }
    }
}

impl GatewayConfig {
    /// Read tunables from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` but against an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let string = |name: &str, default: String| lookup(name).filter(|v| !v.is_empty()).unwrap_or(default);
        let millis = |name: &str, default: u64| lookup(name).and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(default);
        let flag = |name: &str, default: bool| lookup(name).and_then(|v| parse_bool(&v)).unwrap_or(default);
        Self {
            admin_org: string("ADMIN_OU", d.admin_org),
            everyone_org: string("EVERYONE_OU", d.everyone_org),
            acl_prefix: string("ACL_PREFIX", d.acl_prefix),
            org_separator: string("ORG_SEPARATOR", d.org_separator),
            sitemap_prefix: lookup("SITEMAP_PREFIX").unwrap_or(d.sitemap_prefix),
            org_delimiter: string("ORG_DELIMITER", d.org_delimiter),
            listing_ttl_ms: millis("CACHE_TIME", d.listing_ttl_ms),
            allow_set_ttl_ms: millis("CACHE_TIME_ACL", d.allow_set_ttl_ms),
            sitemaps_disabled: flag("SITEMAPS_DISABLE", d.sitemaps_disabled),
            home_separator_collapse: flag("HOME_SEPARATOR", d.home_separator_collapse),
            sweep_interval_ms: millis("CACHE_SWEEP_MS", d.sweep_interval_ms),
        }
    }

    pub fn listing_ttl(&self) -> Duration { Duration::from_millis(self.listing_ttl_ms) }
    pub fn allow_set_ttl(&self) -> Duration { Duration::from_millis(self.allow_set_ttl_ms) }
}

pub fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let c = GatewayConfig::default();
        assert_eq!(c.admin_org, "admin");
        assert_eq!(c.everyone_org, "everyone");
        assert_eq!(c.acl_prefix, "acl:");
        assert_eq!(c.org_separator, "_org_");
        assert_eq!(c.listing_ttl(), Duration::from_secs(300));
        assert_eq!(c.allow_set_ttl(), Duration::from_secs(3600));
        assert!(c.allow_set_ttl() > c.listing_ttl());
        assert!(c.sitemaps_disabled);
        assert!(c.home_separator_collapse);
    }

    #[test]
    fn lookup_overrides_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = [
            ("ADMIN_OU", "root"),
            ("CACHE_TIME", "1000"),
            ("CACHE_TIME_ACL", "not-a-number"),
            ("SITEMAPS_DISABLE", "off"),
            ("HOME_SEPARATOR", "maybe"),
            ("EVERYONE_OU", ""),
            ("SITEMAP_PREFIX", ""),
        ]
        .into_iter()
        .collect();
        let c = GatewayConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c.admin_org, "root");
        assert_eq!(c.listing_ttl_ms, 1000);
        assert_eq!(c.allow_set_ttl_ms, 3_600_000);
        assert!(!c.sitemaps_disabled);
        assert!(c.home_separator_collapse);
        assert_eq!(c.everyone_org, "everyone");
        // An explicitly empty prefix disables prefix stripping.
        assert_eq!(c.sitemap_prefix, "");
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("2"), None);
    }
}
