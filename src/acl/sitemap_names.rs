//! Sitemap ownership is encoded in the sitemap name: `[prefix]<org><separator><rest>`.

use crate::config::GatewayConfig;
use crate::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapName<'a> {
    /// Name with the UI prefix removed.
    pub decoded: &'a str,
    /// Owning organization: text before the first separator, or the whole decoded name.
    pub org: &'a str,
}

pub fn decode<'a>(name: &'a str, prefix: &str, separator: &str) -> SitemapName<'a> {
    let decoded = if prefix.is_empty() { name } else { name.strip_prefix(prefix).unwrap_or(name) };
    let org = if separator.is_empty() {
        decoded
    } else {
        decoded.split_once(separator).map(|(org, _)| org).unwrap_or(decoded)
    };
    SitemapName { decoded, org }
}

/// Name rule only; the admin bypass and the kill-switch are applied by the evaluator.
pub fn sitemap_allowed(identity: &Identity, name: &str, config: &GatewayConfig) -> bool {
    let n = decode(name, &config.sitemap_prefix, &config.org_separator);
    name == identity.user || n.decoded == identity.user || identity.is_member(n.org) || n.org == config.everyone_org
}
