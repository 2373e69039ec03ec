//! Pure pruning of backend payloads against an allow-set.
//!
//! Every function takes the payload by reference and returns a fresh copy; a
//! node is either kept with its shape intact or removed.

pub mod home;
pub mod items;
pub mod sitemaps;

use serde_json::Value;

use crate::acl::AllowSet;

pub use home::{filter_cards, filter_home_page, CardSplit};
pub use items::{filter_item, filter_items, filter_members};
pub use sitemaps::{filter_page, filter_sitemap, filter_widgets};

/// Flat listing entries whose `id_field` is in `allow`. Entries without a
/// string identifier are dropped.
pub fn filter_listing(entries: &[Value], id_field: &str, allow: &AllowSet) -> Vec<Value> {
    if allow.is_unrestricted() {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|e| e.get(id_field).and_then(Value::as_str).is_some_and(|id| allow.contains(id)))
        .cloned()
        .collect()
}
