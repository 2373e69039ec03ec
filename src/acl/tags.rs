//! ACL tags: `<prefix><subject>` strings attached to Items and Pages.

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::model::ResourceKind;

use super::AllowSet;

/// Pages MainUI cannot start without; visible to everyone.
pub const ALWAYS_ALLOWED_PAGES: [&str; 2] = ["home", "overview"];

/// Subject of `tag` if it carries `prefix`. Matching is exact and case-sensitive.
pub fn subject<'a>(tag: &'a str, prefix: &str) -> Option<&'a str> { tag.strip_prefix(prefix) }

/// True iff `subject` names the user, one of their organizations, or everyone.
pub fn subject_grants(subject: &str, identity: &Identity, everyone_org: &str) -> bool {
    subject == identity.user || identity.is_member(subject) || subject == everyone_org
}

pub fn tags_grant<'a, I>(tags: I, prefix: &str, identity: &Identity, everyone_org: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    tags.into_iter().filter_map(|t| subject(t, prefix)).any(|s| subject_grants(s, identity, everyone_org))
}

/// Allow-set from a raw backend listing of Items or Pages.
///
/// Entries without a string identifier are skipped. A listing that is not a
/// JSON array is an error so that the caller fails closed.
pub fn allow_set_from_listing(listing: &Value, kind: ResourceKind, identity: &Identity, prefix: &str, everyone_org: &str) -> AppResult<AllowSet> {
    let entries = listing
        .as_array()
        .ok_or_else(|| AppError::internal(format!("unexpected_{}_listing", kind), "backend listing is not an array".to_string()))?;
    let ids = entries.iter().filter_map(|entry| {
        let id = entry.get(kind.id_field())?.as_str()?;
        if kind == ResourceKind::Page && ALWAYS_ALLOWED_PAGES.contains(&id) {
            return Some(id);
        }
        let tags = entry.get("tags").and_then(Value::as_array)?;
        tags_grant(tags.iter().filter_map(Value::as_str), prefix, identity, everyone_org).then_some(id)
    });
    Ok(ids.collect())
}
