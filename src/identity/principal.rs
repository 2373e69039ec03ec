use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Caller identity as injected by the upstream identity proxy.
///
/// Organization memberships are always held as a set; the delimited header form
/// never travels past this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    #[serde(default)]
    pub orgs: BTreeSet<String>,
}

impl Identity {
    pub fn new<I, S>(user: impl Into<String>, orgs: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let user = user.into();
        if user.is_empty() {
            return Err(AppError::identity("missing_user", "user name must not be empty"));
        }
        let orgs = orgs.into_iter().map(Into::into).filter(|o: &String| !o.is_empty()).collect();
        Ok(Self { user, orgs })
    }

    /// Build from raw header values. Spaces and hyphens are folded to underscores
    /// (the identity proxy and openHAB tags disagree on those), and the org value
    /// is split on `delimiter`. Absent or empty org input yields no memberships.
    pub fn from_header_values(user: Option<&str>, orgs: Option<&str>, delimiter: &str) -> AppResult<Self> {
        let user = user.map(normalize).unwrap_or_default();
        if user.is_empty() {
            return Err(AppError::identity("missing_user", "X-OPENHAB-USER header is required"));
        }
        let orgs = match orgs.map(normalize) {
            Some(raw) if !raw.is_empty() => split_orgs(&raw, delimiter),
            _ => BTreeSet::new(),
        };
        Ok(Self { user, orgs })
    }

    pub fn is_member(&self, org: &str) -> bool { self.orgs.contains(org) }

    pub fn is_admin(&self, admin_org: &str) -> bool { self.is_member(admin_org) }
}

fn normalize(raw: &str) -> String {
    raw.trim().replace([' ', '-'], "_")
}

fn split_orgs(raw: &str, delimiter: &str) -> BTreeSet<String> {
    if delimiter.is_empty() {
        return std::iter::once(raw.to_string()).collect();
    }
    raw.split(delimiter).filter(|s| !s.is_empty()).map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_values_are_normalized_and_split() {
        let id = Identity::from_header_values(Some("jane doe"), Some("home-owners.everyone"), ".").unwrap();
        assert_eq!(id.user, "jane_doe");
        assert!(id.is_member("home_owners"));
        assert!(id.is_member("everyone"));
        assert_eq!(id.orgs.len(), 2);
    }

    #[test]
    fn missing_or_empty_orgs_yield_empty_set() {
        let id = Identity::from_header_values(Some("bob"), None, ".").unwrap();
        assert!(id.orgs.is_empty());
        let id = Identity::from_header_values(Some("bob"), Some(""), ".").unwrap();
        assert!(id.orgs.is_empty());
        let id = Identity::from_header_values(Some("bob"), Some(".."), ".").unwrap();
        assert!(id.orgs.is_empty());
    }

    #[test]
    fn missing_user_is_rejected_not_anonymous() {
        let err = Identity::from_header_values(None, Some("admin"), ".").unwrap_err();
        assert_eq!(err.http_status(), 400);
        assert!(Identity::from_header_values(Some("  "), None, ".").is_err());
        assert!(Identity::new("", ["admin"]).is_err());
    }

    #[test]
    fn admin_membership_is_exact() {
        let id = Identity::new("root", ["Admin"]).unwrap();
        assert!(!id.is_admin("admin"));
        assert!(id.is_admin("Admin"));
    }
}
