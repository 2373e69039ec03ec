use std::collections::HashSet;

/// Identifiers of one resource kind an identity may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowSet {
    /// Admin: everything, including identifiers the backend has not listed yet.
    Unrestricted,
    Only(HashSet<String>),
}

impl AllowSet {
    pub fn empty() -> Self { AllowSet::Only(HashSet::new()) }

    pub fn contains(&self, id: &str) -> bool {
        match self {
            AllowSet::Unrestricted => true,
            AllowSet::Only(ids) => ids.contains(id),
        }
    }

    pub fn is_unrestricted(&self) -> bool { matches!(self, AllowSet::Unrestricted) }

    /// Number of identifiers, or None when unrestricted.
    pub fn len(&self) -> Option<usize> {
        match self {
            AllowSet::Unrestricted => None,
            AllowSet::Only(ids) => Some(ids.len()),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for AllowSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self { AllowSet::Only(iter.into_iter().map(Into::into).collect()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership() {
        let s: AllowSet = ["Lamp", "Heater"].into_iter().collect();
        assert!(s.contains("Lamp"));
        assert!(!s.contains("lamp"));
        assert_eq!(s.len(), Some(2));
        assert!(AllowSet::Unrestricted.contains("anything"));
        assert!(!AllowSet::empty().contains(""));
    }
}
