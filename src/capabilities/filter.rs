//! Operator-controlled tool allow-list.

use std::collections::BTreeSet;

/// The set of capability names an operator enabled.
///
/// An empty set means every capability is enabled. Once any name is
/// listed, only listed names pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnabledTools {
    names: BTreeSet<String>,
}

impl EnabledTools {
    /// Everything enabled.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the given names. Blank entries are dropped, so a list of blanks
    /// behaves like [`all`](Self::all).
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.contains(name)
    }

    pub fn is_open(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_allows_everything() {
        let enabled = EnabledTools::all();
        assert!(enabled.is_open());
        assert!(enabled.allows("search_posts"));
        assert!(enabled.allows("anything"));
    }

    #[test]
    fn test_listed_names_only() {
        let enabled = EnabledTools::only(["search_posts", " create_post "]);
        assert!(enabled.allows("search_posts"));
        assert!(enabled.allows("create_post"));
        assert!(!enabled.allows("create_user"));
        assert_eq!(enabled.names().count(), 2);
    }

    #[test]
    fn test_blank_entries_are_dropped() {
        let enabled = EnabledTools::only(["", "  "]);
        assert!(enabled.is_open());
    }
}
