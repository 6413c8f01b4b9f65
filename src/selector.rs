//! Tracked selectors: the tag names and marker attributes a render watches.

use std::collections::BTreeSet;

/// Attributes that explicitly mark an element for server rendering.
pub const SSR_ELEMENT_ATTRIBUTE_NAMES: [&str; 4] = ["ssr", "server", "ssg", "static"];

/// Returns the first SSR marker attribute present in `attributes`.
pub fn ssr_marker<'a, I>(attributes: I) -> Option<&'static str>
where
    I: IntoIterator<Item = &'a (String, String)>,
{
    attributes.into_iter().find_map(|(name, _)| {
        SSR_ELEMENT_ATTRIBUTE_NAMES
            .iter()
            .find(|marker| **marker == name.as_str())
            .copied()
    })
}

/// Tag names and marker attributes that select elements for tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedSelectors {
    names: BTreeSet<String>,
}

impl TrackedSelectors {
    /// Tracks the given tag names plus every SSR marker attribute.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Tracked tag names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns `true` if an element with this name and attributes is tracked.
    pub fn matches(&self, tag_name: &str, attributes: &[(String, String)]) -> bool {
        self.names.contains(tag_name) || ssr_marker(attributes).is_some()
    }

    /// CSS-like rendering, e.g. `x-card, [ssr], [server], [ssg], [static]`.
    pub fn to_selector_list(&self) -> Vec<String> {
        self.names
            .iter()
            .cloned()
            .chain(
                SSR_ELEMENT_ATTRIBUTE_NAMES
                    .iter()
                    .map(|attribute| format!("[{attribute}]")),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_matches_names_and_markers() {
        let selectors = TrackedSelectors::new(["x-card"]);
        assert!(selectors.matches("x-card", &[]));
        assert!(selectors.matches("div", &attrs(&[("ssg", "")])));
        assert!(!selectors.matches("div", &attrs(&[("class", "ssr")])));
    }

    #[test]
    fn test_ssr_marker() {
        assert_eq!(ssr_marker(&attrs(&[("id", "a"), ("static", "")])), Some("static"));
        assert_eq!(ssr_marker(&attrs(&[("id", "a")])), None);
    }

    #[test]
    fn test_selector_list() {
        let selectors = TrackedSelectors::new(["b-b", "a-a"]);
        assert_eq!(
            selectors.to_selector_list(),
            vec!["a-a", "b-b", "[ssr]", "[server]", "[ssg]", "[static]"]
        );
    }
}
