//! Rewrite exclusion matching.
//!
//! # Responsibilities
//! - Decide whether a (decoded) request URL bypasses rewriting
//! - Prefix list: case-insensitive, empty entries never match
//! - Predicate: arbitrary user function over the decoded URL
//!
//! # Design Decisions
//! - Exactly one mechanism per proxy, chosen when the config is resolved
//! - Prefixes are upper-cased once at resolve time, never per request

use std::fmt;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

/// User predicate deciding whether a URL is excluded from rewriting.
pub type ExcludePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// The single exclusion mechanism configured for a proxy.
#[derive(Clone)]
pub enum ExclusionRule {
    /// Upper-cased route prefixes.
    Prefixes(Vec<String>),
    /// User predicate over the decoded URL.
    Predicate(ExcludePredicate),
}

impl ExclusionRule {
    /// Build a prefix rule, normalizing entries for case-insensitive matching.
    pub fn prefixes<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Prefixes(
            routes
                .into_iter()
                .map(|r| r.as_ref().to_uppercase())
                .filter(|r| !r.is_empty())
                .collect(),
        )
    }

    /// Returns true if the already-decoded URL is excluded.
    pub fn matches(&self, decoded_url: &str) -> bool {
        match self {
            ExclusionRule::Prefixes(prefixes) => {
                let candidate = decoded_url.to_uppercase();
                prefixes
                    .iter()
                    .any(|prefix| !prefix.is_empty() && candidate.starts_with(prefix.as_str()))
            }
            ExclusionRule::Predicate(predicate) => predicate(decoded_url),
        }
    }
}

impl fmt::Debug for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionRule::Prefixes(prefixes) => f.debug_tuple("Prefixes").field(prefixes).finish(),
            ExclusionRule::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// Percent-decode a URL once. Invalid UTF-8 sequences are replaced rather than rejected.
pub fn decode_url(url: &str) -> String {
    percent_decode_str(url).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_match_is_case_insensitive() {
        let rule = ExclusionRule::prefixes(["/sitecore/api"]);
        assert!(rule.matches("/SiteCore/api/x"));
        assert!(rule.matches("/sitecore/api/layout/render/jss"));
        assert!(!rule.matches("/about/sitecore/api"));
    }

    #[test]
    fn test_empty_prefix_never_matches() {
        let rule = ExclusionRule::Prefixes(vec![String::new()]);
        assert!(!rule.matches("/anything"));

        let rule = ExclusionRule::prefixes(["", "/-/media"]);
        assert!(rule.matches("/-/media/cat.gif"));
        assert!(!rule.matches("/home"));
    }

    #[test]
    fn test_predicate_rule() {
        let rule = ExclusionRule::Predicate(Arc::new(|url: &str| url.ends_with(".css")));
        assert!(rule.matches("/assets/site.css"));
        assert!(!rule.matches("/home"));
    }

    #[test]
    fn test_decode_url() {
        assert_eq!(decode_url("/sitecore%20modules/x"), "/sitecore modules/x");
        assert_eq!(decode_url("/plain"), "/plain");
        // Malformed sequences are kept, never rejected.
        assert_eq!(decode_url("/bad%zz"), "/bad%zz");
    }
}
