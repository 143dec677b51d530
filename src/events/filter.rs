//! Event filters.

use std::fmt;

use crate::protocol::event::split_method;

// ============================================================================
// EventFilter
// ============================================================================

/// Which events a subscription receives.
///
/// Parsed from a pattern string:
///
/// | Pattern | Filter |
/// |---------|--------|
/// | `"Network.requestWillBeSent"` | [`EventFilter::Method`] |
/// | `"Network.*"` | [`EventFilter::Domain`] |
/// | `"*"` | [`EventFilter::Any`] |
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventFilter {
    /// One fully qualified event name.
    Method(String),
    /// Every event of one domain.
    Domain(String),
    /// Every event on the session.
    Any,
}

impl EventFilter {
    /// Matches one fully qualified event name.
    #[inline]
    #[must_use]
    pub fn method(method: impl Into<String>) -> Self {
        Self::Method(method.into())
    }

    /// Matches every event of a domain.
    #[inline]
    #[must_use]
    pub fn domain(domain: impl Into<String>) -> Self {
        Self::Domain(domain.into())
    }

    /// Parses a pattern string.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        match pattern {
            "*" => Self::Any,
            _ => match pattern.strip_suffix(".*") {
                Some(domain) => Self::Domain(domain.to_string()),
                None => Self::Method(pattern.to_string()),
            },
        }
    }

    /// Returns `true` if an event named `method` passes the filter.
    #[must_use]
    pub fn matches(&self, method: &str) -> bool {
        match self {
            Self::Method(expected) => expected == method,
            Self::Domain(domain) => split_method(method).0 == domain,
            Self::Any => true,
        }
    }
}

impl From<&str> for EventFilter {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

impl From<String> for EventFilter {
    fn from(pattern: String) -> Self {
        Self::parse(&pattern)
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(method) => f.write_str(method),
            Self::Domain(domain) => write!(f, "{domain}.*"),
            Self::Any => f.write_str("*"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
