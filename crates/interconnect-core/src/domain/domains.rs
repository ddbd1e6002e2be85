//! `DomainList`: the ordered list of domains selected for an application package.

use serde::{Deserialize, Serialize};

/// An ordered sequence of domain strings.
///
/// Order is preserved exactly as the service returned it; no sorting or
/// de-duplication is applied on this side of the boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainList(Vec<String>);

impl DomainList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of domains in the list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the list holds no domains.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `domain` is in the list.
    pub fn contains(&self, domain: &str) -> bool {
        self.0.iter().any(|d| d == domain)
    }

    /// Iterates over the domains in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Borrows the domains as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consumes the list and returns the underlying vector.
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for DomainList {
    fn from(domains: Vec<String>) -> Self {
        Self(domains)
    }
}

impl<S: Into<String>> FromIterator<S> for DomainList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for DomainList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DomainList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
