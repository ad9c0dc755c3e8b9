//! Candidate name filtering and de-duplication.

use crate::core::{is_subdomain_of, is_valid_hostname, normalize_name};

use std::collections::HashSet;

/// Ordered, de-duplicated set of candidate subdomains for one domain.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    domain: String,
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl CandidateSet {
    /// Creates an empty set for `domain` (already normalized).
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            seen: HashSet::new(),
            ordered: Vec::new(),
        }
    }

    /// Adds every acceptable name from `names` and returns the newly added
    /// ones in first-seen order.
    ///
    /// A name is accepted when, after normalization, it is a proper
    /// subdomain of the domain, contains no wildcard and is a valid
    /// hostname. Source output such as crt.sh may pack several names into
    /// one entry separated by newlines; those are split here.
    pub fn extend<I, S>(&mut self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = Vec::new();
        for raw in names {
            for line in raw.as_ref().lines() {
                let name = normalize_name(line);
                if !self.accepts(&name) || self.seen.contains(&name) {
                    continue;
                }
                self.seen.insert(name.clone());
                self.ordered.push(name.clone());
                added.push(name);
            }
        }
        added
    }

    fn accepts(&self, name: &str) -> bool {
        !name.contains('*') && is_subdomain_of(name, &self.domain) && is_valid_hostname(name)
    }

    /// Number of accepted candidates.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns `true` if nothing was accepted.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// The accepted candidates in first-seen order.
    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }

    /// Consumes the set, returning the ordered candidates.
    pub fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}
