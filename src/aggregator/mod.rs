//! Merging of nodes from all sources into one admissible, uniquely named set.

pub mod filter;

use std::collections::HashSet;

use log::{debug, info};

use crate::cache::ExclusionCache;
use crate::models::Node;
use crate::utils::string::random_alphanumeric;

pub use filter::{
    CountryLookup, HostResolver, NodeFilter, SystemResolver, Verdict, DEFAULT_BANNED_KEYWORDS,
    DEFAULT_DISALLOWED_COUNTRY,
};

const UNNAMED_NODE: &str = "unnamed-node";

pub struct Aggregator<'a> {
    filter: &'a NodeFilter,
    exclusions: &'a ExclusionCache,
}

impl<'a> Aggregator<'a> {
    pub fn new(filter: &'a NodeFilter, exclusions: &'a ExclusionCache) -> Self {
        Self { filter, exclusions }
    }

    /// Whether a node named `name` at `server` is admissible.
    ///
    /// A rejection is recorded in the exclusion cache unless the name already
    /// has an active entry, so repeated checks keep the first timestamp.
    pub fn admit(&self, name: &str, server: &str) -> bool {
        let verdict = self.filter.check(name, server);
        if let Some(reason) = verdict.reason() {
            debug!("Rejecting `{}`: {:?}", name, verdict);
            if !self.exclusions.is_excluded(name) {
                self.exclusions.add_excluded(name, reason);
            }
            return false;
        }
        true
    }

    /// Deduplicate by identity (first occurrence wins), drop inadmissible
    /// nodes and give every survivor a unique name.
    pub fn aggregate(&self, nodes: Vec<Node>) -> Vec<Node> {
        let total = nodes.len();
        let mut identities = HashSet::new();
        let unique: Vec<Node> = nodes
            .into_iter()
            .filter(|node| identities.insert(node.identity()))
            .collect();
        let duplicates = total - unique.len();

        let mut names: HashSet<String> = HashSet::new();
        let mut accepted = Vec::with_capacity(unique.len());
        for mut node in unique {
            if node.name.trim().is_empty() {
                node.name = UNNAMED_NODE.to_string();
            }
            if !self.admit(&node.name, &node.server) {
                continue;
            }
            if names.contains(&node.name) {
                node.name = unique_name(&node.name, &names);
            }
            names.insert(node.name.clone());
            accepted.push(node);
        }

        info!(
            "Aggregated {} nodes ({} duplicates, {} rejected)",
            accepted.len(),
            duplicates,
            total - duplicates - accepted.len()
        );
        accepted
    }
}

/// `name-XXXX` with a random alphanumeric suffix not present in `taken`.
fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    loop {
        let candidate = format!("{}-{}", name, random_alphanumeric(4));
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}
