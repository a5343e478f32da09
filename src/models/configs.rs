//! The Clash configuration document: passthrough template fields, the node
//! list and the proxy groups that reference nodes by name.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::proxy::Node;
use super::proxy_group_config::ProxyGroup;

/// Policies understood by the engine that are never declared as nodes.
pub const BUILTIN_POLICIES: &[&str] = &["DIRECT", "REJECT", "REJECT-DROP", "PASS", "COMPATIBLE"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClashConfig {
    /// Baseline fields (ports, dns, rules, ...), kept in their original order.
    #[serde(flatten)]
    pub template: serde_yaml::Mapping,
    #[serde(default)]
    pub proxies: Vec<Node>,
    #[serde(default)]
    pub proxy_groups: Vec<ProxyGroup>,
}

impl ClashConfig {
    pub fn node_names(&self) -> HashSet<&str> {
        self.proxies.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.proxy_groups.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn group(&self, name: &str) -> Option<&ProxyGroup> {
        self.proxy_groups.iter().find(|g| g.name == name)
    }

    /// Member names of a group, empty if the group does not exist.
    pub fn group_proxies(&self, name: &str) -> Vec<String> {
        self.group(name).map(|g| g.proxies.clone()).unwrap_or_default()
    }

    pub fn set_group_proxies(&mut self, name: &str, proxies: Vec<String>) {
        if let Some(group) = self.proxy_groups.iter_mut().find(|g| g.name == name) {
            group.proxies = proxies;
            group.dedup_proxies();
        }
    }

    /// Installs `nodes` as the node list and lists their names in every group
    /// after the entry selector.
    pub fn assign_nodes(&mut self, nodes: Vec<Node>) {
        let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
        self.proxies = nodes;
        for group in self.proxy_groups.iter_mut().skip(1) {
            group.proxies = names.clone();
            group.dedup_proxies();
        }
    }

    /// Removes every node whose name is not in `keep`, together with all group
    /// references to it. Returns the number of removed nodes.
    pub fn retain_nodes(&mut self, keep: &HashSet<String>) -> usize {
        let removed: HashSet<String> = self
            .proxies
            .iter()
            .filter(|p| !keep.contains(&p.name))
            .map(|p| p.name.clone())
            .collect();
        if removed.is_empty() {
            return 0;
        }
        self.proxies.retain(|p| keep.contains(&p.name));
        for group in &mut self.proxy_groups {
            group.proxies.retain(|name| !removed.contains(name));
        }
        removed.len()
    }

    /// Applies `mapping` (old name -> new name) to the node list and to every
    /// group's member list.
    pub fn rename_nodes(&mut self, mapping: &HashMap<String, String>) {
        for proxy in &mut self.proxies {
            if let Some(new_name) = mapping.get(&proxy.name) {
                proxy.name = new_name.clone();
            }
        }
        for group in &mut self.proxy_groups {
            for name in &mut group.proxies {
                if let Some(new_name) = mapping.get(name) {
                    *name = new_name.clone();
                }
            }
            group.dedup_proxies();
        }
    }

    /// Group references that name neither a node, a group nor a built-in policy.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        let nodes = self.node_names();
        let groups: HashSet<&str> = self.group_names().into_iter().collect();
        let mut dangling = Vec::new();
        for group in &self.proxy_groups {
            for name in &group.proxies {
                let name = name.as_str();
                if !nodes.contains(name) && !groups.contains(name) && !BUILTIN_POLICIES.contains(&name) {
                    dangling.push((group.name.clone(), name.to_string()));
                }
            }
        }
        dangling
    }
}
