use super::store::Store;
use crate::errors::{Result, SpiceError};
use crate::git::GitRepository;
use std::collections::BTreeMap;

/// In-memory view of one tracked branch.
#[derive(Debug, Clone)]
pub struct BranchInfo {
    pub name: String,
    /// Name of the base branch.
    pub base: String,
    /// Base hash recorded at the last successful restack.
    pub base_hash: String,
    /// Current head commit of the branch.
    pub head: String,
}

/// In-memory projection of the tracked branch forest.
///
/// Rebuilt per command from the state store; child edges are derived from
/// the stored parent edges.
pub struct BranchGraph {
    trunk: String,
    branches: BTreeMap<String, BranchInfo>,
    children: BTreeMap<String, Vec<String>>,
}

impl BranchGraph {
    /// Build the graph from the store, resolving each branch's current head.
    pub fn load(store: &Store, repo: &GitRepository) -> Result<BranchGraph> {
        let mut branches = BTreeMap::new();
        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (name, record) in store.list_branches()? {
            let head = repo.peel_to_commit(&name).map_err(|_| {
                SpiceError::branch(format!(
                    "tracked branch '{name}' no longer exists; untrack it with 'gs branch untrack'"
                ))
            })?;

            children
                .entry(record.base.clone())
                .or_default()
                .push(name.clone());
            branches.insert(
                name.clone(),
                BranchInfo {
                    name,
                    base: record.base,
                    base_hash: record.base_hash,
                    head,
                },
            );
        }

        // BTreeMap iteration already yields children in insertion order by
        // name; keep the vectors sorted for a stable sibling tie-break.
        for siblings in children.values_mut() {
            siblings.sort();
        }

        Ok(BranchGraph {
            trunk: store.trunk().to_string(),
            branches,
            children,
        })
    }

    pub fn trunk(&self) -> &str {
        &self.trunk
    }

    pub fn lookup(&self, name: &str) -> Option<&BranchInfo> {
        self.branches.get(name)
    }

    pub fn is_trunk(&self, name: &str) -> bool {
        name == self.trunk
    }

    /// Direct dependents of a branch, sorted by name.
    pub fn children(&self, name: &str) -> &[String] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All transitive dependents of `name`, excluding `name` itself,
    /// in topological order (bases before dependents, siblings alphabetical).
    pub fn upstack(&self, name: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut queue: Vec<&str> = self.children(name).iter().map(String::as_str).collect();
        while let Some(current) = queue.pop() {
            result.push(current.to_string());
            for child in self.children(current) {
                queue.push(child);
            }
        }
        self.sort_topological(&mut result);
        result
    }

    /// Path from `name` down to the trunk, nearest base first.
    /// Excludes both `name` and the trunk.
    pub fn downstack(&self, name: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut current = name.to_string();
        while let Some(info) = self.branches.get(&current) {
            if info.base == self.trunk {
                break;
            }
            result.push(info.base.clone());
            current = info.base.clone();
        }
        result
    }

    /// Every tracked branch in topological order.
    pub fn all(&self) -> Vec<String> {
        self.upstack(self.trunk.as_str())
    }

    /// Sort branch names so that bases come before dependents,
    /// breaking ties alphabetically.
    fn sort_topological(&self, names: &mut Vec<String>) {
        let mut depths: BTreeMap<String, usize> = BTreeMap::new();
        for name in names.iter() {
            depths.insert(name.clone(), self.depth(name));
        }
        names.sort_by(|a, b| depths[a].cmp(&depths[b]).then_with(|| a.cmp(b)));
    }

    /// Distance from the trunk (trunk itself is 0).
    fn depth(&self, name: &str) -> usize {
        let mut depth = 0;
        let mut current = name;
        while let Some(info) = self.branches.get(current) {
            depth += 1;
            current = &info.base;
        }
        depth
    }
}
