use super::graph::BranchGraph;
use crate::errors::{Result, SpiceError};

/// Which branches participate in a multi-branch restack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Just the starting branch.
    Branch,
    /// The starting branch and everything above it.
    Upstack,
    /// Everything above the starting branch, excluding it.
    UpstackExclusive,
    /// The whole stack the starting branch belongs to.
    Stack,
    /// Every tracked branch.
    All,
}

/// Produce the ordered list of branches to restack for a scope.
///
/// Bases always come before dependents; siblings are ordered alphabetically.
/// Starting the upstack or stack scopes at the trunk selects every tracked
/// branch.
pub fn plan(graph: &BranchGraph, start: &str, scope: Scope) -> Result<Vec<String>> {
    if graph.is_trunk(start) {
        return match scope {
            Scope::Branch => Err(SpiceError::branch(format!(
                "trunk branch '{start}' cannot be restacked"
            ))),
            _ => Ok(graph.all()),
        };
    }

    if graph.lookup(start).is_none() {
        return Err(SpiceError::NotTracked(start.to_string()));
    }

    let branches = match scope {
        Scope::Branch => vec![start.to_string()],
        Scope::Upstack => {
            let mut branches = vec![start.to_string()];
            branches.extend(graph.upstack(start));
            branches
        }
        Scope::UpstackExclusive => graph.upstack(start),
        Scope::Stack => {
            let mut branches: Vec<String> = graph.downstack(start).into_iter().rev().collect();
            branches.push(start.to_string());
            branches.extend(graph.upstack(start));
            branches
        }
        Scope::All => graph.all(),
    };

    Ok(branches)
}
