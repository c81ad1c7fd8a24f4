use super::graph::BranchGraph;
use super::metadata::UpsertRequest;
use super::scope::{self, Scope};
use super::store::Store;
use crate::errors::{Result, SpiceError};
use crate::git::{CreateBranchRequest, GitRepository, MergeRequest, RebaseRequest, Worktree};
use crate::utils::CancellationToken;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// How branches are reshaped onto their bases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestackMethod {
    /// Rewrite commits with `git rebase`. Keeps history linear.
    #[default]
    Rebase,
    /// Fold the base in with a merge commit. Preserves existing commits.
    Merge,
}

impl fmt::Display for RestackMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestackMethod::Rebase => write!(f, "rebase"),
            RestackMethod::Merge => write!(f, "merge"),
        }
    }
}

impl FromStr for RestackMethod {
    type Err = SpiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rebase" => Ok(RestackMethod::Rebase),
            "merge" => Ok(RestackMethod::Merge),
            other => Err(SpiceError::config(format!(
                "unknown restack method: {other}"
            ))),
        }
    }
}

/// Options for a single-branch restack.
#[derive(Debug, Clone, Default)]
pub struct RestackOptions {
    pub method: RestackMethod,
}

/// Response to a successful restack.
#[derive(Debug, Clone)]
pub struct RestackResponse {
    /// Base the branch was restacked on.
    pub base: String,
}

/// Outcome of the restack precheck.
#[derive(Debug, Clone)]
enum RestackStatus {
    /// The branch already sits on its base's current head.
    UpToDate,
    /// The branch must be reshaped onto the given base head.
    NeedsRestack { base_hash: String },
}

/// Request to move a branch onto a new base.
#[derive(Debug, Clone)]
pub struct BranchOntoRequest {
    /// Branch to move. Must not be the trunk.
    pub branch: String,
    /// New base. May be the trunk.
    pub onto: String,
    /// Replacement merged-downstack metadata for the moved branch, if any.
    pub merged_downstack: Option<Vec<serde_json::Value>>,
    pub method: RestackMethod,
}

/// Request for a scope-level restack.
#[derive(Debug, Clone)]
pub struct RestackRequest {
    /// Branch the scope is computed from.
    pub start: String,
    pub scope: Scope,
    /// Drop the starting branch from the plan (upstack scope only).
    pub skip_start: bool,
    pub method: RestackMethod,
    /// Command tokens recorded as the continuation when interrupted.
    /// Empty to skip recording.
    pub continue_command: Vec<String>,
}

/// The restack engine: reshapes tracked branches onto the current heads of
/// their recorded bases, one branch at a time.
///
/// Borrows the state store and the two halves of the version-control
/// adapter; it never mutates the continuation queue except through rescue.
pub struct RestackManager<'a> {
    store: &'a Store,
    repo: &'a GitRepository,
    wt: &'a Worktree,
}

impl<'a> RestackManager<'a> {
    pub fn new(store: &'a Store, repo: &'a GitRepository, wt: &'a Worktree) -> Self {
        Self { store, repo, wt }
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    /// Restack a branch on top of its recorded base.
    ///
    /// Returns [`SpiceError::AlreadyRestacked`] when nothing needs to move,
    /// and a [`SpiceError::RestackInterrupt`] when the underlying rebase or
    /// merge stops for the user.
    pub fn restack(&self, name: &str, opts: &RestackOptions) -> Result<RestackResponse> {
        let record = self.store.lookup_branch(name)?;

        let base_hash = match self.check_restacked(name)? {
            RestackStatus::UpToDate => return Err(SpiceError::AlreadyRestacked),
            RestackStatus::NeedsRestack { base_hash } => base_hash,
        };

        // Start rewriting from the recorded base hash. When that is no
        // longer an ancestor of the branch (history rewritten externally),
        // the reflog-based fork point is the best remaining guess for where
        // the branch diverged from its base.
        let head = self.repo.peel_to_commit(name)?;
        let mut upstream = record.base_hash.clone();
        if !self.repo.is_ancestor(&upstream, &head)? {
            if let Ok(fork_point) = self.repo.fork_point(&record.base, name) {
                if upstream != fork_point {
                    debug!(
                        "Recorded base hash of {} is out of date; restacking from fork point {}",
                        name, fork_point
                    );
                }
                upstream = fork_point;
            }
        }

        match opts.method {
            RestackMethod::Rebase => self
                .wt
                .rebase(RebaseRequest {
                    branch: name.to_string(),
                    onto: base_hash.clone(),
                    upstream,
                    autostash: true,
                    quiet: true,
                })
                .map_err(|err| wrap_interrupt(err, RestackMethod::Rebase, name))?,
            RestackMethod::Merge => self
                .restack_with_merge(name, &base_hash, &record.base)
                .map_err(|err| wrap_interrupt(err, RestackMethod::Merge, name))?,
        }

        let new_head = self.repo.peel_to_commit(name)?;
        let mut tx = self.store.begin_branch_tx()?;
        tx.upsert(UpsertRequest {
            name: name.to_string(),
            base_hash: Some(base_hash),
            head: Some(new_head),
            ..Default::default()
        })?;
        tx.commit(&format!("{name}: restacked on {}", record.base))?;

        Ok(RestackResponse { base: record.base })
    }

    /// Check whether a branch sits on top of its base's current head.
    ///
    /// On the up-to-date path, a stale recorded base hash is repaired
    /// opportunistically; a failure there is logged, not fatal.
    fn check_restacked(&self, name: &str) -> Result<RestackStatus> {
        let record = self.store.lookup_branch(name)?;

        let base_hash = self
            .repo
            .peel_to_commit(&record.base)
            .map_err(|_| SpiceError::BaseMissing(record.base.clone()))?;
        let head = self.repo.peel_to_commit(name)?;

        if !self.repo.is_ancestor(&base_hash, &head)? {
            return Ok(RestackStatus::NeedsRestack { base_hash });
        }

        if record.base_hash != base_hash {
            debug!("Updating recorded base hash of {} ({})", name, record.base);
            let refreshed = self.store.begin_branch_tx().and_then(|mut tx| {
                tx.upsert(UpsertRequest {
                    name: name.to_string(),
                    base_hash: Some(base_hash.clone()),
                    ..Default::default()
                })?;
                tx.commit(&format!("{name}: branch was restacked externally"))
            });
            if let Err(err) = refreshed {
                warn!("Failed to update recorded base hash: {err}");
            }
        }

        Ok(RestackStatus::UpToDate)
    }

    /// Merge-method restack: merge the base into a detached checkout of the
    /// branch tip, then force-move the branch ref to the merge commit.
    fn restack_with_merge(&self, name: &str, base_hash: &str, base_name: &str) -> Result<()> {
        let current_branch = self.wt.current_branch()?;
        let merge_subject = format!("Restack {name} onto {base_name} via merge");

        // A continuation may re-enter after the user already completed the
        // merge; detect that by the commit subject and only repair the ref.
        if let Ok(head_commit) = self.repo.peel_to_commit("HEAD") {
            if let Ok(subject) = self.repo.commit_subject(&head_commit) {
                if subject.contains(&merge_subject) {
                    debug!(
                        "Merge of {} into {} already completed at {}; repairing branch ref",
                        base_name, name, head_commit
                    );
                    return self.repoint_branch(name, &head_commit, &current_branch);
                }
            }
        }

        debug!("Restacking {} onto {} ({})", name, base_name, base_hash);

        // Detach at the branch tip so the merge folds the base INTO the
        // branch, not the other way around.
        let branch_commit = self.repo.peel_to_commit(name)?;
        self.wt.checkout(&branch_commit)?;

        self.wt.merge(MergeRequest {
            source: base_name.to_string(),
            message: Some(merge_subject),
            no_ff: true,
            ..Default::default()
        })?;

        let merge_commit = self.repo.peel_to_commit("HEAD")?;
        self.repoint_branch(name, &merge_commit, &current_branch)
    }

    /// Force-move `name` to `target` and restore the user's checkout.
    fn repoint_branch(&self, name: &str, target: &str, current_branch: &str) -> Result<()> {
        // Updating the ref of the checked-out branch requires a detached
        // HEAD; re-checkout the branch afterwards.
        if current_branch == name {
            self.wt.checkout(target)?;
        }

        self.repo.create_branch(CreateBranchRequest {
            name: name.to_string(),
            head: target.to_string(),
            force: true,
        })?;

        if current_branch == name {
            self.wt.checkout(name)?;
        } else if let Err(err) = self.wt.checkout(current_branch) {
            warn!("Failed to restore original branch '{current_branch}': {err}");
        }

        Ok(())
    }

    /// Move a branch onto a new base, updating state to match.
    /// Does not touch the branches upstack of the moved branch.
    pub fn branch_onto(&self, req: &BranchOntoRequest) -> Result<()> {
        if req.branch == self.store.trunk() {
            return Err(SpiceError::branch("cannot move the trunk branch"));
        }

        let record = self.store.lookup_branch(&req.branch)?;

        if req.onto != self.store.trunk() {
            // Non-trunk targets must be tracked.
            self.store.lookup_branch(&req.onto)?;
        }
        let onto_hash = self
            .repo
            .peel_to_commit(&req.onto)
            .map_err(|_| SpiceError::BaseMissing(req.onto.clone()))?;

        // We want to move commits base_hash..HEAD onto the new base. After a
        // conflict was resolved mid-move, the old base hash may already be
        // reachable from the new base; collapsing the range to
        // onto_hash..HEAD turns the rewrite into a no-op that still updates
        // state.
        let mut from_hash = record.base_hash.clone();
        if self.repo.is_ancestor(&from_hash, &onto_hash)? {
            from_hash = onto_hash.clone();
        }

        debug!(
            "Moving {} from {} onto {} ({}..)",
            req.branch, record.base, req.onto, from_hash
        );

        let mut tx = self.store.begin_branch_tx()?;
        tx.upsert(UpsertRequest {
            name: req.branch.clone(),
            base: Some(req.onto.clone()),
            base_hash: Some(onto_hash.clone()),
            merged_downstack: req.merged_downstack.clone(),
            ..Default::default()
        })?;

        match req.method {
            RestackMethod::Merge => {
                self.restack_with_merge(&req.branch, &onto_hash, &req.onto)?;
            }
            RestackMethod::Rebase => {
                self.wt.rebase(RebaseRequest {
                    branch: req.branch.clone(),
                    onto: onto_hash,
                    upstream: from_hash,
                    autostash: true,
                    quiet: true,
                })?;
            }
        }

        tx.commit(&format!("{}: onto {}", req.branch, req.onto))?;
        Ok(())
    }

    /// Restack every branch selected by a scope, bases before dependents.
    ///
    /// On the first interruption the request's continue command is recorded
    /// for the interrupted branch and the rescued error is returned; the
    /// branches already restacked stay restacked, and replaying the command
    /// skips them via the already-restacked precheck.
    ///
    /// Returns the number of branches processed.
    pub fn restack_scope(&self, req: &RestackRequest, cancel: &CancellationToken) -> Result<usize> {
        let graph = BranchGraph::load(self.store, self.repo)?;
        let mut plan = scope::plan(&graph, &req.start, req.scope)?;
        if req.skip_start {
            plan.retain(|branch| *branch != req.start);
        }

        let opts = RestackOptions { method: req.method };
        let mut count = 0;
        for branch in &plan {
            cancel.check()?;
            match self.restack(branch, &opts) {
                Ok(response) => {
                    info!("{}: restacked on {}", branch, response.base);
                    count += 1;
                }
                Err(SpiceError::AlreadyRestacked) => {
                    info!("{}: branch does not need to be restacked", branch);
                    count += 1;
                }
                Err(err) if err.is_interrupt() => {
                    return Err(self.rescue(super::rescue::RescueRequest {
                        err,
                        command: req.continue_command.clone(),
                        branch: Some(branch.clone()),
                        message: Some(format!("interrupted: restack of {branch}")),
                    }));
                }
                Err(err) => return Err(err),
            }
        }

        Ok(count)
    }
}

fn wrap_interrupt(err: SpiceError, method: RestackMethod, branch: &str) -> SpiceError {
    match err {
        err @ (SpiceError::RebaseInterrupt(_) | SpiceError::MergeInterrupt(_)) => {
            SpiceError::RestackInterrupt {
                method,
                branch: branch.to_string(),
                source: Box::new(err),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_and_display() {
        assert_eq!("rebase".parse::<RestackMethod>().unwrap(), RestackMethod::Rebase);
        assert_eq!("merge".parse::<RestackMethod>().unwrap(), RestackMethod::Merge);
        assert!("squash".parse::<RestackMethod>().is_err());

        assert_eq!(RestackMethod::Rebase.to_string(), "rebase");
        assert_eq!(RestackMethod::Merge.to_string(), "merge");
        assert_eq!(RestackMethod::default(), RestackMethod::Rebase);
    }

    #[test]
    fn test_wrap_interrupt_passes_other_errors() {
        let err = wrap_interrupt(
            SpiceError::branch("boom"),
            RestackMethod::Rebase,
            "feature",
        );
        assert!(matches!(err, SpiceError::Branch(_)));
    }
}
