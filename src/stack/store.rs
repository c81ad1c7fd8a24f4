use super::metadata::{BranchRecord, Continuation, UpsertRequest};
use crate::errors::{Result, SpiceError};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const TRUNK_FILE: &str = "trunk.json";
const BRANCHES_FILE: &str = "branches.json";
const CONTINUATIONS_FILE: &str = "continuations.json";
const VERSION_FILE: &str = "version";
const LOG_FILE: &str = "log";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct TrunkDoc {
    trunk: String,
}

type BranchDoc = BTreeMap<String, BranchRecord>;

/// Durable state store for tracked branches and the continuation queue.
///
/// Lives under `<gitdir>/spice/` as a handful of human-readable JSON
/// documents plus a `version` counter and an append-only audit `log`.
/// Every mutation advances the counter by exactly one; transactions verify
/// the counter against the snapshot they started from before writing.
pub struct Store {
    root: PathBuf,
    trunk: String,
}

impl Store {
    /// Initialize the store for a repository. Fails if it already exists.
    pub fn init(git_dir: &Path, trunk: &str) -> Result<Store> {
        let root = git_dir.join("spice");
        if root.join(TRUNK_FILE).exists() {
            return Err(SpiceError::config(
                "Repository is already initialized for gs",
            ));
        }
        fs::create_dir_all(&root)?;

        write_json(
            &root.join(TRUNK_FILE),
            &TrunkDoc {
                trunk: trunk.to_string(),
            },
        )?;
        write_json(&root.join(BRANCHES_FILE), &BranchDoc::new())?;
        write_json(&root.join(CONTINUATIONS_FILE), &Vec::<Continuation>::new())?;
        fs::write(root.join(VERSION_FILE), "0")?;

        let store = Store {
            root,
            trunk: trunk.to_string(),
        };
        store.append_log(0, &format!("initialized with trunk {trunk}"))?;

        debug!("Initialized state store with trunk '{}'", trunk);
        Ok(store)
    }

    /// Open the store of an initialized repository.
    pub fn open(git_dir: &Path) -> Result<Store> {
        let root = git_dir.join("spice");
        let trunk_path = root.join(TRUNK_FILE);
        if !trunk_path.exists() {
            return Err(SpiceError::config(
                "Repository is not initialized for gs; run 'gs init' first",
            ));
        }

        let doc: TrunkDoc = read_json(&trunk_path)?;
        Ok(Store {
            root,
            trunk: doc.trunk,
        })
    }

    /// Name of the trunk branch. Immutable after init.
    pub fn trunk(&self) -> &str {
        &self.trunk
    }

    /// Current snapshot version.
    pub fn version(&self) -> Result<u64> {
        let raw = fs::read_to_string(self.root.join(VERSION_FILE))?;
        raw.trim()
            .parse()
            .map_err(|_| SpiceError::config("Corrupt state store version"))
    }

    /// Look up the record of a tracked branch.
    pub fn lookup_branch(&self, name: &str) -> Result<BranchRecord> {
        let branches = self.read_branches()?;
        branches
            .get(name)
            .cloned()
            .ok_or_else(|| SpiceError::NotTracked(name.to_string()))
    }

    /// All tracked branches with their records, sorted by name.
    pub fn list_branches(&self) -> Result<Vec<(String, BranchRecord)>> {
        Ok(self.read_branches()?.into_iter().collect())
    }

    /// Begin a batched transaction against branch records.
    pub fn begin_branch_tx(&self) -> Result<BranchTx<'_>> {
        Ok(BranchTx {
            store: self,
            base_version: self.version()?,
            upserts: Vec::new(),
            deletes: Vec::new(),
        })
    }

    /// Atomically drain the continuation queue.
    pub fn take_continuations(&self, reason: &str) -> Result<Vec<Continuation>> {
        let path = self.root.join(CONTINUATIONS_FILE);
        let conts: Vec<Continuation> = read_json(&path)?;
        if conts.is_empty() {
            return Ok(conts);
        }

        write_json(&path, &Vec::<Continuation>::new())?;
        let version = self.bump_version()?;
        self.append_log(version, &format!("take continuations: {reason}"))?;

        debug!("Took {} continuation(s): {}", conts.len(), reason);
        Ok(conts)
    }

    /// Atomically append to the continuation queue.
    pub fn append_continuations(&self, reason: &str, items: &[Continuation]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let path = self.root.join(CONTINUATIONS_FILE);
        let mut conts: Vec<Continuation> = read_json(&path)?;
        conts.extend(items.iter().cloned());
        write_json(&path, &conts)?;

        let version = self.bump_version()?;
        self.append_log(version, &format!("append continuations: {reason}"))?;

        debug!("Appended {} continuation(s): {}", items.len(), reason);
        Ok(())
    }

    fn read_branches(&self) -> Result<BranchDoc> {
        read_json(&self.root.join(BRANCHES_FILE))
    }

    fn bump_version(&self) -> Result<u64> {
        let version = self.version()? + 1;
        fs::write(self.root.join(VERSION_FILE), version.to_string())?;
        Ok(version)
    }

    fn append_log(&self, version: u64, message: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(LOG_FILE))?;
        writeln!(file, "{version} {} {message}", Utc::now().to_rfc3339())?;
        Ok(())
    }

    /// Walk parent edges from `from`; true if `target` is reached.
    /// Used to reject upserts that would introduce a cycle.
    fn reaches(branches: &BranchDoc, from: &str, target: &str) -> bool {
        let mut current = from.to_string();
        let mut seen = std::collections::HashSet::new();
        while let Some(record) = branches.get(&current) {
            if !seen.insert(current.clone()) {
                return false;
            }
            if record.base == target {
                return true;
            }
            current = record.base.clone();
        }
        false
    }
}

/// A batched set of branch record changes, committed atomically with
/// compare-and-swap semantics against the snapshot version.
pub struct BranchTx<'a> {
    store: &'a Store,
    base_version: u64,
    upserts: Vec<UpsertRequest>,
    deletes: Vec<String>,
}

impl BranchTx<'_> {
    /// Stage a branch record change. Validates graph invariants against the
    /// current snapshot plus previously staged changes.
    pub fn upsert(&mut self, req: UpsertRequest) -> Result<()> {
        if req.name == self.store.trunk() {
            return Err(SpiceError::branch("trunk cannot be tracked"));
        }

        if let Some(base) = &req.base {
            if *base == req.name {
                return Err(SpiceError::branch(format!(
                    "branch '{}' cannot be its own base",
                    req.name
                )));
            }

            let mut branches = self.store.read_branches()?;
            for staged in &self.upserts {
                apply_upsert(&mut branches, staged);
            }

            if *base != self.store.trunk() && !branches.contains_key(base) {
                return Err(SpiceError::NotTracked(base.clone()));
            }

            // Reject a base that sits upstack of the branch being changed.
            if Store::reaches(&branches, base, &req.name) {
                return Err(SpiceError::branch(format!(
                    "cannot set base of '{}' to '{}': would create a cycle",
                    req.name, base
                )));
            }
        }

        self.upserts.push(req);
        Ok(())
    }

    /// Stage deletion of a branch record.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.deletes.push(name.to_string());
        Ok(())
    }

    /// Commit all staged changes as a new snapshot with the given message.
    /// Fails with [`SpiceError::StateConflict`] if the store advanced since
    /// the transaction began.
    pub fn commit(self, message: &str) -> Result<()> {
        if self.store.version()? != self.base_version {
            return Err(SpiceError::StateConflict);
        }

        let mut branches = self.store.read_branches()?;
        for req in &self.upserts {
            if !branches.contains_key(&req.name) && (req.base.is_none() || req.base_hash.is_none())
            {
                return Err(SpiceError::branch(format!(
                    "cannot track '{}' without a base and base hash",
                    req.name
                )));
            }
            apply_upsert(&mut branches, req);
        }
        for name in &self.deletes {
            if branches.remove(name).is_none() {
                return Err(SpiceError::NotTracked(name.clone()));
            }
        }

        // A record whose base was deleted in the same transaction would
        // dangle; catch it before writing.
        for (name, record) in &branches {
            if record.base != self.store.trunk() && !branches.contains_key(&record.base) {
                return Err(SpiceError::branch(format!(
                    "branch '{name}' would be left with untracked base '{}'",
                    record.base
                )));
            }
        }

        write_json(&self.store.root.join(BRANCHES_FILE), &branches)?;
        let version = self.store.bump_version()?;
        self.store.append_log(version, message)?;

        debug!("Committed state snapshot {}: {}", version, message);
        Ok(())
    }
}

fn apply_upsert(branches: &mut BranchDoc, req: &UpsertRequest) {
    match branches.get_mut(&req.name) {
        Some(record) => {
            if let Some(base) = &req.base {
                record.base = base.clone();
            }
            if let Some(base_hash) = &req.base_hash {
                record.base_hash = base_hash.clone();
            }
            if let Some(head) = &req.head {
                record.head = Some(head.clone());
            }
            if let Some(merged) = &req.merged_downstack {
                record.merged_downstack = Some(merged.clone());
            }
        }
        None => {
            branches.insert(
                req.name.clone(),
                BranchRecord {
                    base: req.base.clone().unwrap_or_default(),
                    base_hash: req.base_hash.clone().unwrap_or_default(),
                    head: req.head.clone(),
                    merged_downstack: req.merged_downstack.clone(),
                    forge: None,
                },
            );
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(SpiceError::Json)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_store() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        let store = Store::init(tmp.path(), "main").unwrap();
        (tmp, store)
    }

    fn track(store: &Store, name: &str, base: &str, base_hash: &str) {
        let mut tx = store.begin_branch_tx().unwrap();
        tx.upsert(UpsertRequest {
            name: name.to_string(),
            base: Some(base.to_string()),
            base_hash: Some(base_hash.to_string()),
            ..Default::default()
        })
        .unwrap();
        tx.commit(&format!("{name}: track")).unwrap();
    }

    #[test]
    fn test_init_and_open() {
        let tmp = TempDir::new().unwrap();
        let store = Store::init(tmp.path(), "main").unwrap();
        assert_eq!(store.trunk(), "main");
        assert_eq!(store.version().unwrap(), 0);

        // Double init fails, reopen works.
        assert!(Store::init(tmp.path(), "main").is_err());
        let reopened = Store::open(tmp.path()).unwrap();
        assert_eq!(reopened.trunk(), "main");
    }

    #[test]
    fn test_open_uninitialized() {
        let tmp = TempDir::new().unwrap();
        assert!(Store::open(tmp.path()).is_err());
    }

    #[test]
    fn test_track_lookup_untrack() {
        let (_tmp, store) = new_store();

        assert!(matches!(
            store.lookup_branch("feature"),
            Err(SpiceError::NotTracked(_))
        ));

        track(&store, "feature", "main", "abc123");
        let record = store.lookup_branch("feature").unwrap();
        assert_eq!(record.base, "main");
        assert_eq!(record.base_hash, "abc123");

        let mut tx = store.begin_branch_tx().unwrap();
        tx.delete("feature").unwrap();
        tx.commit("feature: untrack").unwrap();
        assert!(store.lookup_branch("feature").is_err());
    }

    #[test]
    fn test_commit_advances_version_once() {
        let (_tmp, store) = new_store();
        assert_eq!(store.version().unwrap(), 0);

        track(&store, "feature", "main", "abc123");
        assert_eq!(store.version().unwrap(), 1);

        track(&store, "other", "main", "abc123");
        assert_eq!(store.version().unwrap(), 2);
    }

    #[test]
    fn test_stale_tx_conflicts() {
        let (_tmp, store) = new_store();

        let mut stale = store.begin_branch_tx().unwrap();
        stale
            .upsert(UpsertRequest {
                name: "feature".to_string(),
                base: Some("main".to_string()),
                base_hash: Some("abc".to_string()),
                ..Default::default()
            })
            .unwrap();

        // Another writer commits first.
        track(&store, "other", "main", "abc123");

        assert!(matches!(
            stale.commit("feature: track"),
            Err(SpiceError::StateConflict)
        ));
        // The losing transaction left no trace.
        assert!(store.lookup_branch("feature").is_err());
    }

    #[test]
    fn test_upsert_rejects_cycles() {
        let (_tmp, store) = new_store();
        track(&store, "a", "main", "h1");
        track(&store, "b", "a", "h2");
        track(&store, "c", "b", "h3");

        // a cannot move onto its own descendant.
        let mut tx = store.begin_branch_tx().unwrap();
        let err = tx
            .upsert(UpsertRequest {
                name: "a".to_string(),
                base: Some("c".to_string()),
                base_hash: Some("h4".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, SpiceError::Branch(_)));

        // Nor onto itself.
        let mut tx = store.begin_branch_tx().unwrap();
        assert!(tx
            .upsert(UpsertRequest {
                name: "a".to_string(),
                base: Some("a".to_string()),
                base_hash: Some("h4".to_string()),
                ..Default::default()
            })
            .is_err());
    }

    #[test]
    fn test_upsert_rejects_untracked_base() {
        let (_tmp, store) = new_store();
        let mut tx = store.begin_branch_tx().unwrap();
        assert!(matches!(
            tx.upsert(UpsertRequest {
                name: "feature".to_string(),
                base: Some("ghost".to_string()),
                base_hash: Some("h1".to_string()),
                ..Default::default()
            }),
            Err(SpiceError::NotTracked(_))
        ));
    }

    #[test]
    fn test_delete_rejects_dangling_dependents() {
        let (_tmp, store) = new_store();
        track(&store, "a", "main", "h1");
        track(&store, "b", "a", "h2");

        let mut tx = store.begin_branch_tx().unwrap();
        tx.delete("a").unwrap();
        assert!(tx.commit("a: untrack").is_err());
    }

    #[test]
    fn test_continuation_queue_fifo() {
        let (_tmp, store) = new_store();

        let first = Continuation {
            command: vec!["upstack".into(), "restack".into()],
            branch: "a".into(),
        };
        let second = Continuation {
            command: vec!["stack".into(), "restack".into()],
            branch: "b".into(),
        };

        store
            .append_continuations("test", &[first.clone()])
            .unwrap();
        store
            .append_continuations("test", &[second.clone()])
            .unwrap();

        let taken = store.take_continuations("drain").unwrap();
        assert_eq!(taken, vec![first, second]);

        // Queue is now empty; taking again is a no-op.
        let version = store.version().unwrap();
        assert!(store.take_continuations("drain").unwrap().is_empty());
        assert_eq!(store.version().unwrap(), version);
    }

    #[test]
    fn test_audit_log_written() {
        let (tmp, store) = new_store();
        track(&store, "feature", "main", "abc123");

        let log = std::fs::read_to_string(tmp.path().join("spice").join("log")).unwrap();
        assert!(log.contains("initialized with trunk main"));
        assert!(log.contains("feature: track"));
    }
}
