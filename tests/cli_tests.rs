/// Integration tests for the CLI glue: init, track/untrack, commit create,
/// and the log listing.
use git_spice::stack::Store;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn gs(args: &[&str], cwd: &Path) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_gs"))
        .args(args)
        .arg("--no-color")
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to execute gs");

    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn git(repo_path: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn git_out(repo_path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {args:?} failed");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn commit_file(repo_path: &Path, filename: &str, content: &str, message: &str) {
    std::fs::write(repo_path.join(filename), content).unwrap();
    git(repo_path, &["add", filename]);
    git(repo_path, &["commit", "-m", message]);
}

fn setup_repo() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().to_path_buf();

    git(&path, &["init", "-b", "main"]);
    git(&path, &["config", "user.name", "Test User"]);
    git(&path, &["config", "user.email", "test@example.com"]);
    commit_file(&path, "README.md", "# Test Repo\n", "Initial commit");

    (tmp, path)
}

#[test]
fn test_init_uses_current_branch_as_trunk() {
    let (_tmp, path) = setup_repo();

    let (ok, _, stderr) = gs(&["init"], &path);
    assert!(ok, "gs init failed: {stderr}");

    let store = Store::open(&path.join(".git")).unwrap();
    assert_eq!(store.trunk(), "main");

    // Initializing twice fails.
    let (ok, _, _) = gs(&["init"], &path);
    assert!(!ok);
}

#[test]
fn test_init_rejects_missing_trunk() {
    let (_tmp, path) = setup_repo();
    let (ok, stdout, stderr) = gs(&["init", "--trunk", "develop"], &path);
    assert!(!ok);
    assert!(format!("{stdout}{stderr}").contains("does not exist"));
}

#[test]
fn test_commands_require_init() {
    let (_tmp, path) = setup_repo();
    let (ok, stdout, stderr) = gs(&["branch", "track"], &path);
    assert!(!ok);
    assert!(format!("{stdout}{stderr}").contains("gs init"));
}

#[test]
fn test_track_and_untrack() {
    let (_tmp, path) = setup_repo();
    gs(&["init"], &path);

    git(&path, &["checkout", "-b", "feature"]);
    commit_file(&path, "feature.txt", "one\n", "Feature commit");

    // Track defaults to the current branch and the trunk base.
    let (ok, _, stderr) = gs(&["branch", "track"], &path);
    assert!(ok, "gs branch track failed: {stderr}");

    let store = Store::open(&path.join(".git")).unwrap();
    let record = store.lookup_branch("feature").unwrap();
    assert_eq!(record.base, "main");
    assert_eq!(record.base_hash, git_out(&path, &["rev-parse", "main"]));
    drop(store);

    // Tracking the trunk is refused.
    let (ok, _, _) = gs(&["branch", "track", "main"], &path);
    assert!(!ok);

    let (ok, _, stderr) = gs(&["branch", "untrack", "feature"], &path);
    assert!(ok, "gs branch untrack failed: {stderr}");
    let store = Store::open(&path.join(".git")).unwrap();
    assert!(store.lookup_branch("feature").is_err());

    // Untracking again fails.
    let (ok, _, _) = gs(&["branch", "untrack", "feature"], &path);
    assert!(!ok);
}

#[test]
fn test_track_rejects_cycles() {
    let (_tmp, path) = setup_repo();
    gs(&["init"], &path);

    git(&path, &["checkout", "-b", "a"]);
    commit_file(&path, "a.txt", "a\n", "A commit");
    gs(&["branch", "track", "a"], &path);

    git(&path, &["checkout", "-b", "b"]);
    commit_file(&path, "b.txt", "b\n", "B commit");
    gs(&["branch", "track", "b", "--base", "a"], &path);

    // Re-tracking a with base b would make the forest cyclic.
    let (ok, stdout, stderr) = gs(&["branch", "track", "a", "--base", "b"], &path);
    assert!(!ok);
    assert!(format!("{stdout}{stderr}").contains("cycle"));
}

#[test]
fn test_commit_create_restacks_upstack() {
    let (_tmp, path) = setup_repo();
    gs(&["init"], &path);

    git(&path, &["checkout", "-b", "a"]);
    commit_file(&path, "a.txt", "a1\n", "A: first commit");
    gs(&["branch", "track", "a"], &path);

    git(&path, &["checkout", "-b", "b"]);
    commit_file(&path, "b.txt", "b1\n", "B: first commit");
    gs(&["branch", "track", "b", "--base", "a"], &path);

    // New commit on a; b must follow.
    git(&path, &["checkout", "a"]);
    std::fs::write(path.join("a.txt"), "a2\n").unwrap();
    git(&path, &["add", "a.txt"]);
    let (ok, stdout, stderr) = gs(&["commit", "create", "-m", "A: second commit"], &path);
    assert!(ok, "gs commit create failed: {stdout}{stderr}");

    assert_eq!(
        git_out(&path, &["log", "-1", "--format=%s", "a"]),
        "A: second commit"
    );
    let a_head = git_out(&path, &["rev-parse", "a"]);
    assert_eq!(git_out(&path, &["rev-parse", "b^"]), a_head);

    let store = Store::open(&path.join(".git")).unwrap();
    assert_eq!(store.lookup_branch("b").unwrap().base_hash, a_head);
}

#[test]
fn test_commit_create_on_untracked_branch_skips_restack() {
    let (_tmp, path) = setup_repo();
    gs(&["init"], &path);

    git(&path, &["checkout", "-b", "loose"]);
    std::fs::write(path.join("loose.txt"), "x\n").unwrap();
    git(&path, &["add", "loose.txt"]);

    let (ok, stdout, stderr) = gs(&["commit", "create", "-m", "Loose commit"], &path);
    assert!(ok, "gs commit create failed: {stdout}{stderr}");
    assert_eq!(
        git_out(&path, &["log", "-1", "--format=%s"]),
        "Loose commit"
    );
}

#[test]
fn test_log_marks_branches_needing_restack() {
    let (_tmp, path) = setup_repo();
    gs(&["init"], &path);

    git(&path, &["checkout", "-b", "a"]);
    commit_file(&path, "a.txt", "a1\n", "A: first commit");
    gs(&["branch", "track", "a"], &path);

    git(&path, &["checkout", "-b", "b"]);
    commit_file(&path, "b.txt", "b1\n", "B: first commit");
    gs(&["branch", "track", "b", "--base", "a"], &path);

    git(&path, &["checkout", "a"]);
    git(&path, &["commit", "--amend", "-m", "A: amended"]);

    let (ok, stdout, stderr) = gs(&["log"], &path);
    assert!(ok, "gs log failed: {stderr}");
    assert!(stdout.contains("main (trunk)"));
    assert!(stdout.contains("a (base: main)"));
    assert!(stdout.contains("b (base: a) (needs restack)"));
    assert!(!stdout.contains("a (base: main) (needs restack)"));
}

#[test]
fn test_repo_restack_restores_checkout() {
    let (_tmp, path) = setup_repo();
    gs(&["init"], &path);

    git(&path, &["checkout", "-b", "a"]);
    commit_file(&path, "a.txt", "a1\n", "A: first commit");
    gs(&["branch", "track", "a"], &path);

    git(&path, &["checkout", "-b", "b"]);
    commit_file(&path, "b.txt", "b1\n", "B: first commit");
    gs(&["branch", "track", "b", "--base", "a"], &path);

    git(&path, &["checkout", "a"]);
    git(&path, &["commit", "--amend", "-m", "A: amended"]);
    git(&path, &["checkout", "main"]);

    let (ok, stdout, stderr) = gs(&["repo", "restack"], &path);
    assert!(ok, "gs repo restack failed: {stdout}{stderr}");

    // All branches restacked; the user's checkout is restored.
    let a_head = git_out(&path, &["rev-parse", "a"]);
    assert_eq!(git_out(&path, &["rev-parse", "b^"]), a_head);
    assert_eq!(
        git_out(&path, &["symbolic-ref", "--short", "HEAD"]),
        "main"
    );
}
