use serde::{Deserialize, Serialize};

/// Persisted record for a tracked branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRecord {
    /// Name of the base branch: the trunk or another tracked branch.
    pub base: String,
    /// Hash of the base at the time of the last successful restack.
    /// May go stale when the base moves externally.
    pub base_hash: String,
    /// Last observed head of this branch, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    /// Bases that were merged into trunk below this branch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_downstack: Option<Vec<serde_json::Value>>,
    /// Forge metadata (pull request association), opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forge: Option<serde_json::Value>,
}

/// A change to apply to a branch record inside a transaction.
/// Unset fields leave the existing value untouched.
#[derive(Debug, Clone, Default)]
pub struct UpsertRequest {
    /// Branch the change applies to.
    pub name: String,
    /// New base branch name.
    pub base: Option<String>,
    /// New base hash.
    pub base_hash: Option<String>,
    /// New observed head.
    pub head: Option<String>,
    /// Replacement merged-downstack metadata.
    pub merged_downstack: Option<Vec<serde_json::Value>>,
}

/// A persisted unit of deferred work: a command to re-run on a branch
/// after the user resolves an interruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    /// Command tokens, without the binary name.
    pub command: Vec<String>,
    /// Branch to check out before running the command.
    pub branch: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_record_roundtrip() {
        let record = BranchRecord {
            base: "main".to_string(),
            base_hash: "abc123".to_string(),
            head: Some("def456".to_string()),
            merged_downstack: None,
            forge: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: BranchRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.base, "main");
        assert_eq!(parsed.base_hash, "abc123");
        assert_eq!(parsed.head.as_deref(), Some("def456"));
        assert!(parsed.merged_downstack.is_none());
    }

    #[test]
    fn test_branch_record_omits_empty_fields() {
        let record = BranchRecord {
            base: "main".to_string(),
            base_hash: "abc123".to_string(),
            head: None,
            merged_downstack: None,
            forge: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("head"));
        assert!(!json.contains("merged_downstack"));
        assert!(!json.contains("forge"));
    }

    #[test]
    fn test_continuation_roundtrip() {
        let cont = Continuation {
            command: vec!["upstack".to_string(), "restack".to_string()],
            branch: "feature".to_string(),
        };

        let json = serde_json::to_string(&cont).unwrap();
        let parsed: Continuation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cont);
    }
}
