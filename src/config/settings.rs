use crate::errors::Result;
use crate::stack::RestackMethod;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Repository-level settings, stored as JSON next to the state store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub restack: RestackSettings,
}

/// Settings specific to restack operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestackSettings {
    /// Default method for restack operations.
    /// Overridden per invocation with `--method`.
    #[serde(default)]
    pub method: RestackMethod,
}

impl Default for RestackSettings {
    fn default() -> Self {
        Self {
            method: RestackMethod::Rebase,
        }
    }
}

impl Settings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
