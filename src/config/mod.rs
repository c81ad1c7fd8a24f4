pub mod settings;

pub use settings::{RestackSettings, Settings};

use crate::errors::Result;
use std::path::{Path, PathBuf};

/// Path of the repository-level config file, next to the state store.
pub fn config_path(git_dir: &Path) -> PathBuf {
    git_dir.join("spice").join("config.json")
}

/// Load the repository settings, falling back to defaults when no config
/// file has been written yet.
pub fn load_settings(git_dir: &Path) -> Result<Settings> {
    let path = config_path(git_dir);
    if path.exists() {
        Settings::load_from_file(&path)
    } else {
        Ok(Settings::default())
    }
}

/// Persist the repository settings.
pub fn save_settings(git_dir: &Path, settings: &Settings) -> Result<()> {
    settings.save_to_file(&config_path(git_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::RestackMethod;
    use tempfile::TempDir;

    #[test]
    fn test_load_settings_defaults_when_missing() {
        let tmp = TempDir::new().unwrap();
        let settings = load_settings(tmp.path()).unwrap();
        assert_eq!(settings.restack.method, RestackMethod::Rebase);
    }

    #[test]
    fn test_save_and_load_settings() {
        let tmp = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.restack.method = RestackMethod::Merge;

        save_settings(tmp.path(), &settings).unwrap();
        let loaded = load_settings(tmp.path()).unwrap();
        assert_eq!(loaded.restack.method, RestackMethod::Merge);
    }
}
