//! Where settings and saved recipes live on disk.
//!
//! By default the platform directories from the `dirs` crate are used:
//!
//! | | settings (`settings.toml`) | saved recipes (`tcm_favorites.json`) |
//! |---|---|---|
//! | Linux   | `~/.config/tcm-kitchen/` | `~/.local/share/tcm-kitchen/` |
//! | macOS   | `~/Library/Application Support/tcm-kitchen/` | same |
//! | Windows | `%APPDATA%\tcm-kitchen\` | `%LOCALAPPDATA%\tcm-kitchen\` |
//!
//! Setting `TCM_KITCHEN_HOME` puts both files in that one directory instead
//! (portable installs, throwaway sessions).

use std::path::{Path, PathBuf};

/// Environment variable selecting a single portable root directory.
pub const HOME_ENV: &str = "TCM_KITCHEN_HOME";

const APP_DIR: &str = "tcm-kitchen";
const SETTINGS_FILE: &str = "settings.toml";
const FAVORITES_FILE: &str = "tcm_favorites.json";

/// Resolved directories and files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    pub data_dir: PathBuf,
    /// The saved-recipes collection.
    pub favorites_file: PathBuf,
}

impl AppPaths {
    /// `TCM_KITCHEN_HOME` when set and non-empty, platform dirs otherwise.
    pub fn new() -> Self {
        match std::env::var_os(HOME_ENV).filter(|root| !root.is_empty()) {
            Some(root) => Self::under(root),
            None => Self::platform(),
        }
    }

    /// Everything inside `root`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::split(root.clone(), root)
    }

    /// Platform directories; the current directory when the platform has none.
    fn platform() -> Self {
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR);
        Self::split(base(dirs::config_dir()), base(dirs::data_local_dir()))
    }

    fn split(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            favorites_file: data_dir.join(FAVORITES_FILE),
            config_dir,
            data_dir,
        }
    }

    /// `true` when `path` is one of the files this layout manages.
    pub fn manages(&self, path: &Path) -> bool {
        path == self.settings_file || path == self.favorites_file
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
