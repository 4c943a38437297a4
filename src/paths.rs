//! Path resolution for the workspace, local storage and the registry.
//!
//! Uses env vars when set, otherwise platform defaults.

use std::path::{Path, PathBuf};

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.smithery.ai";

const CACHE_FILE: &str = "smithery-cache.json";
const STATE_FILE: &str = "state.json";

/// Resolved locations used by the manager.
#[derive(Debug, Clone)]
pub struct Paths {
    pub workspace_root: Option<PathBuf>,
    pub storage_dir: PathBuf,
    pub home_dir: PathBuf,
    pub app_data_dir: Option<PathBuf>,
    pub registry_url: String,
}

impl Paths {
    /// Resolve paths from environment, falling back to platform defaults.
    ///
    /// The workspace defaults to the current directory.
    pub fn resolve() -> Self {
        let workspace_root = env_path("CLEANMCP_WORKSPACE").or_else(|| std::env::current_dir().ok());
        let storage_dir = env_path("CLEANMCP_STORAGE_DIR").unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|p| p.join("cleanmcp"))
                .unwrap_or_else(|| expand_tilde("~/.local/share/cleanmcp"))
        });
        let home_dir = dirs::home_dir().unwrap_or_else(|| expand_tilde("~"));
        let app_data_dir = env_path("APPDATA");
        let registry_url = std::env::var("CLEANMCP_REGISTRY_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());

        Self {
            workspace_root,
            storage_dir,
            home_dir,
            app_data_dir,
            registry_url,
        }
    }

    /// Paths rooted in explicit directories, with nothing read from the environment.
    pub fn with_dirs(workspace_root: Option<&Path>, storage_dir: &Path, home_dir: &Path) -> Self {
        Self {
            workspace_root: workspace_root.map(Path::to_path_buf),
            storage_dir: storage_dir.to_path_buf(),
            home_dir: home_dir.to_path_buf(),
            app_data_dir: None,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
        }
    }

    pub fn set_workspace(&mut self, root: &str) {
        self.workspace_root = Some(expand_tilde(root));
    }

    pub fn set_registry_url(&mut self, url: &str) {
        self.registry_url = url.trim().trim_end_matches('/').to_string();
    }

    /// Registry catalog cache file.
    pub fn cache_path(&self) -> PathBuf {
        self.storage_dir.join(CACHE_FILE)
    }

    /// Local state (installed-server bookkeeping).
    pub fn state_path(&self) -> PathBuf {
        self.storage_dir.join(STATE_FILE)
    }
}

fn env_path(env_var: &str) -> Option<PathBuf> {
    let val = std::env::var(env_var).ok()?;
    let trimmed = val.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(expand_tilde(trimmed))
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}
