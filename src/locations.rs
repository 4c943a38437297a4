//! Config file candidates for each supported AI tool.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::paths::Paths;

/// AI tools whose config files we know how to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AiTool {
    ClaudeCode,
    Cursor,
    #[value(name = "vscode")]
    #[serde(rename = "vscode")]
    VsCode,
}

impl AiTool {
    pub fn as_str(self) -> &'static str {
        match self {
            AiTool::ClaudeCode => "claude-code",
            AiTool::Cursor => "cursor",
            AiTool::VsCode => "vscode",
        }
    }
}

impl std::fmt::Display for AiTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigLocation {
    pub tool: AiTool,
    pub config_path: PathBuf,
    pub exists: bool,
}

impl ConfigLocation {
    fn probe(tool: AiTool, config_path: PathBuf) -> Self {
        let exists = config_path.is_file();
        Self {
            tool,
            config_path,
            exists,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }
}

/// Per-user VS Code `mcp.json` for `platform`.
pub fn vscode_user_config(platform: Platform, home: &Path, app_data: Option<&Path>) -> PathBuf {
    match platform {
        Platform::MacOs => home.join("Library/Application Support/Code/User/mcp.json"),
        Platform::Windows => app_data
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join("Code")
            .join("User")
            .join("mcp.json"),
        Platform::Linux => home.join(".config/Code/User/mcp.json"),
    }
}

/// Finds config files for the workspace and the current user.
#[derive(Debug, Clone)]
pub struct Locator {
    workspace_root: Option<PathBuf>,
    user_config: PathBuf,
}

impl Locator {
    pub fn new(workspace_root: Option<PathBuf>, user_config: PathBuf) -> Self {
        Self {
            workspace_root,
            user_config,
        }
    }

    pub fn from_paths(paths: &Paths) -> Self {
        Self::new(
            paths.workspace_root.clone(),
            vscode_user_config(Platform::current(), &paths.home_dir, paths.app_data_dir.as_deref()),
        )
    }

    /// Candidates in priority order. Workspace files are skipped without a workspace.
    pub fn detect_locations(&self) -> Vec<ConfigLocation> {
        let mut locations = Vec::with_capacity(3);
        if let Some(root) = &self.workspace_root {
            locations.push(ConfigLocation::probe(AiTool::ClaudeCode, root.join(".mcp.json")));
            locations.push(ConfigLocation::probe(AiTool::Cursor, root.join(".cursor").join("mcp.json")));
        }
        locations.push(ConfigLocation::probe(AiTool::VsCode, self.user_config.clone()));
        locations
    }

    /// First existing candidate, else the Claude Code file, else the first candidate.
    pub fn primary_location(&self) -> ConfigLocation {
        let mut locations = self.detect_locations();
        let index = locations
            .iter()
            .position(|l| l.exists)
            .or_else(|| locations.iter().position(|l| l.tool == AiTool::ClaudeCode))
            .unwrap_or(0);
        let location = locations.swap_remove(index);
        tracing::debug!(tool = %location.tool, path = %location.config_path.display(), "primary config location");
        location
    }

    /// The candidate for a specific tool, if it applies here.
    pub fn location_for(&self, tool: AiTool) -> Option<ConfigLocation> {
        self.detect_locations().into_iter().find(|l| l.tool == tool)
    }
}
