//! Install and uninstall MCP servers in the user's AI tool config.
//!
//! Every request walks the same stages (see [`InstallStage`]) and ends in an
//! [`InstallResult`]; errors never escape as `Err`.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{self, ConfigError};
use crate::locations::{AiTool, ConfigLocation, Locator};
use crate::models::ServerDescriptor;
use crate::runtime::{command_line, runtime_config};
use crate::state::{self, StateStore};

/// User interaction needed by the installer.
pub trait Prompt {
    /// Ask a yes/no question. `accept_label` names the affirmative choice.
    fn confirm(&self, message: &str, accept_label: &str) -> bool;

    /// Suggest reloading the AI tool so it picks up the config change.
    fn offer_reload(&self, _message: &str) {}
}

/// Answers every confirmation the same way.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Prompt for AutoConfirm {
    fn confirm(&self, _message: &str, _accept_label: &str) -> bool {
        self.0
    }
}

/// Last stage an install or uninstall reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStage {
    Idle,
    DuplicateChecked,
    Confirmed,
    ConfigUpdated,
    TrackedComplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    pub success: bool,
    pub server_name: String,
    pub message: String,
    pub requires_reload: bool,
    pub stage: InstallStage,
}

impl InstallResult {
    fn rejected(server_name: &str, message: impl Into<String>, stage: InstallStage) -> Self {
        Self {
            success: false,
            server_name: server_name.to_string(),
            message: message.into(),
            requires_reload: false,
            stage,
        }
    }

    fn completed(server_name: &str, message: impl Into<String>, stage: InstallStage) -> Self {
        Self {
            success: true,
            server_name: server_name.to_string(),
            message: message.into(),
            requires_reload: true,
            stage,
        }
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("{0} config is not available without a workspace")]
    NoLocation(AiTool),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct Installer<'a> {
    locator: Locator,
    state: &'a dyn StateStore,
    prompt: &'a dyn Prompt,
    tool: Option<AiTool>,
}

impl<'a> Installer<'a> {
    pub fn new(locator: Locator, state: &'a dyn StateStore, prompt: &'a dyn Prompt) -> Self {
        Self {
            locator,
            state,
            prompt,
            tool: None,
        }
    }

    /// Target a specific tool's config instead of the primary location.
    pub fn with_tool(mut self, tool: Option<AiTool>) -> Self {
        self.tool = tool;
        self
    }

    pub fn config_location(&self) -> Result<ConfigLocation, InstallError> {
        match self.tool {
            Some(tool) => self.locator.location_for(tool).ok_or(InstallError::NoLocation(tool)),
            None => Ok(self.locator.primary_location()),
        }
    }

    pub fn install_server(&self, server: &ServerDescriptor) -> InstallResult {
        info!("Installing MCP server: {}", server.label());
        let mut stage = InstallStage::Idle;
        self.try_install(server, &mut stage).unwrap_or_else(|e| {
            error!("Installation failed: {}", e);
            InstallResult::rejected(&server.name, format!("Installation failed: {}", e), stage)
        })
    }

    pub fn uninstall_server(&self, name: &str) -> InstallResult {
        info!("Uninstalling MCP server: {}", name);
        let mut stage = InstallStage::Idle;
        self.try_uninstall(name, &mut stage).unwrap_or_else(|e| {
            error!("Uninstall failed: {}", e);
            InstallResult::rejected(name, format!("Uninstall failed: {}", e), stage)
        })
    }

    /// Names in the target config. Empty when there is no usable config.
    pub fn installed_servers(&self) -> BTreeSet<String> {
        self.config_location()
            .map(|location| config::list_installed_servers(&location.config_path))
            .unwrap_or_default()
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.config_location()
            .is_ok_and(|location| config::server_exists(&location.config_path, name))
    }

    pub fn prompt_reload(&self, display_name: &str) {
        self.prompt
            .offer_reload(&format!("{} installed successfully! Reload window to activate?", display_name));
    }

    fn try_install(&self, server: &ServerDescriptor, stage: &mut InstallStage) -> Result<InstallResult, InstallError> {
        let location = self.config_location()?;
        if config::server_exists(&location.config_path, &server.name) {
            return Ok(InstallResult::rejected(
                &server.name,
                format!("{} is already installed", server.label()),
                *stage,
            ));
        }
        *stage = InstallStage::DuplicateChecked;

        let entry = runtime_config(server);
        let message = format!(
            "Install {}?\n\nThis will add the MCP server to your {} configuration.\n\nCommand: {}",
            server.label(),
            location.tool,
            command_line(&entry)
        );
        if !self.prompt.confirm(&message, "Install") {
            return Ok(InstallResult::rejected(&server.name, "Installation cancelled by user", *stage));
        }
        *stage = InstallStage::Confirmed;

        config::upsert_server(&location.config_path, &server.name, &entry)?;
        *stage = InstallStage::ConfigUpdated;

        match state::track_server(self.state, &server.name) {
            Ok(()) => *stage = InstallStage::TrackedComplete,
            Err(e) => warn!("Installed {} but could not record it: {}", server.name, e),
        }

        Ok(InstallResult::completed(
            &server.name,
            format!("Successfully installed {}", server.label()),
            *stage,
        ))
    }

    fn try_uninstall(&self, name: &str, stage: &mut InstallStage) -> Result<InstallResult, InstallError> {
        let location = self.config_location()?;
        if !config::server_exists(&location.config_path, name) {
            return Ok(InstallResult::rejected(name, format!("{} is not installed", name), *stage));
        }
        *stage = InstallStage::DuplicateChecked;

        let message = format!("Are you sure you want to uninstall \"{}\"?", name);
        if !self.prompt.confirm(&message, "Uninstall") {
            return Ok(InstallResult::rejected(name, "Uninstall cancelled by user", *stage));
        }
        *stage = InstallStage::Confirmed;

        config::remove_server(&location.config_path, name)?;
        *stage = InstallStage::ConfigUpdated;

        match state::untrack_server(self.state, name) {
            Ok(()) => *stage = InstallStage::TrackedComplete,
            Err(e) => warn!("Uninstalled {} but could not update records: {}", name, e),
        }

        Ok(InstallResult::completed(name, format!("Successfully uninstalled {}", name), *stage))
    }
}
