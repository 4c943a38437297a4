//! Derive the config entry for a registry server.

use std::collections::BTreeMap;

use crate::models::{Runtime, ServerDescriptor, ServerRuntimeConfig};

pub const PACKAGE_RUNNER: &str = "npx";
pub const PACKAGE_SCOPE: &str = "@smithery";
pub const CONTAINER_ENGINE: &str = "docker";
pub const CONTAINER_NAMESPACE: &str = "smithery";

/// Build the `mcpServers` entry for `server`. Unknown runtimes use the package runner.
pub fn runtime_config(server: &ServerDescriptor) -> ServerRuntimeConfig {
    let runtime = server.runtime.unwrap_or(Runtime::Unknown);
    let (command, args) = match runtime {
        Runtime::Docker => (
            CONTAINER_ENGINE.to_string(),
            vec![
                "run".to_string(),
                "-i".to_string(),
                format!("{CONTAINER_NAMESPACE}/{}", server.name),
            ],
        ),
        Runtime::Binary => (server.command.clone(), Vec::new()),
        Runtime::Npx | Runtime::Unknown => (
            PACKAGE_RUNNER.to_string(),
            vec!["-y".to_string(), format!("{PACKAGE_SCOPE}/{}", server.name)],
        ),
    };

    ServerRuntimeConfig {
        command,
        args,
        env: server.config_schema.as_ref().and_then(|_| env_from_schema(server)),
    }
}

/// Environment for the config entry.
///
/// Always `None` for now: values for schema options are left for the user to
/// fill in until secrets can be prompted for interactively.
fn env_from_schema(_server: &ServerDescriptor) -> Option<BTreeMap<String, String>> {
    None
}

/// The command line as it will be launched, for confirmation messages.
pub fn command_line(config: &ServerRuntimeConfig) -> String {
    std::iter::once(config.command.as_str())
        .chain(config.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
