//! cleanmcp - Clean MCP Manager
//!
//! Browses the Smithery MCP registry and adds or removes server entries in the
//! JSON-with-comments config files of AI coding tools, keeping user comments
//! and formatting intact.

pub mod config;
pub mod install;
pub mod jsonc;
pub mod locations;
pub mod models;
pub mod paths;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod tree;
pub mod utils;

pub use config::{list_installed_servers, remove_server, restore_from_backup, server_exists, upsert_server, ConfigError};
pub use install::{AutoConfirm, InstallResult, InstallStage, Installer, Prompt};
pub use locations::{AiTool, ConfigLocation, Locator};
pub use models::{CategoryCount, Runtime, ServerDescriptor, ServerRuntimeConfig};
pub use paths::Paths;
pub use registry::{Catalog, CatalogOrigin, CatalogSource, HttpCatalog, RegistryClient, RegistryError};
pub use state::{FileStateStore, MemoryStateStore, StateStore};
pub use tree::{ServerTree, TreeEvent, TreeItem};
