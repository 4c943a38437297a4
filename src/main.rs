//! cleanmcp - Clean MCP Manager CLI

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use cleanmcp::registry::{category_counts, find_server, search};
use cleanmcp::runtime::{command_line, runtime_config};
use cleanmcp::state::tracked_servers;
use cleanmcp::tree::truncate;
use cleanmcp::{
    config, AiTool, ConfigLocation, FileStateStore, InstallResult, Installer, Locator, Paths, Prompt, RegistryClient,
    ServerDescriptor, ServerTree, TreeItem,
};
use tracing_subscriber::EnvFilter;

const INDENT: &str = "        ";

#[derive(Parser)]
#[command(name = "cleanmcp", version)]
#[command(about = "Clean MCP Manager - browse the MCP registry and manage MCP servers in AI tool configs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Workspace root holding .mcp.json and .cursor/ (default: current directory)
    #[arg(long, global = true, env = "CLEANMCP_WORKSPACE")]
    workspace: Option<String>,

    /// Directory for the registry cache and local state
    #[arg(long, global = true, env = "CLEANMCP_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Registry base URL
    #[arg(long, global = true, env = "CLEANMCP_REGISTRY_URL")]
    registry: Option<String>,

    /// Ignore the cached catalog and fetch from the registry
    #[arg(long, global = true)]
    refresh: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the catalog as a tree: all servers, categories, servers
    Browse,

    /// Search servers by name, description, category or tag
    Search {
        /// Case-insensitive text to look for
        query: String,
    },

    /// List categories with server counts
    Categories,

    /// Show details for a registry server
    Info {
        /// Registry name of the server
        name: String,
    },

    /// Add a server to an AI tool config
    Install {
        /// Registry name of the server
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Target this tool's config instead of the primary one
        #[arg(long, value_enum)]
        tool: Option<AiTool>,
    },

    /// Remove a server from an AI tool config
    Uninstall {
        /// Server name as it appears under mcpServers
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Target this tool's config instead of the primary one
        #[arg(long, value_enum)]
        tool: Option<AiTool>,
    },

    /// List servers configured in an AI tool config
    Installed {
        #[arg(long, value_enum)]
        tool: Option<AiTool>,
    },

    /// Show candidate config files and which one is primary
    Locations,

    /// Clear the catalog cache and fetch it again
    Refresh,

    /// Restore a config file from its .backup copy
    Restore {
        #[arg(long, value_enum)]
        tool: Option<AiTool>,
    },

    /// Show catalog and install counts
    Stats,

    /// Show resolved paths (for debugging)
    Paths,
}

/// Confirmations on the terminal.
struct TerminalPrompt {
    assume_yes: bool,
}

impl Prompt for TerminalPrompt {
    fn confirm(&self, message: &str, accept_label: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        println!("{}", message);
        print!("\n{}? [y/N] ", accept_label);
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }

    fn offer_reload(&self, message: &str) {
        println!("{}", message);
        println!("Restart or reload your AI tool to activate the change.");
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut paths = Paths::resolve();
    if let Some(root) = &cli.workspace {
        paths.set_workspace(root);
    }
    if let Some(dir) = cli.storage_dir {
        paths.storage_dir = dir;
    }
    if let Some(url) = &cli.registry {
        paths.set_registry_url(url);
    }
    let json = cli.json;
    let force_refresh = cli.refresh;

    match cli.command {
        Commands::Paths => {
            let workspace = paths
                .workspace_root
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string());
            println!("Workspace:     {}", workspace);
            println!("Storage dir:   {}", paths.storage_dir.display());
            println!("Cache file:    {}", paths.cache_path().display());
            println!("State file:    {}", paths.state_path().display());
            println!("Registry URL:  {}", paths.registry_url);
            println!("Cache exists:  {}", paths.cache_path().exists());
        }
        Commands::Browse => {
            let registry = open_registry(&paths)?;
            let mut tree = ServerTree::new();
            if let Some(notice) = tree.load(&registry, force_refresh) {
                eprintln!("Warning: {}", notice);
            }
            if json {
                print_json(tree.servers())?;
            } else {
                for item in tree.children(None) {
                    print_tree_item(&tree, &item, 0);
                }
            }
        }
        Commands::Search { query } => {
            let servers = load_servers(&paths, force_refresh)?;
            let results = search(&servers, &query);
            if json {
                print_json(&results)?;
            } else if results.is_empty() {
                println!("No servers match \"{}\".", query);
            } else {
                print_server_list(&results);
            }
        }
        Commands::Categories => {
            let servers = load_servers(&paths, force_refresh)?;
            let categories = category_counts(&servers);
            if json {
                print_json(&categories)?;
            } else if categories.is_empty() {
                println!("No servers found.");
            } else {
                println!("{:<8} {}", "SERVERS", "CATEGORY");
                println!("{}", "-".repeat(40));
                for c in categories {
                    println!("{:<8} {}", c.count, c.category);
                }
            }
        }
        Commands::Info { name } => {
            let servers = load_servers(&paths, force_refresh)?;
            let server = find_server(&servers, &name).ok_or_else(|| anyhow!("Server not found: {}", name))?;
            if json {
                print_json(server)?;
            } else {
                let primary = Locator::from_paths(&paths).primary_location();
                print_info_output(server, config::server_exists(&primary.config_path, &server.name));
            }
        }
        Commands::Install { name, yes, tool } => {
            let servers = load_servers(&paths, force_refresh)?;
            let server = find_server(&servers, &name).ok_or_else(|| anyhow!("Server not found: {}", name))?;

            let state = FileStateStore::new(paths.state_path());
            let prompt = TerminalPrompt { assume_yes: yes };
            let installer = Installer::new(Locator::from_paths(&paths), &state, &prompt).with_tool(tool);

            let result = installer.install_server(server);
            report(&result, json)?;
            if result.requires_reload && !json {
                installer.prompt_reload(server.label());
            }
        }
        Commands::Uninstall { name, yes, tool } => {
            let state = FileStateStore::new(paths.state_path());
            let prompt = TerminalPrompt { assume_yes: yes };
            let installer = Installer::new(Locator::from_paths(&paths), &state, &prompt).with_tool(tool);
            report(&installer.uninstall_server(&name), json)?;
        }
        Commands::Installed { tool } => {
            let location = target_location(&paths, tool)?;
            let installed = config::list_installed_servers(&location.config_path);
            if json {
                print_json(&installed)?;
                return Ok(());
            }
            println!("{} ({})", location.config_path.display(), location.tool);
            if installed.is_empty() {
                println!("{}No MCP servers installed.", INDENT);
                return Ok(());
            }
            let tracked = tracked_servers(&FileStateStore::new(paths.state_path()));
            for name in installed {
                let origin = if tracked.contains(&name) { "cleanmcp" } else { "manual" };
                println!("{}{:<32} {}", INDENT, name, origin);
            }
        }
        Commands::Locations => {
            let locator = Locator::from_paths(&paths);
            let primary = locator.primary_location();
            let locations = locator.detect_locations();
            if json {
                print_json(&locations)?;
                return Ok(());
            }
            println!("{:<3}{:<13} {:<7} {}", "", "TOOL", "EXISTS", "PATH");
            println!("{}", "-".repeat(80));
            for l in locations {
                let marker = if l.config_path == primary.config_path { "*" } else { "" };
                let exists = if l.exists { "yes" } else { "no" };
                println!("{:<3}{:<13} {:<7} {}", marker, l.tool, exists, l.config_path.display());
            }
        }
        Commands::Refresh => {
            let registry = open_registry(&paths)?;
            registry.clear_cache();
            let catalog = registry.get_servers(true).context("Failed to refresh")?;
            if let Some(warning) = &catalog.warning {
                eprintln!("Warning: {}", warning);
            }
            println!("MCP servers refreshed! 🔄 ({} servers)", catalog.servers.len());
        }
        Commands::Restore { tool } => {
            let location = target_location(&paths, tool)?;
            config::restore_from_backup(&location.config_path)?;
            println!(
                "Restored {} from {}",
                location.config_path.display(),
                config::backup_path(&location.config_path).display()
            );
        }
        Commands::Stats => {
            let servers = load_servers(&paths, force_refresh)?;
            let primary = Locator::from_paths(&paths).primary_location();
            let installed = config::list_installed_servers(&primary.config_path);
            let tracked = tracked_servers(&FileStateStore::new(paths.state_path()));
            if json {
                print_json(&serde_json::json!({
                    "serversAvailable": servers.len(),
                    "categories": category_counts(&servers).len(),
                    "installed": installed.len(),
                    "installedByCleanmcp": tracked.iter().filter(|n| installed.contains(*n)).count(),
                    "configPath": primary.config_path,
                }))?;
                return Ok(());
            }
            println!("Clean MCP Manager");
            println!("{}Servers available: {}", INDENT, servers.len());
            println!("{}Categories:        {}", INDENT, category_counts(&servers).len());
            println!("{}Installed:         {} ({})", INDENT, installed.len(), primary.config_path.display());
            println!(
                "{}Via cleanmcp:      {}",
                INDENT,
                tracked.iter().filter(|n| installed.contains(*n)).count()
            );
        }
    }
    Ok(())
}

fn open_registry(paths: &Paths) -> anyhow::Result<RegistryClient> {
    Ok(RegistryClient::http(&paths.registry_url, paths.cache_path())?)
}

fn load_servers(paths: &Paths, force_refresh: bool) -> anyhow::Result<Vec<ServerDescriptor>> {
    let catalog = open_registry(paths)?
        .get_servers(force_refresh)
        .context("Failed to load MCP servers")?;
    if let Some(warning) = &catalog.warning {
        eprintln!("Warning: {}", warning);
    }
    Ok(catalog.servers)
}

fn target_location(paths: &Paths, tool: Option<AiTool>) -> anyhow::Result<ConfigLocation> {
    let locator = Locator::from_paths(paths);
    match tool {
        Some(tool) => locator
            .location_for(tool)
            .ok_or_else(|| anyhow!("{} config is not available without a workspace", tool)),
        None => Ok(locator.primary_location()),
    }
}

fn report(result: &InstallResult, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(result)?;
    } else if result.success {
        println!("{}", result.message);
    }
    if !result.success {
        bail!("{}", result.message);
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_tree_item(tree: &ServerTree, item: &TreeItem, depth: usize) {
    let pad = "  ".repeat(depth);
    match item.description().filter(|d| !d.is_empty()) {
        Some(description) => println!("{}{}  - {}", pad, item.label(), description),
        None => println!("{}{}", pad, item.label()),
    }
    if item.is_expandable() {
        for child in tree.children(Some(item)) {
            print_tree_item(tree, &child, depth + 1);
        }
    }
}

fn print_server_list(servers: &[ServerDescriptor]) {
    for s in servers {
        println!("{}", s.name);
        println!("{}Name:      {}", INDENT, s.label());
        println!("{}Category:  {}", INDENT, s.category);
        if let Some(runtime) = s.runtime {
            println!("{}Runtime:   {}", INDENT, runtime.as_str());
        }
        if !s.description.is_empty() {
            let first = s.description.lines().next().unwrap_or("").trim();
            println!("{}Summary:   {}", INDENT, truncate(first, 72));
        }
        println!();
    }
}

fn print_info_output(server: &ServerDescriptor, installed: bool) {
    println!("{}", server.name);
    println!("{}Name:        {}", INDENT, server.label());
    if !server.version.is_empty() {
        println!("{}Version:     {}", INDENT, server.version);
    }
    if !server.description.is_empty() {
        println!("{}Description:", INDENT);
        for line in server.description.lines() {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                println!("{}{}{}", INDENT, INDENT, trimmed);
            }
        }
    }
    if !server.author.is_empty() {
        println!("{}Author:      {}", INDENT, server.author);
    }
    println!("{}Category:    {}", INDENT, server.category);
    if !server.tags.is_empty() {
        println!("{}Tags:        {}", INDENT, server.tags.join(", "));
    }
    println!("{}Command:     {}", INDENT, command_line(&runtime_config(server)));
    if !server.repository.is_empty() {
        println!("{}Repository:  {}", INDENT, server.repository);
    }
    if !server.homepage.is_empty() {
        println!("{}Homepage:    {}", INDENT, server.homepage);
    }
    if let Some(downloads) = server.downloads {
        println!("{}Downloads:   {}", INDENT, downloads);
    }
    if let Some(schema) = &server.config_schema {
        for (key, option) in &schema.properties {
            let mut flags = Vec::new();
            if schema.required.contains(key) {
                flags.push("required");
            }
            if option.secret {
                flags.push("secret");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };
            println!("{}Config.{}{}: {}", INDENT, key, flags, option.description);
        }
    }
    println!("{}Installed:   {}", INDENT, if installed { "yes" } else { "no" });
}
