//! Catalog tree: All Servers -> categories -> servers.
//!
//! Hosts render the tree by calling [`ServerTree::children`] from the root and
//! re-render whenever a subscriber receives [`TreeEvent::Changed`].

use std::sync::mpsc::{channel, Receiver, Sender};

use tracing::{error, info};

use crate::models::ServerDescriptor;
use crate::registry::{category_counts, in_category, CatalogSource, RegistryClient};

const DESCRIPTION_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum TreeItem {
    Loading,
    Empty,
    AllServers { count: usize },
    Category { name: String, count: usize },
    Server(ServerDescriptor),
}

impl TreeItem {
    pub fn label(&self) -> String {
        match self {
            TreeItem::Loading => "Loading MCP servers...".to_string(),
            TreeItem::Empty => "No servers found. Click refresh to try again.".to_string(),
            TreeItem::AllServers { count } => format!("📂 All Servers ({})", count),
            TreeItem::Category { name, count } => format!("{} {} ({})", category_emoji(name), name, count),
            TreeItem::Server(server) => server.label().to_string(),
        }
    }

    /// Short description shown next to a server label.
    pub fn description(&self) -> Option<String> {
        match self {
            TreeItem::Server(server) => Some(truncate(&server.description, DESCRIPTION_LIMIT)),
            _ => None,
        }
    }

    /// Markdown tooltip for a server.
    pub fn tooltip(&self) -> Option<String> {
        let TreeItem::Server(server) = self else {
            return None;
        };
        let mut out = format!("**{}**\n\n{}\n\n", server.label(), server.description);
        out.push_str(&format!("**Author:** {}\n\n", server.author));
        out.push_str(&format!("**Version:** {}\n\n", server.version));
        out.push_str(&format!("**Category:** {}\n\n", server.category));
        if let Some(downloads) = server.downloads.filter(|d| *d > 0) {
            out.push_str(&format!("**Downloads:** {}\n\n", group_thousands(downloads)));
        }
        out.push_str(&format!("[Repository]({})", server.repository));
        Some(out)
    }

    /// Theme icon name for a server.
    pub fn icon(&self) -> Option<&'static str> {
        match self {
            TreeItem::Server(server) => Some(category_icon(&server.category)),
            _ => None,
        }
    }

    pub fn is_expandable(&self) -> bool {
        matches!(self, TreeItem::AllServers { .. } | TreeItem::Category { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    Changed,
}

#[derive(Debug, Default)]
pub struct ServerTree {
    servers: Vec<ServerDescriptor>,
    loading: bool,
    subscribers: Vec<Sender<TreeEvent>>,
}

impl ServerTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.servers
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn subscribe(&mut self) -> Receiver<TreeEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Notify subscribers. Dropped receivers are forgotten.
    pub fn refresh(&mut self) {
        self.subscribers.retain(|tx| tx.send(TreeEvent::Changed).is_ok());
    }

    /// Fetch the catalog into the tree.
    ///
    /// Returns a message for the user when the load failed or fell back to
    /// stale data; a failed load leaves the tree empty.
    pub fn load<S: CatalogSource>(&mut self, registry: &RegistryClient<S>, force_refresh: bool) -> Option<String> {
        self.loading = true;
        self.refresh();

        let notice = match registry.get_servers(force_refresh) {
            Ok(catalog) => {
                info!("Loaded {} MCP servers", catalog.servers.len());
                self.servers = catalog.servers;
                catalog.warning
            }
            Err(e) => {
                error!("Failed to initialize tree: {}", e);
                self.servers.clear();
                Some(format!("Failed to load MCP servers: {}", e))
            }
        };

        self.loading = false;
        self.refresh();
        notice
    }

    pub fn children(&self, parent: Option<&TreeItem>) -> Vec<TreeItem> {
        if self.loading {
            return vec![TreeItem::Loading];
        }
        if self.servers.is_empty() {
            return vec![TreeItem::Empty];
        }

        match parent {
            None => vec![TreeItem::AllServers {
                count: self.servers.len(),
            }],
            Some(TreeItem::AllServers { .. }) => category_counts(&self.servers)
                .into_iter()
                .map(|c| TreeItem::Category {
                    name: c.category,
                    count: c.count,
                })
                .collect(),
            Some(TreeItem::Category { name, .. }) => in_category(&self.servers, name)
                .into_iter()
                .map(TreeItem::Server)
                .collect(),
            Some(_) => Vec::new(),
        }
    }
}

pub fn category_emoji(category: &str) -> &'static str {
    match category {
        "databases" => "💾",
        "cloud-services" => "☁️",
        "developer-tools" => "🔧",
        "analytics" => "📊",
        "communication" => "💬",
        "file-storage" => "📁",
        "ai-ml" => "🤖",
        "productivity" => "✅",
        _ => "📦",
    }
}

pub fn category_icon(category: &str) -> &'static str {
    match category {
        "databases" => "database",
        "cloud-services" => "cloud",
        "developer-tools" => "tools",
        "analytics" => "graph",
        "communication" => "comment",
        "file-storage" => "file",
        "ai-ml" => "sparkle",
        "productivity" => "checklist",
        _ => "plug",
    }
}

/// First `limit` characters of `text`, with `...` appended when cut.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
