//! Registry client with an on-disk catalog cache.
//!
//! A cache younger than [`CACHE_TTL`] is served without touching the network.
//! When a fetch fails, any cache (however old) is served instead with a warning;
//! only a failed fetch with no cache at all is an error.

use std::collections::HashMap;
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{CategoryCount, ServerDescriptor};
use crate::utils::atomic_write;

pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const CACHE_VERSION: &str = "1.0";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const USER_AGENT: &str = concat!("cleanmcp/", env!("CARGO_PKG_VERSION"));
pub const STALE_CACHE_WARNING: &str = "Could not fetch fresh data from the registry. Using cached data.";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("HTTP client error: {}", error_chain(.0))]
    HttpClient(reqwest::Error),
    #[error("Failed to fetch MCP servers from {url}: {}", error_chain(.source))]
    Fetch { url: String, source: reqwest::Error },
    #[error("Failed to fetch MCP servers: {0}")]
    Unavailable(String),
}

/// Show the cause chain, since reqwest's top-level message is often terse.
fn error_chain(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        out.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    out
}

/// Where the catalog is fetched from.
pub trait CatalogSource {
    fn fetch_servers(&self) -> Result<Vec<ServerDescriptor>, RegistryError>;
}

/// `GET <base>/servers` over HTTP.
pub struct HttpCatalog {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(RegistryError::HttpClient)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn servers_url(&self) -> String {
        format!("{}/servers", self.base_url)
    }
}

impl CatalogSource for HttpCatalog {
    fn fetch_servers(&self) -> Result<Vec<ServerDescriptor>, RegistryError> {
        let url = self.servers_url();
        let fetch_err = |source| RegistryError::Fetch {
            url: url.clone(),
            source,
        };

        let servers: Vec<ServerDescriptor> = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json())
            .map_err(fetch_err)?;

        info!("Fetched {} MCP servers from {}", servers.len(), url);
        Ok(servers)
    }
}

/// On-disk cache document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub servers: Vec<ServerDescriptor>,
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
    pub version: String,
}

impl CacheEntry {
    pub fn new(servers: Vec<ServerDescriptor>) -> Self {
        Self {
            servers,
            timestamp: Utc::now().timestamp_millis(),
            version: CACHE_VERSION.to_string(),
        }
    }

    pub fn age(&self) -> Duration {
        let age_ms = Utc::now().timestamp_millis().saturating_sub(self.timestamp);
        Duration::from_millis(age_ms.max(0) as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOrigin {
    Cache,
    Network,
    StaleCache,
}

/// Result of [`RegistryClient::get_servers`].
#[derive(Debug, Clone)]
pub struct Catalog {
    pub servers: Vec<ServerDescriptor>,
    pub origin: CatalogOrigin,
    /// Non-fatal problem the caller should surface, e.g. a stale fallback.
    pub warning: Option<String>,
}

pub struct RegistryClient<S = HttpCatalog> {
    source: S,
    cache_path: PathBuf,
    ttl: Duration,
}

impl RegistryClient<HttpCatalog> {
    pub fn http(base_url: &str, cache_path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        Ok(Self::new(HttpCatalog::new(base_url)?, cache_path))
    }
}

impl<S: CatalogSource> RegistryClient<S> {
    pub fn new(source: S, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            cache_path: cache_path.into(),
            ttl: CACHE_TTL,
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// All servers, from a fresh cache when possible.
    pub fn get_servers(&self, force_refresh: bool) -> Result<Catalog, RegistryError> {
        if !force_refresh {
            if let Some(entry) = self.read_cache() {
                let age = entry.age();
                if age < self.ttl {
                    info!("Using cached registry data ({} minutes old)", age.as_secs() / 60);
                    return Ok(Catalog {
                        servers: entry.servers,
                        origin: CatalogOrigin::Cache,
                        warning: None,
                    });
                }
                debug!("Cache expired");
            }
        }

        info!("Fetching fresh data from the registry");
        match self.source.fetch_servers() {
            Ok(servers) => {
                self.write_cache(&servers);
                Ok(Catalog {
                    servers,
                    origin: CatalogOrigin::Network,
                    warning: None,
                })
            }
            Err(e) => {
                warn!("Error fetching servers: {}", e);
                match self.read_cache() {
                    Some(entry) => Ok(Catalog {
                        servers: entry.servers,
                        origin: CatalogOrigin::StaleCache,
                        warning: Some(STALE_CACHE_WARNING.to_string()),
                    }),
                    None => Err(e),
                }
            }
        }
    }

    pub fn get_server(&self, name: &str) -> Result<Option<ServerDescriptor>, RegistryError> {
        Ok(find_server(&self.current()?, name).cloned())
    }

    pub fn search_servers(&self, query: &str) -> Result<Vec<ServerDescriptor>, RegistryError> {
        Ok(search(&self.current()?, query))
    }

    pub fn get_servers_by_category(&self, category: &str) -> Result<Vec<ServerDescriptor>, RegistryError> {
        Ok(in_category(&self.current()?, category))
    }

    pub fn get_categories(&self) -> Result<Vec<CategoryCount>, RegistryError> {
        Ok(category_counts(&self.current()?))
    }

    /// Remove the cache file. A missing cache is fine.
    pub fn clear_cache(&self) {
        match std::fs::remove_file(&self.cache_path) {
            Ok(()) => info!("Cache cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clear cache {}: {}", self.cache_path.display(), e),
        }
    }

    fn current(&self) -> Result<Vec<ServerDescriptor>, RegistryError> {
        let catalog = self.get_servers(false)?;
        if let Some(warning) = &catalog.warning {
            warn!("{}", warning);
        }
        Ok(catalog.servers)
    }

    fn read_cache(&self) -> Option<CacheEntry> {
        let content = match std::fs::read_to_string(&self.cache_path) {
            Ok(c) => c,
            Err(_) => {
                debug!("No cache found");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Ignoring unreadable cache {}: {}", self.cache_path.display(), e);
                None
            }
        }
    }

    /// Best effort: failures are logged only.
    fn write_cache(&self, servers: &[ServerDescriptor]) {
        let entry = CacheEntry::new(servers.to_vec());
        let result = serde_json::to_vec(&entry)
            .map_err(|e| e.to_string())
            .and_then(|bytes| atomic_write(&self.cache_path, &bytes).map_err(|e| e.to_string()));
        match result {
            Ok(()) => debug!("Cache updated"),
            Err(e) => warn!("Failed to update cache {}: {}", self.cache_path.display(), e),
        }
    }
}

pub fn find_server<'a>(servers: &'a [ServerDescriptor], name: &str) -> Option<&'a ServerDescriptor> {
    servers.iter().find(|s| s.name == name)
}

/// Case-insensitive substring match on name, display name, description, category and tags.
/// A blank query matches everything.
pub fn search(servers: &[ServerDescriptor], query: &str) -> Vec<ServerDescriptor> {
    if query.trim().is_empty() {
        return servers.to_vec();
    }
    let needle = query.to_lowercase();
    let hit = |field: &str| field.to_lowercase().contains(&needle);

    servers
        .iter()
        .filter(|s| {
            hit(&s.name)
                || hit(&s.display_name)
                || hit(&s.description)
                || hit(&s.category)
                || s.tags.iter().any(|t| hit(t))
        })
        .cloned()
        .collect()
}

pub fn in_category(servers: &[ServerDescriptor], category: &str) -> Vec<ServerDescriptor> {
    servers.iter().filter(|s| s.category == category).cloned().collect()
}

/// Categories by server count, largest first; ties by name.
pub fn category_counts(servers: &[ServerDescriptor]) -> Vec<CategoryCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for server in servers {
        *counts.entry(server.category.as_str()).or_default() += 1;
    }
    let mut categories: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect();
    categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    categories
}
