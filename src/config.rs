use std::path::PathBuf;
use std::sync::Arc;

use crate::apis::{self, SearchHost};

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_SAVE_DIR: &str = "saved_articles";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub save_dir: PathBuf,
    pub enabled_hosts: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let port = match std::env::var("PAPERDESK_PORT") {
            Ok(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!(value = raw, "PAPERDESK_PORT is not a port number, using default");
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };

        let save_dir = std::env::var("PAPERDESK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SAVE_DIR));

        let enabled_hosts = std::env::var("PAPERDESK_HOSTS")
            .map(|s| {
                s.split(',')
                    .map(|h| h.trim().to_lowercase())
                    .filter(|h| !h.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self { port, save_dir, enabled_hosts }
    }

    /// Build the host registry, honoring the PAPERDESK_HOSTS filter.
    pub fn build_registry(&self) -> HostRegistry {
        let filter = &self.enabled_hosts;
        let filter_active = !filter.is_empty();
        let should_enable = |code: &str| -> bool {
            let enabled = !filter_active || filter.iter().any(|f| f == code);
            if !enabled {
                tracing::warn!(host = code, "disabled by PAPERDESK_HOSTS filter");
            }
            enabled
        };

        let mut entries: Vec<HostEntry> = Vec::new();
        if should_enable("dblp") {
            entries.push(HostEntry::implemented(Arc::new(apis::dblp::DblpClient::new())));
        }
        if should_enable("arxiv") {
            entries.push(HostEntry::implemented(Arc::new(apis::arxiv::ArxivClient::new())));
        }
        if should_enable("scholar") {
            entries.push(HostEntry::implemented(Arc::new(apis::scholar::ScholarClient::new())));
        }
        // Listed so the frontend can offer it; dispatch answers 501 until an
        // adapter lands.
        if should_enable("semantic_scholar") {
            entries.push(HostEntry::unimplemented("Semantic Scholar", "semantic_scholar"));
        }

        HostRegistry::from_entries(entries)
    }
}

/// One registered search host. `adapter` is `None` for hosts that are listed
/// but not implemented.
pub struct HostEntry {
    pub name: String,
    pub code: String,
    pub adapter: Option<Arc<dyn SearchHost>>,
}

impl HostEntry {
    pub fn implemented(adapter: Arc<dyn SearchHost>) -> Self {
        let name = adapter.name().to_string();
        let code = adapter.code().to_string();
        Self { name, code, adapter: Some(adapter) }
    }

    pub fn unimplemented(name: &str, code: &str) -> Self {
        Self { name: name.to_string(), code: code.to_string(), adapter: None }
    }
}

/// Ordered host table the search endpoint dispatches against.
pub struct HostRegistry {
    entries: Vec<HostEntry>,
}

impl HostRegistry {
    pub fn from_entries(entries: Vec<HostEntry>) -> Self {
        Self { entries }
    }

    /// Look up a host by its `host` query-parameter code. Case-sensitive;
    /// codes are lowercase.
    pub fn get(&self, code: &str) -> Option<&HostEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    pub fn statuses(&self) -> Vec<HostStatus> {
        self.entries
            .iter()
            .map(|e| HostStatus {
                name: e.name.clone(),
                code: e.code.clone(),
                implemented: e.adapter.is_some(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HostStatus {
    pub name: String,
    pub code: String,
    pub implemented: bool,
}
