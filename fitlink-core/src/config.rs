use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct FitlinkConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Extra connection attempts at startup before giving up.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: usize,
    /// Apply `sql/schema.sql` on startup.
    #[serde(default)]
    pub apply_schema: bool,
}

fn default_connect_retries() -> usize {
    3
}

/// Graph limits enforced by the link service.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LinksConfig {
    pub max_links_per_type: u32,
    pub suggested_default_count: u32,
    pub suggested_max_count: u32,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            max_links_per_type: 10,
            suggested_default_count: 5,
            suggested_max_count: 20,
        }
    }
}

impl LinksConfig {
    /// Hard ceiling on suggestion counts, whatever the config says.
    pub const SUGGESTED_COUNT_LIMIT: u32 = 20;

    /// Effective upper bound for `get_suggested_links`.
    pub fn suggested_limit(&self) -> u32 {
        self.suggested_max_count.min(Self::SUGGESTED_COUNT_LIMIT)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8780,
        }
    }
}

impl FitlinkConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
