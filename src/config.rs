use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Rejections past this count are still reported, but not logged one by one.
    #[serde(default = "default_max_rejections_logged")]
    pub max_rejections_logged: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_rejections_logged: default_max_rejections_logged(),
        }
    }
}

fn default_batch_size() -> usize {
    1000
}
fn default_max_rejections_logged() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_grid_limit")]
    pub grid_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            grid_limit: default_grid_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> i64 {
    10
}
fn default_grid_limit() -> i64 {
    12
}
/// Hard ceiling on page size; `query.max_limit` may only lower it.
pub const LIMIT_CEILING: i64 = 100;

fn default_max_limit() -> i64 {
    LIMIT_CEILING
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_top_n")]
    pub top_n: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_top_n() -> i64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Config {
    /// A config with every optional section defaulted, pointing at `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            ingest: IngestConfig::default(),
            query: QueryConfig::default(),
            stats: StatsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate ingest
    if config.ingest.batch_size == 0 {
        anyhow::bail!("ingest.batch_size must be > 0");
    }

    // Validate query
    let query = &config.query;
    if !(1..=LIMIT_CEILING).contains(&query.max_limit) {
        anyhow::bail!(
            "query.max_limit must be in [1, {}], got {}",
            LIMIT_CEILING,
            query.max_limit
        );
    }
    for (name, value) in [
        ("default_limit", query.default_limit),
        ("grid_limit", query.grid_limit),
    ] {
        if !(1..=query.max_limit).contains(&value) {
            anyhow::bail!(
                "query.{} must be in [1, {}], got {}",
                name,
                query.max_limit,
                value
            );
        }
    }

    // Validate stats
    if config.stats.top_n < 1 {
        anyhow::bail!("stats.top_n must be >= 1");
    }

    Ok(config)
}
