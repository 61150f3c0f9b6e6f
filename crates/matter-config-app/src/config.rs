use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio_tungstenite::tungstenite::http::Uri;

use attribute_configurator::ConfiguratorConfig;
use matter_client::ClientConfig;

/// Matter server add-on as exposed by a default Home Assistant install.
pub const DEFAULT_SERVER_URL: &str = "ws://homeassistant.local:5580/ws";
const MAX_SETTLE_DELAY_MS: u64 = 60_000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_url: String,
    pub client: ClientConfig,
    pub configurator: ConfiguratorConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Defaults, then the config file (explicit path or `MATTER_CONFIG`),
    /// then `MATTER_*` environment overrides.
    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path.as_deref())? {
            apply_file_config(&mut config, file_config);
        }

        apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Load and validate the file and environment layers, then apply the
    /// `url` positional. A bad CLI url is not a config error: it surfaces as a
    /// connection failure when the run tries to use it.
    pub fn resolve(config_path: Option<String>, cli_url: Option<String>) -> Result<Self> {
        let mut config = Self::load_with_path(config_path).context("load config failed")?;
        config.validate().context("config validation failed")?;
        if let Some(url) = cli_url {
            config.server_url = url;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_server_url(&self.server_url)?;
        if self.client.connect_timeout_ms == 0 {
            anyhow::bail!("client.connect_timeout_ms must be >= 1");
        }
        if self.client.request_timeout_ms == 0 {
            anyhow::bail!("client.request_timeout_ms must be >= 1");
        }
        if self.configurator.settle_delay > Duration::from_millis(MAX_SETTLE_DELAY_MS) {
            anyhow::bail!("verify.settle_delay_ms must be <= {MAX_SETTLE_DELAY_MS}");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            client: ClientConfig::default(),
            configurator: ConfiguratorConfig::default(),
        }
    }
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(value) = env::var("MATTER_SERVER_URL") {
        config.server_url = value;
    }

    if let Some(timeout_ms) = parse_env_u64("MATTER_CONNECT_TIMEOUT_MS") {
        config.client.connect_timeout_ms = timeout_ms;
    }

    if let Some(timeout_ms) = parse_env_u64("MATTER_REQUEST_TIMEOUT_MS") {
        config.client.request_timeout_ms = timeout_ms;
    }

    if let Some(delay_ms) = parse_env_u64("MATTER_SETTLE_DELAY_MS") {
        config.configurator.settle_delay = Duration::from_millis(delay_ms);
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    server: Option<FileServerConfig>,
    client: Option<FileClientConfig>,
    verify: Option<FileVerifyConfig>,
}

#[derive(Debug, Deserialize)]
struct FileServerConfig {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileClientConfig {
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileVerifyConfig {
    settle_delay_ms: Option<u64>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("MATTER_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content =
        fs::read_to_string(&path).with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut AppConfig, file: FileConfig) {
    if let Some(url) = file.server.and_then(|server| server.url) {
        config.server_url = url;
    }

    if let Some(client) = file.client {
        if let Some(timeout_ms) = client.connect_timeout_ms {
            config.client.connect_timeout_ms = timeout_ms;
        }
        if let Some(timeout_ms) = client.request_timeout_ms {
            config.client.request_timeout_ms = timeout_ms;
        }
    }

    if let Some(delay_ms) = file.verify.and_then(|verify| verify.settle_delay_ms) {
        config.configurator.settle_delay = Duration::from_millis(delay_ms);
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

pub fn validate_server_url(value: &str) -> Result<()> {
    let uri: Uri = value
        .parse()
        .map_err(|_| anyhow::anyhow!("server url {value:?} is not a valid URL"))?;
    match uri.scheme_str() {
        Some("ws") | Some("wss") => {}
        _ => anyhow::bail!("server url must use ws:// or wss:// (got {value:?})"),
    }
    if uri.host().map(str::is_empty).unwrap_or(true) {
        anyhow::bail!("server url must include a host (got {value:?})");
    }
    Ok(())
}
