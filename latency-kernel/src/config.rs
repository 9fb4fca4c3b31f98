use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: String,
    pub upstream: UpstreamConf,
    pub dashboard: DashboardConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UpstreamConf {
    pub radar_base: String,
    pub globalping_base: String,
    pub postman_base: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DashboardConf {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    /// base des endpoints `/api/*` interrogés par le poller (le kernel lui-même par défaut)
    pub source_url: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            upstream: UpstreamConf::default(),
            dashboard: DashboardConf::default(),
        }
    }
}

impl Default for UpstreamConf {
    fn default() -> Self {
        Self {
            radar_base: "https://api.cloudflare.com/client/v4/radar".into(),
            globalping_base: "https://api.globalping.io/v1".into(),
            postman_base: "https://api.getpostman.com".into(),
        }
    }
}

impl Default for DashboardConf {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 10,
            source_url: "http://127.0.0.1:8080".into(),
        }
    }
}

impl KernelConfig {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("invalid listen address: {}", self.listen))
    }
}

/// Secrets amont, lus uniquement depuis l'environnement (.env compris)
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub cf_radar_token: Option<String>,
    pub globalping_token: Option<String>,
    pub postman_api_key: Option<String>,
    pub postman_monitor_id: Option<String>,
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            cf_radar_token: env_secret("CF_RADAR_API_TOKEN"),
            globalping_token: env_secret("GLOBALPING_API_TOKEN"),
            postman_api_key: env_secret("POSTMAN_API_KEY"),
            postman_monitor_id: env_secret("POSTMAN_MONITOR_ID"),
        }
    }
}

pub fn parse_config(txt: &str) -> anyhow::Result<KernelConfig> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    serde_yaml::from_str(txt).context("invalid kernel config")
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("LATENCY_KERNEL_CONFIG").unwrap_or_else(|_| "latency-kernel.yaml".into());
    if !Path::new(&path).exists() {
        info!("[kernel] no {path}, using default config");
        return KernelConfig::default();
    }
    let txt = fs::read_to_string(&path).await.unwrap_or_default();
    parse_config(&txt).unwrap_or_else(|e| {
        warn!("[kernel] {e:#}, using default config");
        KernelConfig::default()
    })
}
