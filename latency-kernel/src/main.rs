/**
 * LATENCY KERNEL - Point d'entrée du serveur du globe de latence
 *
 * RÔLE : Orchestration des modules : config, proxies amont, session dashboard, HTTP, health.
 * Bootstrap du système complet avec gestion d'erreurs et logging.
 *
 * ARCHITECTURE : le poller du dashboard interroge les proxies /api du kernel lui-même,
 * les consommateurs de rendu lisent /view.
 */

mod config;
mod health;
mod http;
mod proxy;

use crate::config::{load_config, Credentials};
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::proxy::{ProxyState, Upstream};

use anyhow::Context;
use latency_core::dashboard::{Dashboard, DashboardConfig};
use latency_core::reference;
use latency_core::upstream::HttpSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[kernel] failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("[kernel] shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("latency_kernel=info,latency_core=info")),
        )
        .init();

    let cfg = load_config().await;
    let creds = Credentials::from_env();
    if creds.cf_radar_token.is_none() {
        warn!("[kernel] CF_RADAR_API_TOKEN not set, radar proxies will answer 500");
    }

    let catalog = Arc::new(reference::catalog());
    let health = HealthTracker::new();
    let proxy_state = ProxyState {
        upstream: Arc::new(Upstream::new(cfg.upstream.clone(), creds)),
        health: health.clone(),
    };

    // bind avant de monter : le premier poll vise nos propres proxies
    let addr = cfg.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let dashboard = cfg.dashboard.enabled.then(|| {
        let source = Arc::new(HttpSource::new(cfg.dashboard.source_url.clone()));
        let dash_cfg = DashboardConfig {
            poll_interval: Duration::from_secs(cfg.dashboard.poll_interval_secs.max(1)),
            ..Default::default()
        };
        Arc::new(Dashboard::mount(Arc::clone(&catalog), source, dash_cfg))
    });
    if dashboard.is_none() {
        info!("[kernel] dashboard disabled, serving proxies only");
    }

    let app_state = AppState { catalog, dashboard: dashboard.clone(), health };
    let app = http::build_router(app_state, proxy_state);

    info!("[kernel] listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(dashboard) = dashboard {
        dashboard.unmount();
    }
    info!("[kernel] stopped");
    Ok(())
}
