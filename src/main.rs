use anyhow::{Context, Result};
use axum::http::Method;
use library_hooks::config::Config;
use library_hooks::docs::SwaggerDocs;
use library_hooks::server::{AppState, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let config = Config::from_env().context("load library-hooks config")?;
    let state = Arc::new(AppState::new(config, Arc::new(SwaggerDocs)));

    let period_ms = ip_refill_period_ms(state.config.ip_limit_per_minute);
    let mut governor_builder = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .use_headers();
    governor_builder
        .per_millisecond(period_ms)
        .burst_size(state.config.ip_limit_per_minute)
        .methods(vec![Method::POST]);
    let governor_config = Arc::new(
        governor_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("build governor config"))?,
    );

    let app = build_router(state.clone()).layer(GovernorLayer::new(governor_config));

    let listener = TcpListener::bind(&state.config.bind_addr)
        .await
        .with_context(|| format!("bind {}", state.config.bind_addr))?;

    info!(
        bind = %state.config.bind_addr,
        webhook_path = %state.config.webhook_path,
        algorithms = ?state
            .config
            .signature_algorithms
            .iter()
            .map(|algorithm| algorithm.as_str())
            .collect::<Vec<_>>(),
        "library-hooks listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .context("serve library-hooks")?;

    Ok(())
}

fn ip_refill_period_ms(limit_per_minute: u32) -> u64 {
    if limit_per_minute == 0 {
        return 1;
    }

    let period = 60_000u64 / u64::from(limit_per_minute);
    period.max(1)
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
