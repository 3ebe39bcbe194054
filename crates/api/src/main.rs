use anyhow::Context;

use storefront_api::{app, config::AppConfig, shutdown::shutdown_signal};
use storefront_infra::spawn_scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let (router, services) = app::build_app(&config).await?;

    let scheduler = config.scheduler.clone().map(|scheduler| {
        tracing::info!(
            roots = scheduler.roots.len(),
            interval_secs = scheduler.interval.as_secs(),
            "starting sync scheduler"
        );
        spawn_scheduler(
            services.reconciler.clone(),
            scheduler,
            services.shutdown.child_token(),
        )
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Stop in-flight syncs and the scheduler before exiting.
    services.shutdown.cancel();
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }
    tracing::info!("shut down");
    Ok(())
}
