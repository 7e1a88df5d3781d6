use std::sync::Arc;

use anyhow::Context;

use spacedock_api::config::ApiConfig;
use spacedock_auth::Hs256JwtAuthenticator;
use spacedock_infra::{
    BlueprintCatalog, HttpBlueprintCatalog, Services, StaticBlueprintCatalog, spawn_ticker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    spacedock_observability::init();

    let config = ApiConfig::from_env();

    let catalog: Arc<dyn BlueprintCatalog> = match &config.techdb_url {
        Some(url) => {
            tracing::info!(techdb_url = %url, "using remote blueprint catalog");
            Arc::new(HttpBlueprintCatalog::new(url.clone()))
        }
        None => Arc::new(
            StaticBlueprintCatalog::builtin().context("built-in blueprint catalog is invalid")?,
        ),
    };

    let services = Services::in_memory(catalog, config.dependency_timeout);
    let ticker = spawn_ticker(services.jobs.clone(), config.job_tick);

    let authenticator = Arc::new(Hs256JwtAuthenticator::new(config.jwt_secret.as_bytes()));
    let app = spacedock_api::app::build_app(services, authenticator, config.dependency_timeout);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")?;

    ticker.shutdown().await;
    Ok(())
}
