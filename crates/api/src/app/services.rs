//! Service wiring: stores, listing provider, and the infra services on top.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

use storefront_infra::{
    AccessTokenService, CatalogStore, DriveListingProvider, InMemoryCatalogStore, InMemoryListingProvider,
    InMemoryOrderStore, ListingProvider, OrderService, OrderStore, PostgresCatalogStore, PostgresOrderStore,
    Reconciler, ensure_schema,
};

use crate::config::{AppConfig, ListingBackend};

/// Everything the handlers reach through `Extension<Arc<AppServices>>`.
pub struct AppServices {
    pub catalog: Arc<dyn CatalogStore>,
    pub orders: OrderService,
    pub access: Arc<AccessTokenService>,
    pub reconciler: Arc<Reconciler>,
    /// Parent of every sync run's cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppServices {
    pub fn new(
        config: &AppConfig,
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        listing: Arc<dyn ListingProvider>,
    ) -> Self {
        let access = Arc::new(AccessTokenService::new(orders.clone(), config.access));
        let reconciler = Arc::new(Reconciler::new(
            catalog.clone(),
            listing,
            access.clone(),
            config.reconciler,
        ));
        Self {
            catalog,
            orders: OrderService::new(orders, access.clone()),
            access,
            reconciler,
            shutdown: CancellationToken::new(),
        }
    }

    /// In-memory stores with the given listing provider (tests/dev).
    pub fn in_memory(config: &AppConfig, listing: Arc<InMemoryListingProvider>) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryCatalogStore::new()),
            Arc::new(InMemoryOrderStore::new()),
            listing,
        )
    }
}

/// Build services from configuration.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let listing: Arc<dyn ListingProvider> = match &config.listing {
        ListingBackend::InMemory => {
            tracing::warn!("LISTING_API_BASE not set; using empty in-memory listing provider");
            Arc::new(InMemoryListingProvider::new())
        }
        ListingBackend::Drive { api_base, api_key } => {
            Arc::new(DriveListingProvider::new(api_base.clone(), api_key.clone()))
        }
    };

    let Some(database_url) = &config.database_url else {
        tracing::info!("using in-memory stores");
        return Ok(AppServices::new(
            config,
            Arc::new(InMemoryCatalogStore::new()),
            Arc::new(InMemoryOrderStore::new()),
            listing,
        ));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    ensure_schema(&pool).await.context("failed to ensure schema")?;
    tracing::info!("using Postgres stores");

    Ok(AppServices::new(
        config,
        Arc::new(PostgresCatalogStore::new(pool.clone())),
        Arc::new(PostgresOrderStore::new(pool)),
        listing,
    ))
}
