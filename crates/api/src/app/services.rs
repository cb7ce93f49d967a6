use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use warehouse_infra::{
    Credentials, InMemoryWarehouseStore, OperationContext, PostgresWarehouseStore,
    WarehouseConfig, WarehouseService, WarehouseStore,
};

/// Store shared by every request, chosen at startup.
pub type SharedStore = Arc<dyn WarehouseStore>;

#[derive(Clone)]
pub struct AppServices {
    warehouse: WarehouseService<SharedStore>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl AppServices {
    pub fn new(store: SharedStore, request_timeout: Duration) -> Self {
        Self {
            warehouse: WarehouseService::new(store),
            request_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// In-memory services with the default request timeout.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryWarehouseStore::new()),
            WarehouseConfig::default().http.timeout,
        )
    }

    pub fn warehouse(&self) -> &WarehouseService<SharedStore> {
        &self.warehouse
    }

    /// Context for one request: the configured timeout, cancelled on forced shutdown.
    pub fn request_context(&self) -> OperationContext {
        OperationContext::background()
            .with_token(self.shutdown.child_token())
            .timeout(self.request_timeout)
    }

    /// Abort every in-flight request.
    pub fn cancel_in_flight(&self) {
        self.shutdown.cancel();
    }

    pub async fn close(&self) {
        self.warehouse.close().await;
    }
}

/// Build services from configuration.
///
/// `USE_PERSISTENT_STORES=true` selects Postgres; otherwise state lives in memory.
pub async fn build_services(config: &WarehouseConfig) -> anyhow::Result<AppServices> {
    if config.use_persistent_stores {
        tracing::info!(
            host = %config.postgres.host,
            database = %config.postgres.database,
            "using persistent Postgres store"
        );
        build_persistent_services(config).await
    } else {
        tracing::info!("using in-memory store");
        Ok(AppServices::new(
            Arc::new(InMemoryWarehouseStore::new()),
            config.http.timeout,
        ))
    }
}

async fn build_persistent_services(config: &WarehouseConfig) -> anyhow::Result<AppServices> {
    let credentials = Credentials::load(&config.postgres.credentials_file)
        .context("loading Postgres credentials")?;

    let store = PostgresWarehouseStore::connect(&config.postgres, &credentials)
        .await
        .context("connecting to Postgres")?;
    store.migrate().await.context("applying schema")?;

    Ok(AppServices::new(Arc::new(store), config.http.timeout))
}
