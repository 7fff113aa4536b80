use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::AppConfig,
    orders::{
        file_store::FileStore, notifier::Notifier, repository::OrderRepository,
        service::OrderService,
    },
    rate_limit::{build_upload_limiter, UploadRateLimiter},
    storage::ObjectStorage,
};

/// Provider handles are constructed once at startup; `None` means the provider
/// is not configured for this process.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub orders: Option<Arc<dyn OrderRepository>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub upload_limiter: Arc<UploadRateLimiter>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Option<Arc<dyn ObjectStorage>>,
        orders: Option<Arc<dyn OrderRepository>>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let upload_limiter = build_upload_limiter(
            config.upload_rate_limit_max,
            Duration::from_secs(config.upload_rate_limit_window_secs),
        );
        Self {
            config: Arc::new(config),
            storage,
            orders,
            notifier,
            upload_limiter,
        }
    }

    /// The submission pipeline, available once both object storage and the
    /// order store are configured.
    pub fn order_service(&self) -> Option<OrderService> {
        let storage = self.storage.clone()?;
        let orders = self.orders.clone()?;
        let files = FileStore::new(storage, self.config.storage_namespace.clone());
        Some(OrderService::new(files, orders, self.notifier.clone()))
    }
}
