//! Shared application state injected into every handler via `State<Arc<AppState>>`.

use contractor_core::ports::{Clock, IdGenerator, NullNotifier, Notifier, Store};
use contractor_store::health::HealthMonitor;
use contractor_store::{PostgresStore, Repository};

pub struct AppState {
    pub store: PostgresStore,
    pub repo: Repository,
    pub health: HealthMonitor,
    pub clock: Box<dyn Clock>,
    pub ids: Box<dyn IdGenerator>,
    pub notifier: Box<dyn Notifier>,
    pub version: String,
}

impl AppState {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            store: PostgresStore::new(pool.clone()),
            repo: Repository::new(pool.clone()),
            health: HealthMonitor::new(pool),
            clock: Box::new(contractor_core::ports::SystemClock),
            ids: Box::new(contractor_core::ports::UuidGenerator),
            notifier: Box::new(NullNotifier),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Begin a transaction against the coordination core's `Store` port.
    pub async fn begin(&self) -> anyhow::Result<Box<dyn contractor_core::ports::Tx>> {
        self.store.begin().await
    }
}
