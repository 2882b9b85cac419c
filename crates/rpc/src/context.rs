//! Application context - wires everything together

use ekyc_bus::{BusError, EventBus, InMemoryBus};
use ekyc_decision::{DecisionEngine, DecisionError};
use ekyc_guard::{CacheStore, IdempotencyGuard, MemoryCache, RateLimiter};
use ekyc_store::{SessionStore, StoreError};
use ekyc_workflow::{ResultIngestor, SessionWorkflow};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::AppConfig;
use crate::service::KycService;
use crate::worker::{VerificationWorker, WorkerRunner};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Decision config error: {0}")]
    Decision(#[from] DecisionError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

/// Application context - wires together all components
pub struct AppContext {
    pub config: AppConfig,
    pub store: SessionStore,
    pub bus: InMemoryBus,
    pub workflow: Arc<SessionWorkflow>,
    pub service: KycService,
}

impl AppContext {
    /// Open the store, build the engine and start result ingestion
    pub async fn new(config: AppConfig) -> Result<Self, ContextError> {
        let store = SessionStore::connect(&config.database_url).await?;
        Self::with_store(config, store).await
    }

    pub async fn with_store(config: AppConfig, store: SessionStore) -> Result<Self, ContextError> {
        let bus = InMemoryBus::new(config.bus.policy());
        let shared: Arc<dyn EventBus> = Arc::new(bus.clone());

        let engine = Arc::new(DecisionEngine::new(
            config.decision.clone(),
            shared.clone(),
            &config.service_name,
        )?);
        let workflow = Arc::new(SessionWorkflow::new(
            store.clone(),
            shared.clone(),
            engine,
            &config.service_name,
        ));

        Arc::new(ResultIngestor::new(workflow.clone()))
            .subscribe(&bus)
            .await?;

        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let service = KycService::new(
            workflow.clone(),
            IdempotencyGuard::with_ttl(cache.clone(), config.idempotency_ttl()),
            RateLimiter::new(cache, config.rate_limit),
            config.request_timeout(),
        );

        tracing::info!(
            service = %config.service_name,
            database = %config.database_url,
            "Context ready"
        );

        Ok(Self {
            config,
            store,
            bus,
            workflow,
            service,
        })
    }

    /// Attach a verification worker to the bus
    pub async fn start_worker(
        &self,
        worker: Arc<dyn VerificationWorker>,
    ) -> Result<(), ContextError> {
        let kind = worker.kind();
        let shared: Arc<dyn EventBus> = Arc::new(self.bus.clone());
        Arc::new(WorkerRunner::new(worker, shared)).start().await?;
        tracing::info!(kind = %kind, "Worker started");
        Ok(())
    }

    /// Wait for in-flight deliveries to finish; false on timeout
    pub async fn settle(&self, timeout: Duration) -> bool {
        self.bus.wait_idle(timeout).await
    }

    pub fn shutdown(&self) {
        self.bus.close();
    }
}
