//! `linereport-client`
//!
//! **Responsibility:** offline-first submission core for the line-worker
//! reporting app.
//!
//! This crate provides:
//! - Durable queueing of report submissions (SQLite-backed)
//! - Connectivity observation and connectivity-triggered flush
//! - The wire adapter for the backend's form endpoints
//!
//! The UI, camera and auth flows are external collaborators; this crate is
//! the piece that guarantees a captured report eventually reaches the
//! backend, with at-least-once delivery semantics.

pub mod api;
pub mod config;
pub mod connectivity;
pub mod flush;
pub mod queue;
pub mod session;
pub mod store;

pub use api::{ApiClient, ReportSubmitter, SubmitError};
pub use config::ClientConfig;
pub use connectivity::{ConnectivityObserver, ConnectivitySource, HttpProbe, LinkState};
pub use flush::{FlushCoordinator, FlushSummary};
pub use queue::ReportQueue;
pub use session::Session;
pub use store::{KvStore, QueueStore};

use std::sync::Arc;

/// Composition root wiring the store, session, queue, flush coordinator and
/// connectivity observer together.
pub struct OfflineClient {
    pub store: KvStore,
    pub session: Session,
    pub api: Arc<ApiClient>,
    pub queue: Arc<ReportQueue>,
    pub flusher: Arc<FlushCoordinator>,
    pub observer: Arc<ConnectivityObserver>,
    probe: Arc<HttpProbe>,
    config: ClientConfig,
}

impl OfflineClient {
    /// Wire the client without a bearer credential.
    pub fn new(config: ClientConfig) -> Self {
        Self::build(config, None)
    }

    /// Wire the client with a bearer credential supplied by the auth
    /// collaborator.
    pub fn with_token(config: ClientConfig, token: impl Into<String>) -> Self {
        Self::build(config, Some(token.into()))
    }

    fn build(config: ClientConfig, token: Option<String>) -> Self {
        let store = match &config.db_path {
            Some(path) => KvStore::at_path(path.clone()),
            None => KvStore::new(),
        };
        let session = Session::new(store.clone());
        let queue_store = QueueStore::new(store.clone());

        let probe = Arc::new(HttpProbe::new(config.api_url.clone(), config.probe_timeout));
        let source: Arc<dyn ConnectivitySource> = probe.clone();

        let api = Arc::new(match token {
            Some(token) => ApiClient::with_token(&config, token),
            None => ApiClient::new(&config),
        });

        let queue = Arc::new(ReportQueue::new(
            queue_store.clone(),
            source.clone(),
            session.clone(),
        ));
        let flusher = Arc::new(FlushCoordinator::new(
            queue_store,
            source.clone(),
            api.clone(),
        ));
        let observer = Arc::new(ConnectivityObserver::new(source));

        Self {
            store,
            session,
            api,
            queue,
            flusher,
            observer,
            probe,
            config,
        }
    }

    /// Start background connectivity polling, register the flush trigger,
    /// and make one opportunistic flush attempt for anything queued on a
    /// previous run.
    pub async fn start(&self) {
        let _ = self.probe.clone().start(self.config.probe_period);
        self.observer.subscribe(self.flusher.clone());

        if let Err(err) = self.flusher.flush_queue_if_online().await {
            tracing::warn!("startup flush failed: {err:#}");
        }
    }

    /// Stop background polling. The subscribe guard itself is process-wide
    /// and is not reset.
    pub fn stop(&self) {
        self.probe.stop();
    }
}
