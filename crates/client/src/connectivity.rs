//! Connectivity detection and the flush trigger.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};

use crate::flush::FlushCoordinator;

/// A point-in-time snapshot of the device's network state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    pub is_connected: bool,
    /// `None` when reachability has not been determined yet.
    pub is_internet_reachable: Option<bool>,
}

impl LinkState {
    pub fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: Some(true),
        }
    }

    pub fn offline() -> Self {
        Self {
            is_connected: false,
            is_internet_reachable: Some(false),
        }
    }

    /// Both flags must be affirmative. A connected link whose internet
    /// reachability is unknown or false (captive portal, dead uplink) counts
    /// as offline for queueing purposes.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable == Some(true)
    }
}

/// Source of connectivity information: a point-in-time check plus a stream
/// of state transitions. Implemented by [`HttpProbe`] in production and by
/// stubs in tests.
#[async_trait]
pub trait ConnectivitySource: Send + Sync {
    /// Current link state.
    async fn fetch(&self) -> LinkState;

    /// Register a listener for state transitions.
    fn events(&self) -> broadcast::Receiver<LinkState>;
}

/// Connectivity source that polls the backend health endpoint.
///
/// A responding health endpoint is the strongest signal available to this
/// client: it proves both that the link is up and that the API answers.
pub struct HttpProbe {
    api_url: String,
    client: reqwest::Client,
    timeout: Duration,
    events: broadcast::Sender<LinkState>,
    shutdown: Arc<Notify>,
}

impl HttpProbe {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            api_url: api_url.into(),
            client: reqwest::Client::new(),
            timeout,
            events,
            shutdown: Arc::new(Notify::new()),
        }
    }

    async fn probe(&self) -> LinkState {
        let url = format!("{}/health", self.api_url);
        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(resp) => LinkState {
                is_connected: true,
                is_internet_reachable: Some(resp.status().is_success()),
            },
            Err(err) => {
                tracing::debug!("health probe failed: {err}");
                LinkState::offline()
            }
        }
    }

    /// Start polling in the background, publishing state transitions.
    ///
    /// Missed ticks are skipped; only changes are published, so subscribers
    /// see transitions rather than a heartbeat.
    pub fn start(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let probe = self;
        let shutdown = probe.shutdown.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last: Option<LinkState> = None;

            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = interval.tick() => {
                        let state = probe.probe().await;
                        if last != Some(state) {
                            tracing::info!(
                                connected = state.is_connected,
                                reachable = ?state.is_internet_reachable,
                                "connectivity changed"
                            );
                            let _ = probe.events.send(state);
                            last = Some(state);
                        }
                    }
                }
            }
        })
    }

    /// Request graceful shutdown of the polling loop.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}

#[async_trait]
impl ConnectivitySource for HttpProbe {
    async fn fetch(&self) -> LinkState {
        self.probe().await
    }

    fn events(&self) -> broadcast::Receiver<LinkState> {
        self.events.subscribe()
    }
}

/// Watches the connectivity source and triggers queue flushes.
///
/// `subscribe` is guarded by a set-once flag with process lifetime: screens
/// may call it freely, only the first call registers a listener.
pub struct ConnectivityObserver {
    source: Arc<dyn ConnectivitySource>,
    subscribed: AtomicBool,
}

impl ConnectivityObserver {
    pub fn new(source: Arc<dyn ConnectivitySource>) -> Self {
        Self {
            source,
            subscribed: AtomicBool::new(false),
        }
    }

    /// Point-in-time connectivity check.
    pub async fn is_online(&self) -> bool {
        self.source.fetch().await.is_online()
    }

    /// Register the flush trigger. Idempotent: repeated calls are no-ops.
    ///
    /// Every connectivity event triggers a flush attempt; the coordinator
    /// re-checks reachability itself, so spurious wake-ups are cheap no-ops.
    /// The spawned task's handle is deliberately discarded: flushing is
    /// background reconciliation with log-only failure reporting, and the
    /// task ends when the source closes its event channel.
    pub fn subscribe(&self, coordinator: Arc<FlushCoordinator>) {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut events = self.source.events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(_) => {
                        if let Err(err) = coordinator.flush_queue_if_online().await {
                            tracing::warn!("connectivity-triggered flush failed: {err:#}");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("connectivity events lagged, skipped {skipped}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
