//! Pending-report queue management.
//!
//! Enqueueing is a read-modify-write over the whole persisted sequence. Two
//! enqueues racing across their await points can lose an update; with one
//! enqueue per submit gesture on a single device this is an accepted
//! property of the design, not a guarded path.

use std::sync::Arc;

use linereport_core::{QueuedReport, ReportDraft};

use crate::connectivity::ConnectivitySource;
use crate::session::Session;
use crate::store::QueueStore;

/// Enqueue/list operations over the durable queue store.
#[derive(Clone)]
pub struct ReportQueue {
    store: QueueStore,
    source: Arc<dyn ConnectivitySource>,
    session: Session,
}

impl ReportQueue {
    pub fn new(store: QueueStore, source: Arc<dyn ConnectivitySource>, session: Session) -> Self {
        Self {
            store,
            source,
            session,
        }
    }

    /// Queue a draft for later delivery, but only when offline.
    ///
    /// This is a gate, not an unconditional enqueue: when the link is
    /// currently online it returns `false` without touching storage, and the
    /// caller is expected to submit directly instead. When offline, the
    /// draft is enriched with the cached user identity, a fresh id and the
    /// enqueue timestamp, appended to the persisted queue, and `true` is
    /// returned.
    pub async fn enqueue_if_offline(&self, draft: ReportDraft) -> anyhow::Result<bool> {
        if self.source.fetch().await.is_online() {
            return Ok(false);
        }

        let user_id = self.session.resolve_user_id().await?;
        let report = QueuedReport::new(draft.with_user(user_id));

        let mut queue = self.store.read().await?;
        tracing::info!(
            id = %report.id,
            pending = queue.len() + 1,
            "queueing report for later delivery"
        );
        queue.push(report);
        self.store.write(&queue).await?;

        Ok(true)
    }

    /// Current pending reports (diagnostics/tests).
    pub async fn list(&self) -> anyhow::Result<Vec<QueuedReport>> {
        self.store.read().await
    }

    /// Drop all pending reports (administrative).
    pub async fn clear(&self) -> anyhow::Result<()> {
        self.store.clear().await
    }
}
