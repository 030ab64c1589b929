//! Queue drain on regained connectivity.

use std::sync::Arc;

use linereport_core::QueuedReport;

use crate::api::ReportSubmitter;
use crate::connectivity::ConnectivitySource;
use crate::store::QueueStore;

/// Outcome of one flush pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub retained: usize,
}

/// Drains the pending queue when connectivity is present.
pub struct FlushCoordinator {
    store: QueueStore,
    source: Arc<dyn ConnectivitySource>,
    submitter: Arc<dyn ReportSubmitter>,
}

impl FlushCoordinator {
    pub fn new(
        store: QueueStore,
        source: Arc<dyn ConnectivitySource>,
        submitter: Arc<dyn ReportSubmitter>,
    ) -> Self {
        Self {
            store,
            source,
            submitter,
        }
    }

    /// Attempt delivery of every pending report, keeping the failures.
    ///
    /// Safe to call speculatively (app start, screen focus, connectivity
    /// events): when offline or empty it returns without touching storage.
    /// Items are attempted in enqueue order, each exactly once per pass; a
    /// persistently rejected report is retried on a future pass rather than
    /// looping here. Per-item failures are logged and swallowed so one bad
    /// item cannot abort the rest; storage failures propagate. The retained
    /// set is written back once, at the end of the pass.
    pub async fn flush_queue_if_online(&self) -> anyhow::Result<FlushSummary> {
        if !self.source.fetch().await.is_online() {
            return Ok(FlushSummary::default());
        }

        let queue = self.store.read().await?;
        if queue.is_empty() {
            return Ok(FlushSummary::default());
        }

        let attempted = queue.len();
        let mut remaining: Vec<QueuedReport> = Vec::new();

        for report in queue {
            match self.submitter.submit(&report).await {
                Ok(form) => {
                    tracing::info!(id = %report.id, form_id = form.id, "queued report delivered");
                }
                Err(err) => {
                    tracing::warn!(id = %report.id, "delivery failed, keeping report queued: {err}");
                    remaining.push(report);
                }
            }
        }

        let summary = FlushSummary {
            attempted,
            delivered: attempted - remaining.len(),
            retained: remaining.len(),
        };
        self.store.write(&remaining).await?;

        tracing::info!(
            attempted = summary.attempted,
            delivered = summary.delivered,
            retained = summary.retained,
            "flush pass complete"
        );
        Ok(summary)
    }
}
