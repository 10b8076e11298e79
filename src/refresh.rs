// 🔄 Refresh Pipeline - fetch → merge → reconcile → summarize
//
// 1. Fetch registry + rates concurrently (either failure aborts, nothing written)
// 2. Merge with the GDP estimator, stamped with one batch time
// 3. Reconcile and commit under the store lock
// 4. Render the summary from the in-memory reconciled set (best-effort,
//    on the blocking pool)
//
// A gate keeps at most one refresh in flight. Queries only take the store
// lock, so they run freely around a refresh and never see a partial batch.

use crate::db::CountryStore;
use crate::error::{LedgerError, LedgerResult};
use crate::merger::merge;
use crate::query::latest_refresh;
use crate::reconciliation::{ReconciliationEngine, ReconciliationReport};
use crate::report::{ReportRenderer, SummaryReport};
use crate::upstream::UpstreamClient;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Lock the shared store, surfacing poisoning as an error.
pub fn lock_store<S>(store: &Mutex<S>) -> LedgerResult<MutexGuard<'_, S>> {
    store.lock().map_err(|_| LedgerError::StorePoisoned)
}

/// Two independently-reported results of one refresh.
#[derive(Debug)]
pub struct RefreshOutcome {
    /// Batch start time stamped on every touched record
    pub refreshed_at: DateTime<Utc>,

    pub reconciliation: ReconciliationReport,

    /// Path of the rendered summary, or why rendering failed
    pub summary: LedgerResult<PathBuf>,
}

pub struct Refresher<S> {
    upstream: UpstreamClient,
    store: Arc<Mutex<S>>,
    renderer: Arc<dyn ReportRenderer>,
    summary_path: PathBuf,
    engine: ReconciliationEngine,
    gate: tokio::sync::Mutex<()>,
}

impl<S: CountryStore + Send> Refresher<S> {
    pub fn new(
        upstream: UpstreamClient,
        store: Arc<Mutex<S>>,
        renderer: Arc<dyn ReportRenderer>,
        summary_path: impl Into<PathBuf>,
    ) -> Self {
        Refresher {
            upstream,
            store,
            renderer,
            summary_path: summary_path.into(),
            engine: ReconciliationEngine::new(),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    /// Run the pipeline with an entropy-seeded GDP factor source.
    pub async fn refresh(&self) -> LedgerResult<RefreshOutcome> {
        let mut rng = StdRng::from_entropy();
        self.refresh_with_rng(&mut rng).await
    }

    pub async fn refresh_with_rng<R: Rng + Send>(&self, rng: &mut R) -> LedgerResult<RefreshOutcome> {
        let _in_flight = self.gate.lock().await;

        let (registry, rates) = self.upstream.fetch_both().await.map_err(|e| {
            warn!(error = %e, "refresh aborted: upstream fetch failed");
            e
        })?;
        info!(
            countries = registry.len(),
            rates = rates.rates.len(),
            "upstream data fetched"
        );

        let (refreshed_at, reconciliation) = {
            let mut store = lock_store(&self.store)?;

            // Never stamp a batch earlier than what is already stored
            let previous = latest_refresh(&store.all()?);
            let refreshed_at = Utc::now().max(previous);

            let merged = merge(&registry, &rates, refreshed_at, rng);
            let report = self.engine.reconcile(&mut *store, merged)?;
            (refreshed_at, report)
        };

        let summary = self.render_summary(&reconciliation).await;

        Ok(RefreshOutcome {
            refreshed_at,
            reconciliation,
            summary,
        })
    }

    /// Font loading, PNG encoding and the file write are blocking work, so
    /// they run on the blocking pool.
    async fn render_summary(&self, reconciliation: &ReconciliationReport) -> LedgerResult<PathBuf> {
        let lines = SummaryReport::from_records(&reconciliation.records).lines();
        let renderer = Arc::clone(&self.renderer);
        let path = self.summary_path.clone();

        let rendered = tokio::task::spawn_blocking(move || renderer.render_to(&lines, &path))
            .await
            .unwrap_or_else(|e| Err(LedgerError::Render(format!("render task failed: {e}"))));

        match rendered {
            Ok(()) => {
                info!(path = %self.summary_path.display(), "summary image written");
                Ok(self.summary_path.clone())
            }
            Err(e) => {
                warn!(error = %e, "summary image not generated; refresh still succeeds");
                Err(e)
            }
        }
    }
}
