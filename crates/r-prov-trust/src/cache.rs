//! ---
//! prov_section: "05-trust-certificates"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Trust certificate aggregation for execution drivers."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use r_prov_common::{now_micros_utc, TrustConfig};
use r_prov_metrics::DriverMetrics;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bundle::TrustBundle;
use crate::source::TrustCertificateSource;
use crate::{Result, TrustError};

/// Configuration key whose change signals that trust certificates were updated.
pub const TRUST_LAST_UPDATED_KEY: &str = "ssl.trust.last.updated";

/// Shortest reconciliation period the cache task accepts.
pub const MIN_RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

/// Push notification emitted when a configuration entry changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationChange {
    /// Key of the changed entry.
    pub key: String,
    /// New value, absent when the entry was removed.
    pub value: Option<String>,
}

impl ConfigurationChange {
    /// Notification announcing a trust certificate update.
    pub fn trust_updated() -> Self {
        Self {
            key: TRUST_LAST_UPDATED_KEY.to_string(),
            value: Some(now_micros_utc().to_string()),
        }
    }

    fn concerns_trust(&self) -> bool {
        self.key == TRUST_LAST_UPDATED_KEY
    }
}

/// Summary of one completed refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    /// Certificates returned by the query.
    pub fetched: usize,
    /// Certificates in the published bundle.
    pub total: usize,
}

enum CacheCommand {
    Refresh(Option<oneshot::Sender<Result<RefreshReport>>>),
    Shutdown,
}

/// Handle to the cache task.
///
/// Refresh triggers (explicit requests, configuration changes, and the
/// reconciliation interval) all funnel into the owning task, which is the only
/// writer of the published bundle.
pub struct TrustCertificateCache {
    bundle: watch::Receiver<TrustBundle>,
    commands: mpsc::Sender<CacheCommand>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TrustCertificateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustCertificateCache")
            .field("bundle", &*self.bundle.borrow())
            .finish_non_exhaustive()
    }
}

impl TrustCertificateCache {
    /// Start the cache task. The first refresh runs before any queued command
    /// is served. Must be called from within a Tokio runtime.
    pub fn spawn(
        config: &TrustConfig,
        source: Arc<dyn TrustCertificateSource>,
        changes: broadcast::Receiver<ConfigurationChange>,
    ) -> Self {
        Self::spawn_with_metrics(config, source, changes, None)
    }

    /// Start the cache task, recording refreshes in the supplied metrics.
    pub fn spawn_with_metrics(
        config: &TrustConfig,
        source: Arc<dyn TrustCertificateSource>,
        changes: broadcast::Receiver<ConfigurationChange>,
        metrics: Option<DriverMetrics>,
    ) -> Self {
        let (publisher, bundle) = watch::channel(TrustBundle::empty());
        let (commands, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let reconcile_every = config.reconcile_interval.max(MIN_RECONCILE_INTERVAL);
        if reconcile_every != config.reconcile_interval {
            warn!(
                configured_ms = config.reconcile_interval.as_millis() as u64,
                applied_ms = reconcile_every.as_millis() as u64,
                "trust reconcile interval below minimum; clamping"
            );
        }
        let actor = CacheActor {
            source,
            certificates: BTreeSet::new(),
            watermark_micros: 0,
            publisher,
            metrics,
        };
        let task = tokio::spawn(actor.run(command_rx, changes, reconcile_every));
        Self {
            bundle,
            commands,
            task: Mutex::new(Some(task)),
        }
    }

    /// Latest published bundle; empty until the first refresh completes.
    pub fn current_bundle(&self) -> TrustBundle {
        self.bundle.borrow().clone()
    }

    /// Receiver notified whenever a new bundle is published.
    pub fn subscribe(&self) -> watch::Receiver<TrustBundle> {
        self.bundle.clone()
    }

    /// Enqueue a refresh without waiting for it.
    pub fn request_refresh(&self) -> Result<()> {
        match self.commands.try_send(CacheCommand::Refresh(None)) {
            Ok(()) => Ok(()),
            // A queued refresh already covers this request.
            Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TrustError::Stopped),
        }
    }

    /// Enqueue a refresh and wait until it has been published.
    pub async fn refresh_now(&self) -> Result<RefreshReport> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(CacheCommand::Refresh(Some(tx)))
            .await
            .map_err(|_| TrustError::Stopped)?;
        rx.await.map_err(|_| TrustError::Stopped)?
    }

    /// Stop the cache task and wait for it to exit.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(CacheCommand::Shutdown).await;
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "trust cache task ended abnormally");
            }
        }
    }
}

impl Drop for TrustCertificateCache {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

struct CacheActor {
    source: Arc<dyn TrustCertificateSource>,
    certificates: BTreeSet<String>,
    watermark_micros: i64,
    publisher: watch::Sender<TrustBundle>,
    metrics: Option<DriverMetrics>,
}

impl CacheActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<CacheCommand>,
        mut changes: broadcast::Receiver<ConfigurationChange>,
        reconcile_every: Duration,
    ) {
        let _ = self.refresh().await;
        let mut ticker = interval_at(Instant::now() + reconcile_every, reconcile_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut changes_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(CacheCommand::Refresh(reply)) => {
                        let result = self.refresh().await;
                        if let Some(reply) = reply {
                            let _ = reply.send(result);
                        }
                    }
                    Some(CacheCommand::Shutdown) | None => {
                        debug!("trust cache shutdown received");
                        break;
                    }
                },
                change = changes.recv(), if changes_open => match change {
                    Ok(change) if change.concerns_trust() => {
                        debug!(key = %change.key, "trust configuration change received");
                        let _ = self.refresh().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "configuration notifications lagged; refreshing");
                        let _ = self.refresh().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("configuration notifications closed; relying on reconciliation");
                        changes_open = false;
                    }
                },
                _ = ticker.tick() => {
                    let _ = self.refresh().await;
                }
            }
        }
    }

    async fn refresh(&mut self) -> Result<RefreshReport> {
        // Capture the time before querying so updates racing the query are
        // picked up by the next refresh.
        let started_micros = now_micros_utc();
        let outcome = self.collect(started_micros).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_trust_refresh(outcome.as_ref().ok().map(|report| report.total));
        }
        outcome
    }

    async fn collect(&mut self, started_micros: i64) -> Result<RefreshReport> {
        let updated = match self.source.updated_since(self.watermark_micros).await {
            Ok(updated) => updated,
            Err(err) => {
                warn!(
                    error = %err,
                    watermark = self.watermark_micros,
                    "exception during trust certificate loading"
                );
                return Err(err);
            }
        };
        let fetched = updated.len();
        let mut next = self.certificates.clone();
        next.extend(updated.into_iter().map(|cert| cert.certificate));
        let bundle = TrustBundle::encode(&next)?;

        self.certificates = next;
        self.watermark_micros = started_micros;
        self.publisher.send_replace(bundle);
        info!(
            fetched,
            total = self.certificates.len(),
            "trust certificate bundle published"
        );
        Ok(RefreshReport {
            fetched,
            total: self.certificates.len(),
        })
    }
}
