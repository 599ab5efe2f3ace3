//! CIFS publisher - post-build step that copies artifacts to a share
//!
//! Runs the whole publish: status gate, share resolution, connection, then
//! every entry in declared order. The step always completes; a transfer that
//! breaks down marks the build unstable instead of failing the pipeline.

use crate::core::config::{Entry, PublisherConfig, ShareDefinition};
use crate::core::error::PublishResult;
use crate::core::registry::ShareRegistry;
use crate::core::traits::{BuildContext, BuildLog, BuildStatus, BuildStep};
use crate::security::CredentialMasker;
use crate::transfer::entry_copier::{EntryCopier, TransferFailure};
use crate::transfer::sink::{ConnectOptions, ShareConnector};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

/// Diagnostic logged when the configured share cannot be resolved
pub const SHARE_NOT_FOUND_MESSAGE: &str =
    "Could not retrieve the selected share, please check global configuration for CIFS shares.";

/// Overall result of a publish run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// Build status gate: nothing was attempted
    Skipped,
    /// Configured share is not registered; nothing was transferred
    ShareNotFound,
    /// Every entry was processed (individual files may have failed)
    Completed,
    /// Transfer aborted by an uncaught error; build marked unstable
    Degraded,
}

/// Result of copying one entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub source_pattern: String,
    pub destination_template: String,
    pub files_copied: usize,
    pub failures: Vec<TransferFailure>,
}

/// Report of one publish invocation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub run_id: Uuid,
    pub status: PublishStatus,
    pub share: Option<String>,
    pub files_copied: usize,
    pub entries: Vec<TransferOutcome>,
    /// Detail of the error that degraded the run, credentials masked
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PublishReport {
    fn new(run_id: Uuid, status: PublishStatus) -> Self {
        Self {
            run_id,
            status,
            share: None,
            files_copied: 0,
            entries: Vec::new(),
            error: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Every per-file failure across all entries
    pub fn failures(&self) -> impl Iterator<Item = &TransferFailure> {
        self.entries.iter().flat_map(|e| e.failures.iter())
    }

    pub fn is_degraded(&self) -> bool {
        self.status == PublishStatus::Degraded
    }
}

/// Publishes a job's entries to a registered share
pub struct PublishCoordinator {
    registry: Arc<ShareRegistry>,
    connector: Arc<dyn ShareConnector>,
    config: PublisherConfig,
}

impl PublishCoordinator {
    pub fn new(
        registry: Arc<ShareRegistry>,
        connector: Arc<dyn ShareConnector>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            registry,
            connector,
            config,
        }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Whether a build that ended with `status` is published at all
    pub fn applies_to(status: BuildStatus) -> bool {
        !matches!(status, BuildStatus::Failure | BuildStatus::Aborted)
    }

    /// Run the publish against a finished build.
    ///
    /// Never fails: problems are logged to `log`, reflected in the returned
    /// report and, for uncaught transfer errors, in the build status.
    pub async fn publish(&self, build: &mut BuildContext, log: &dyn BuildLog) -> PublishReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("publish", %run_id, backend = self.connector.name());

        async move {
            let started = Instant::now();
            let mut report = self.run(run_id, build, log).await;
            report.duration_ms = duration_ms(started.elapsed());
            info!(status = ?report.status, files = report.files_copied, "publish finished");
            report
        }
        .instrument(span)
        .await
    }

    async fn run(&self, run_id: Uuid, build: &mut BuildContext, log: &dyn BuildLog) -> PublishReport {
        if !Self::applies_to(build.status()) {
            info!(build_status = %build.status(), "build did not succeed, skipping publish");
            return PublishReport::new(run_id, PublishStatus::Skipped);
        }

        let share = match self.registry.resolve(self.config.share.as_deref()) {
            Ok(share) => share,
            Err(e) => {
                warn!(error = %e, "share resolution failed");
                log.error(SHARE_NOT_FOUND_MESSAGE);
                return PublishReport::new(run_id, PublishStatus::ShareNotFound);
            }
        };

        let masker = CredentialMasker::for_share(&share);
        let mut report = PublishReport::new(run_id, PublishStatus::Completed);
        report.share = Some(share.display_url());

        log.info(&format!("Connecting to {}", share.server));
        let outcome = self.transfer(&share, build, log, &masker, &mut report).await;

        if let Err(e) = outcome {
            let detail = masker.mask(&e.to_string());
            error!(code = e.code(), error = %detail, "publish aborted");
            log.error("Failed to upload files");
            log.error(&detail);
            for action in e.suggested_actions() {
                log.info(&format!("  💡 {}", action));
            }
            build.set_status(BuildStatus::Unstable);
            report.status = PublishStatus::Degraded;
            report.error = Some(detail);
        }

        log.info(&format!("Transferred {} files.", report.files_copied));
        report
    }

    async fn transfer(
        &self,
        share: &ShareDefinition,
        build: &BuildContext,
        log: &dyn BuildLog,
        masker: &CredentialMasker,
        report: &mut PublishReport,
    ) -> PublishResult<()> {
        if let Some(wins) = &self.config.wins_server {
            info!(wins_server = %wins, backend = self.connector.name(), "WINS server passed to backend");
            log.info(&format!(
                "WINS server {} configured; the {} backend resolves {} itself",
                wins,
                self.connector.name(),
                share.server
            ));
        }

        let options = ConnectOptions::authenticated(self.config.wins_server.clone());
        let sink = self.connector.connect(share, &options).await?;
        info!(remote = %sink.target(), share = %share.display_url(), "connected");

        for entry in &self.config.entries {
            let mut copier = EntryCopier::new(sink.as_ref(), build);
            let result = copier.copy(entry).await;

            let files_copied = copier.files_copied();
            let failures = copier.into_failures();
            for failure in &failures {
                log.error(&masker.mask(&format!(
                    "Failed to transfer {}: {}",
                    failure.local_path.display(),
                    failure.message
                )));
            }

            report.files_copied += files_copied;
            report.entries.push(outcome(entry, files_copied, failures));
            result?;
        }

        Ok(())
    }
}

fn outcome(entry: &Entry, files_copied: usize, failures: Vec<TransferFailure>) -> TransferOutcome {
    TransferOutcome {
        source_pattern: entry.source_pattern.clone(),
        destination_template: entry.destination_template.clone(),
        files_copied,
        failures,
    }
}

#[async_trait]
impl BuildStep for PublishCoordinator {
    fn name(&self) -> &str {
        "cifs-publisher"
    }

    fn should_run(&self, status: BuildStatus) -> bool {
        Self::applies_to(status)
    }

    async fn execute(&self, build: &mut BuildContext, log: &dyn BuildLog) -> anyhow::Result<bool> {
        self.publish(build, log).await;
        Ok(true)
    }
}

impl std::fmt::Debug for PublishCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishCoordinator")
            .field("backend", &self.connector.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Whole milliseconds, saturating instead of wrapping
fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
