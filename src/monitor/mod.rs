// Monitor loop — repeated sweeps with error backoff and a guaranteed
// final flush.
//
// The loop is a small state machine: load state, then alternate between
// polling sweeps and (on failure) exponential backoff, until either the
// mode says stop (one-click), the consecutive-error ceiling is hit, or the
// process is interrupted. Every exit path runs one last forced flush so
// buffered rows survive a shutdown.
//
// One task, sequential I/O throughout. Multiple monitor processes may
// share a spreadsheet; the batcher's pre-flush re-read is the only
// cross-instance coordination.

pub mod batcher;
pub mod sweep;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::archive::Archive;
use crate::config::Config;
use crate::graph::client::GraphClient;
use crate::graph::traits::CommentSource;
use crate::ledger::sheets::SheetsLedger;
use crate::ledger::Ledger;
use self::batcher::UploadBatcher;

/// Consecutive sweep failures tolerated before the monitor gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Ceiling on the error backoff delay.
const MAX_BACKOFF_SECS: u64 = 3600;

/// Whether the monitor runs one sweep or loops indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One full sweep, one final flush, done.
    OneClick,
    /// Sweep, sleep `interval`, repeat until interrupted.
    Continuous,
}

/// Tunables for one monitor instance, resolved once at the boundary.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Full Graph API object id (`<page>_<post>`).
    pub post_id: String,
    /// Seconds between polling cycles in continuous mode.
    pub interval: u64,
    /// Row-count threshold for batch uploads.
    pub batch_size: usize,
    /// Seconds since the last upload that trigger a time-based flush.
    pub upload_interval: u64,
    /// Comments requested per page.
    pub page_size: u32,
}

pub struct Monitor {
    source: Arc<dyn CommentSource>,
    archive: Archive,
    batcher: UploadBatcher,
    known_ids: HashSet<String>,
    last_message: Option<String>,
    cfg: MonitorConfig,
    mode: RunMode,
}

impl Monitor {
    /// Load monitor state: known ids from the ledger (empty set when the
    /// store can't be read — the pre-flush re-validation still protects
    /// against duplicates) and the last post snapshot from the archive.
    pub async fn start(
        source: Arc<dyn CommentSource>,
        ledger: Arc<dyn Ledger>,
        archive: Archive,
        cfg: MonitorConfig,
        mode: RunMode,
    ) -> Result<Self> {
        let known_ids = match ledger.existing_comment_ids().await {
            Ok(ids) => {
                info!(count = ids.len(), "Loaded known comment ids from ledger");
                ids
            }
            Err(e) => {
                warn!(error = %e, "Could not load known ids from ledger, starting empty");
                HashSet::new()
            }
        };

        let last_message = match archive.load_post_snapshot(&cfg.post_id) {
            Ok(snapshot) => snapshot.map(|content| content.message),
            Err(e) => {
                warn!(error = %e, "Could not load post snapshot");
                None
            }
        };

        let batcher = UploadBatcher::new(
            ledger,
            cfg.batch_size,
            Duration::from_secs(cfg.upload_interval),
        );

        Ok(Self {
            source,
            archive,
            batcher,
            known_ids,
            last_message,
            cfg,
            mode,
        })
    }

    /// Fetch the post's content and snapshot it when it changed (or no
    /// snapshot existed). Errors are absorbed — content tracking is
    /// incidental to comment collection.
    async fn check_post_content(&mut self) {
        let content = match self.source.post_content(&self.cfg.post_id).await {
            Ok(Some(content)) => content,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Post content check failed");
                return;
            }
        };

        if self.last_message.as_deref() == Some(content.message.as_str()) {
            return;
        }

        if let Err(e) = self.archive.save_post_snapshot(&self.cfg.post_id, &content) {
            warn!(error = %e, "Failed to save post snapshot");
        } else {
            info!("Post content updated and saved");
        }
        self.last_message = Some(content.message);
    }

    /// Run polling cycles until the mode or the error ceiling stops them.
    ///
    /// Does NOT run the final flush — callers pair this with
    /// `final_flush`, so the flush also happens when this future is
    /// dropped by an interrupt race.
    pub async fn run_cycles(&mut self) -> Result<()> {
        info!(post_id = %self.cfg.post_id, "Starting to monitor post");

        self.check_post_content().await;

        let mut consecutive_errors = 0u32;

        loop {
            let sweep = sweep::run_sweep(
                self.source.as_ref(),
                &mut self.known_ids,
                &self.archive,
                &mut self.batcher,
                &self.cfg.post_id,
                self.cfg.page_size,
            )
            .await;

            match sweep {
                Ok(new_count) => {
                    if new_count > 0 {
                        info!(new_count = new_count, "Found new receipt comments");
                        self.check_post_content().await;
                    }

                    // End-of-cycle flush, regardless of size/time triggers.
                    self.batcher.maybe_flush(true).await;

                    consecutive_errors = 0;

                    if self.mode == RunMode::OneClick {
                        info!("One-click sweep complete");
                        return Ok(());
                    }

                    tokio::time::sleep(Duration::from_secs(self.cfg.interval)).await;
                }
                Err(e) => {
                    consecutive_errors += 1;

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!(
                            errors = consecutive_errors,
                            "Too many consecutive errors, stopping monitor"
                        );
                        return Err(e.context(format!(
                            "{MAX_CONSECUTIVE_ERRORS} consecutive polling failures"
                        )));
                    }

                    let backoff = self
                        .cfg
                        .interval
                        .saturating_mul(1 << consecutive_errors)
                        .min(MAX_BACKOFF_SECS);

                    error!(
                        error = %e,
                        attempt = consecutive_errors,
                        max_attempts = MAX_CONSECUTIVE_ERRORS,
                        backoff_secs = backoff,
                        "Polling sweep failed, backing off"
                    );

                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                }
            }
        }
    }

    /// Force-flush whatever is still buffered. Runs on every exit path.
    pub async fn final_flush(&mut self) {
        if self.batcher.is_empty() {
            return;
        }
        info!("Uploading remaining comments before exit");
        self.batcher.maybe_flush(true).await;
    }

    /// Run to completion: cycles plus the final forced flush.
    pub async fn run(&mut self) -> Result<()> {
        let result = self.run_cycles().await;
        self.final_flush().await;
        result
    }
}

/// Assemble the production pipeline and run it to a terminal status string.
///
/// This is the single entry point shared by the CLI and the web trigger.
/// Ctrl-C interrupts the cycles but still gets the final flush.
pub async fn run_pipeline(
    config: &Config,
    target_post_id: &str,
    spreadsheet_id: &str,
    worksheet: &str,
    mode: RunMode,
) -> Result<String> {
    let post_id = format!("{}_{}", config.page_id, target_post_id);

    let source = Arc::new(GraphClient::new(
        &config.graph_api_token,
        &config.graph_api_version,
    )?);

    let ledger: Arc<dyn Ledger> = Arc::new(
        SheetsLedger::connect(&config.service_account_file, spreadsheet_id, worksheet).await?,
    );

    let archive = Archive::open(&config.data_dir)?;

    let cfg = MonitorConfig {
        post_id,
        interval: config.interval,
        batch_size: config.batch_size,
        upload_interval: config.upload_interval,
        page_size: config.page_size,
    };

    let mut monitor = Monitor::start(source, ledger, archive, cfg, mode)
        .await
        .context("Failed to initialize monitor")?;

    // Race the cycles against Ctrl-C; either way the futures are dropped
    // before the final flush runs.
    let outcome = tokio::select! {
        result = monitor.run_cycles() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(result) => {
            monitor.final_flush().await;
            result.map(|()| "Success".to_string())
        }
        None => {
            info!("Monitor stopped by user, uploading final batch");
            monitor.final_flush().await;
            Ok("Monitor Stopped By User".to_string())
        }
    }
}
