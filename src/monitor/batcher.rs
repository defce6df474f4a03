// Upload batcher — buffers comment rows and flushes them to the ledger.
//
// A flush fires when the batch is full, when the caller forces it (end of
// a polling cycle, shutdown), or when enough time has passed since the
// last successful upload. Immediately before appending, the existing-id
// set is re-read from the ledger and already-present rows are dropped —
// another monitor instance may have uploaded them since we buffered.
//
// A failed flush never loses data: the batch is kept for the next trigger
// and the error is logged, not propagated. The ledger's own append retry
// (bounded backoff) has already run by the time we see the failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::ledger::{CommentRow, Ledger};

pub struct UploadBatcher {
    ledger: Arc<dyn Ledger>,
    batch: Vec<CommentRow>,
    batch_size: usize,
    upload_interval: Duration,
    last_upload: Instant,
}

impl UploadBatcher {
    pub fn new(ledger: Arc<dyn Ledger>, batch_size: usize, upload_interval: Duration) -> Self {
        Self {
            ledger,
            batch: Vec::new(),
            batch_size,
            upload_interval,
            last_upload: Instant::now(),
        }
    }

    /// Buffer a row for the next flush.
    pub fn push(&mut self, row: CommentRow) {
        info!(
            comment_id = %row.comment_id,
            batch_len = self.batch.len() + 1,
            "Comment row buffered for upload"
        );
        self.batch.push(row);
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Flush the batch if a trigger condition holds. Returns true when a
    /// flush ran (including the degenerate case where re-validation showed
    /// every pending row already uploaded).
    pub async fn maybe_flush(&mut self, force: bool) -> bool {
        if self.batch.is_empty() {
            return false;
        }

        let due = self.batch.len() >= self.batch_size
            || force
            || self.last_upload.elapsed() >= self.upload_interval;
        if !due {
            return false;
        }

        // Re-validate against the authoritative store. If we can't read it,
        // don't guess — keep the batch and try again on the next trigger.
        let existing = match self.ledger.existing_comment_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not re-read ledger before flush, keeping batch");
                return false;
            }
        };

        let before = self.batch.len();
        self.batch.retain(|row| !existing.contains(&row.comment_id));
        let dropped = before - self.batch.len();
        if dropped > 0 {
            info!(
                dropped = dropped,
                "Skipping rows already present in the ledger"
            );
        }

        if self.batch.is_empty() {
            // A concurrent writer covered the whole batch. Nothing to
            // upload, but the flush itself succeeded.
            self.last_upload = Instant::now();
            return true;
        }

        let count = self.batch.len();
        info!(rows = count, "Uploading batch to ledger");

        match self.ledger.append_rows(&self.batch).await {
            Ok(()) => {
                info!(rows = count, "Batch uploaded");
                self.batch.clear();
                self.last_upload = Instant::now();
                true
            }
            Err(e) => {
                error!(error = %e, rows = count, "Batch upload failed, retaining rows");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    /// In-memory ledger that records appends and can be told to fail.
    #[derive(Default)]
    struct FakeLedger {
        existing: Mutex<HashSet<String>>,
        appended: Mutex<Vec<Vec<CommentRow>>>,
        fail_appends: AtomicBool,
        fail_reads: AtomicBool,
        reads: AtomicU32,
    }

    impl FakeLedger {
        fn seed(&self, id: &str) {
            self.existing.lock().unwrap().insert(id.to_string());
        }

        fn append_calls(&self) -> usize {
            self.appended.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Ledger for FakeLedger {
        async fn existing_comment_ids(&self) -> Result<HashSet<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                anyhow::bail!("ledger unreachable");
            }
            Ok(self.existing.lock().unwrap().clone())
        }

        async fn append_rows(&self, rows: &[CommentRow]) -> Result<()> {
            if self.fail_appends.load(Ordering::SeqCst) {
                anyhow::bail!("append failed");
            }
            let mut existing = self.existing.lock().unwrap();
            for row in rows {
                existing.insert(row.comment_id.clone());
            }
            self.appended.lock().unwrap().push(rows.to_vec());
            Ok(())
        }
    }

    fn row(id: &str) -> CommentRow {
        CommentRow {
            comment_id: id.to_string(),
            user_id: "u".to_string(),
            user_name: "n".to_string(),
            created_time: "t".to_string(),
            message: "m".to_string(),
            attachment_url: "https://img".to_string(),
            detected_time: "d".to_string(),
        }
    }

    fn batcher(ledger: Arc<FakeLedger>, batch_size: usize) -> UploadBatcher {
        UploadBatcher::new(ledger, batch_size, Duration::from_secs(300))
    }

    // ── Triggers ────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_batch_never_flushes() {
        let ledger = Arc::new(FakeLedger::default());
        let mut b = batcher(ledger.clone(), 3);

        assert!(!b.maybe_flush(false).await);
        assert!(!b.maybe_flush(true).await);
        assert_eq!(ledger.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn below_threshold_without_force_does_not_flush() {
        let ledger = Arc::new(FakeLedger::default());
        let mut b = batcher(ledger.clone(), 3);

        b.push(row("c1"));
        assert!(!b.maybe_flush(false).await);
        assert_eq!(b.len(), 1);
        assert_eq!(ledger.append_calls(), 0);
    }

    #[tokio::test]
    async fn size_threshold_triggers_flush() {
        let ledger = Arc::new(FakeLedger::default());
        let mut b = batcher(ledger.clone(), 3);

        b.push(row("c1"));
        b.push(row("c2"));
        b.push(row("c3"));

        assert!(b.maybe_flush(false).await);
        assert!(b.is_empty());
        assert_eq!(ledger.append_calls(), 1);
        assert_eq!(ledger.appended.lock().unwrap()[0].len(), 3);
    }

    #[tokio::test]
    async fn force_flushes_partial_batch() {
        let ledger = Arc::new(FakeLedger::default());
        let mut b = batcher(ledger.clone(), 10);

        b.push(row("c1"));
        assert!(b.maybe_flush(true).await);
        assert!(b.is_empty());
        assert_eq!(ledger.append_calls(), 1);
    }

    #[tokio::test]
    async fn interval_elapsed_triggers_flush() {
        let ledger = Arc::new(FakeLedger::default());
        let mut b = UploadBatcher {
            ledger: ledger.clone(),
            batch: vec![row("c1")],
            batch_size: 10,
            upload_interval: Duration::from_millis(5),
            last_upload: Instant::now(),
        };

        // Not due yet — below both the size threshold and the interval.
        assert!(!b.maybe_flush(false).await);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(b.maybe_flush(false).await);
        assert_eq!(ledger.append_calls(), 1);
    }

    // ── Pre-flush re-validation ─────────────────────────────────────

    #[tokio::test]
    async fn revalidation_drops_rows_already_in_ledger() {
        let ledger = Arc::new(FakeLedger::default());
        ledger.seed("c1");
        let mut b = batcher(ledger.clone(), 10);

        b.push(row("c1"));
        b.push(row("c2"));

        assert!(b.maybe_flush(true).await);
        let appended = ledger.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].len(), 1);
        assert_eq!(appended[0][0].comment_id, "c2");
    }

    #[tokio::test]
    async fn fully_covered_batch_clears_without_remote_write() {
        let ledger = Arc::new(FakeLedger::default());
        ledger.seed("c1");
        ledger.seed("c2");
        let mut b = batcher(ledger.clone(), 10);

        b.push(row("c1"));
        b.push(row("c2"));

        assert!(b.maybe_flush(true).await);
        assert!(b.is_empty());
        assert_eq!(ledger.append_calls(), 0);
    }

    #[tokio::test]
    async fn unreadable_ledger_keeps_batch() {
        let ledger = Arc::new(FakeLedger::default());
        ledger.fail_reads.store(true, Ordering::SeqCst);
        let mut b = batcher(ledger.clone(), 10);

        b.push(row("c1"));
        assert!(!b.maybe_flush(true).await);
        assert_eq!(b.len(), 1);
        assert_eq!(ledger.append_calls(), 0);
    }

    // ── Failure handling ────────────────────────────────────────────

    #[tokio::test]
    async fn failed_append_retains_batch_for_next_attempt() {
        let ledger = Arc::new(FakeLedger::default());
        ledger.fail_appends.store(true, Ordering::SeqCst);
        let mut b = batcher(ledger.clone(), 10);

        b.push(row("c1"));
        assert!(!b.maybe_flush(true).await);
        assert_eq!(b.len(), 1);

        // The store recovers; the retained row goes through.
        ledger.fail_appends.store(false, Ordering::SeqCst);
        assert!(b.maybe_flush(true).await);
        assert!(b.is_empty());
        assert_eq!(ledger.append_calls(), 1);
    }

    #[tokio::test]
    async fn successful_flush_resets_timer() {
        let ledger = Arc::new(FakeLedger::default());
        let mut b = UploadBatcher {
            ledger: ledger.clone(),
            batch: vec![row("c1")],
            batch_size: 10,
            upload_interval: Duration::from_millis(20),
            last_upload: Instant::now(),
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(b.maybe_flush(false).await);

        // Timer was reset — a fresh row does not flush on the time trigger.
        b.push(row("c2"));
        assert!(!b.maybe_flush(false).await);
        assert_eq!(b.len(), 1);
    }
}
