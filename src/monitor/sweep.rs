// Streaming sweep — one full pagination pass over the post's comments.
//
// Pages are processed as they arrive rather than collected up front: each
// new receipt-bearing comment is archived and buffered immediately, and a
// full batch flushes mid-sweep. That bounds both memory and upload latency
// when a viral post grows faster than one upload per cycle.
//
// Comments without an image attachment are skipped entirely — not archived,
// not buffered, not marked known. The pipeline exists to collect receipt
// photos; plain text replies are noise here.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use tracing::{debug, info, warn};

use super::batcher::UploadBatcher;
use crate::archive::Archive;
use crate::graph::traits::CommentSource;
use crate::ledger::CommentRow;

/// Pause between page fetches, as rate-limit courtesy.
const PAGE_DELAY: Duration = Duration::from_millis(500);

/// Fetch and process every comment page for a post.
///
/// New attachment-bearing comments are appended to the archive CSV, pushed
/// onto the upload batch, and added to `known_ids`. Returns how many were
/// processed this sweep.
pub async fn run_sweep(
    source: &dyn CommentSource,
    known_ids: &mut HashSet<String>,
    archive: &Archive,
    batcher: &mut UploadBatcher,
    post_id: &str,
    page_size: u32,
) -> Result<usize> {
    let mut new_count = 0usize;
    let mut cursor: Option<String> = None;

    loop {
        let (comments, next) = source
            .comments_page(post_id, page_size, cursor.as_deref())
            .await?;

        if comments.is_empty() {
            break;
        }

        for comment in &comments {
            if known_ids.contains(&comment.id) {
                continue;
            }

            let Some(url) = comment.attachment_url() else {
                debug!(comment_id = %comment.id, "Comment has no image attachment, skipping");
                continue;
            };

            let detected_time = Local::now().format("%Y%m%d_%H%M%S").to_string();
            let row = CommentRow::from_comment(comment, url, &detected_time);

            // The ledger is the system of record; a local archive failure
            // is logged and the comment still flows to the batch.
            if let Err(e) = archive.append_comment_row(&row) {
                warn!(error = %e, comment_id = %comment.id, "Failed to archive comment row");
            }

            batcher.push(row);
            known_ids.insert(comment.id.clone());
            new_count += 1;

            info!(
                comment_id = %comment.id,
                created_time = %comment.created_time,
                "New receipt comment detected"
            );
        }

        // Flush mid-sweep once the batch reaches the size threshold.
        batcher.maybe_flush(false).await;

        cursor = next;
        if cursor.is_none() {
            break;
        }

        tokio::time::sleep(PAGE_DELAY).await;
    }

    debug!(new_count = new_count, "Sweep finished");
    Ok(new_count)
}
