// Ledger — the remote system of record for uploaded comment rows.
//
// The spreadsheet is authoritative for deduplication: the monitor reads the
// full id set at startup and the batcher re-reads it immediately before
// every flush, so concurrent monitor instances sharing one sheet mostly
// avoid double-writes. Mostly: the read-filter-append sequence is not
// transactional, and two instances can interleave between each other's
// re-read and append. That window is accepted.

pub mod auth;
pub mod sheets;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::graph::comments::Comment;

/// Column headers, in upload order.
pub const ROW_HEADERS: [&str; 7] = [
    "comment_id",
    "user_id",
    "user_name",
    "created_time",
    "message",
    "attachment_url",
    "detected_time",
];

/// One uploaded row — a processed comment plus the detection timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    pub comment_id: String,
    pub user_id: String,
    pub user_name: String,
    pub created_time: String,
    pub message: String,
    /// The attached image URL, or "No" when the comment had none.
    pub attachment_url: String,
    /// When this instance first saw the comment (%Y%m%d_%H%M%S local).
    pub detected_time: String,
}

impl CommentRow {
    /// Derive a row from a comment and its extracted attachment URL.
    pub fn from_comment(comment: &Comment, attachment_url: &str, detected_time: &str) -> Self {
        Self {
            comment_id: comment.id.clone(),
            user_id: comment.author_id.clone(),
            user_name: comment.author_name.clone(),
            created_time: comment.created_time.clone(),
            message: comment.message.clone(),
            attachment_url: attachment_url.to_string(),
            detected_time: detected_time.to_string(),
        }
    }

    /// The row as cell values, in `ROW_HEADERS` order.
    pub fn values(&self) -> Vec<String> {
        vec![
            self.comment_id.clone(),
            self.user_id.clone(),
            self.user_name.clone(),
            self.created_time.clone(),
            self.message.clone(),
            self.attachment_url.clone(),
            self.detected_time.clone(),
        ]
    }
}

/// Backend-agnostic interface to the dedup store.
///
/// SheetsLedger is the production implementor; tests substitute in-memory
/// fakes to drive the batcher and monitor.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Read the full set of comment ids already persisted remotely.
    async fn existing_comment_ids(&self) -> Result<HashSet<String>>;

    /// Append rows to the store. Implementations retry transient failures
    /// internally; an error here means the batch was not persisted.
    async fn append_rows(&self, rows: &[CommentRow]) -> Result<()>;
}
