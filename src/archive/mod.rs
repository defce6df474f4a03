// Local archive — append-only CSV of processed comments plus post snapshots.
//
// Everything lives in one data directory. The CSV mirrors the ledger's
// column order so the two can be diffed; snapshots are one JSON file per
// post. Archive writes are best-effort from the pipeline's perspective —
// the sweep logs a failed append and keeps going, since the ledger is the
// system of record.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::graph::comments::PostContent;
use crate::ledger::{CommentRow, ROW_HEADERS};

/// Local persistence for comment rows and post snapshots.
pub struct Archive {
    data_dir: PathBuf,
    csv_path: PathBuf,
}

impl Archive {
    /// Open the archive, creating the data directory if needed.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let csv_path = data_dir.join("comments.csv");

        Ok(Self { data_dir, csv_path })
    }

    /// Append one comment row to the CSV, writing the header first on a
    /// fresh file.
    pub fn append_comment_row(&self, row: &CommentRow) -> Result<()> {
        let is_new = !self.csv_path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Failed to open {}", self.csv_path.display()))?;

        let mut writer = csv::Writer::from_writer(file);
        if is_new {
            writer.write_record(ROW_HEADERS)?;
        }
        writer.write_record(row.values())?;
        writer.flush().context("Failed to flush comment CSV")?;

        Ok(())
    }

    /// Count archived comment rows (excluding the header).
    pub fn comment_row_count(&self) -> Result<usize> {
        if !self.csv_path.exists() {
            return Ok(0);
        }

        let mut reader = csv::Reader::from_path(&self.csv_path)
            .with_context(|| format!("Failed to read {}", self.csv_path.display()))?;
        Ok(reader.records().filter_map(|r| r.ok()).count())
    }

    fn snapshot_path(&self, post_id: &str) -> PathBuf {
        self.data_dir.join(format!("post_{post_id}.json"))
    }

    /// Persist the post's content snapshot, replacing any previous one.
    pub fn save_post_snapshot(&self, post_id: &str, content: &PostContent) -> Result<()> {
        let path = self.snapshot_path(post_id);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, content).context("Failed to write post snapshot")?;
        Ok(())
    }

    /// Load the last saved snapshot for a post.
    ///
    /// A missing file is None; so is an unreadable one — a corrupt snapshot
    /// just means the next content check re-saves it.
    pub fn load_post_snapshot(&self, post_id: &str) -> Result<Option<PostContent>> {
        let path = self.snapshot_path(post_id);
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        match serde_json::from_str(&raw) {
            Ok(content) => Ok(Some(content)),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Ignoring corrupt post snapshot");
                Ok(None)
            }
        }
    }

    /// The archive's data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the comment CSV (for status display).
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(id: &str) -> CommentRow {
        CommentRow {
            comment_id: id.to_string(),
            user_id: "u1".to_string(),
            user_name: "Ana".to_string(),
            created_time: "2026-08-01T10:00:00+0000".to_string(),
            message: "ticket adjunto".to_string(),
            attachment_url: "https://cdn.example/receipt.jpg".to_string(),
            detected_time: "20260801_100501".to_string(),
        }
    }

    #[test]
    fn append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();

        archive.append_comment_row(&sample_row("c1")).unwrap();
        archive.append_comment_row(&sample_row("c2")).unwrap();

        let raw = std::fs::read_to_string(archive.csv_path()).unwrap();
        let header_lines = raw.lines().filter(|l| l.starts_with("comment_id")).count();
        assert_eq!(header_lines, 1);
        assert_eq!(archive.comment_row_count().unwrap(), 2);
    }

    #[test]
    fn row_count_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();
        assert_eq!(archive.comment_row_count().unwrap(), 0);
    }

    #[test]
    fn csv_preserves_commas_and_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();

        let mut row = sample_row("c1");
        row.message = "total: $1,234.50\ngracias".to_string();
        archive.append_comment_row(&row).unwrap();

        let mut reader = csv::Reader::from_path(archive.csv_path()).unwrap();
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[4], "total: $1,234.50\ngracias");
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();

        let content = PostContent {
            message: "Sube tu ticket".to_string(),
            created_time: "2026-07-30T09:00:00+0000".to_string(),
            url: "https://facebook.com/p/1".to_string(),
        };

        archive.save_post_snapshot("123_456", &content).unwrap();
        let loaded = archive.load_post_snapshot("123_456").unwrap();
        assert_eq!(loaded, Some(content));
    }

    #[test]
    fn snapshot_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();
        assert_eq!(archive.load_post_snapshot("nope").unwrap(), None);
    }

    #[test]
    fn snapshot_corrupt_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("post_x.json"), "{not json").unwrap();
        assert_eq!(archive.load_post_snapshot("x").unwrap(), None);
    }

    #[test]
    fn snapshot_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();

        let first = PostContent {
            message: "v1".to_string(),
            created_time: "t".to_string(),
            url: "u".to_string(),
        };
        let second = PostContent {
            message: "v2".to_string(),
            ..first.clone()
        };

        archive.save_post_snapshot("p", &first).unwrap();
        archive.save_post_snapshot("p", &second).unwrap();

        assert_eq!(archive.load_post_snapshot("p").unwrap(), Some(second));
    }
}
