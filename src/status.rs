// System status display — archive stats, snapshot age, upload target.

use anyhow::Result;

use crate::archive::Archive;
use crate::config::Config;

/// Display system status to the terminal.
pub fn show(config: &Config) -> Result<()> {
    let archive = Archive::open(&config.data_dir)?;

    let csv_path = archive.csv_path();
    if csv_path.exists() {
        let size = std::fs::metadata(csv_path)
            .map(|m| format_bytes(m.len()))
            .unwrap_or_else(|_| "unknown".to_string());
        println!(
            "Archive: {} ({}, {} rows)",
            csv_path.display(),
            size,
            archive.comment_row_count()?
        );
    } else {
        println!("Archive: no comments collected yet");
        println!("  Run `magpie scan` to sweep the configured post once");
    }

    if config.page_id.is_empty() || config.target_post_id.is_empty() {
        println!("Post: not configured (set PAGE_ID and TARGET_POST_ID)");
    } else {
        let post_id = config.post_id();
        match archive.load_post_snapshot(&post_id)? {
            Some(content) => {
                println!("Post {post_id}: snapshot from {}", content.created_time);
                println!("  {}", preview(&content.message, 80));
            }
            None => println!("Post {post_id}: no snapshot yet"),
        }
    }

    if config.spreadsheet_id.is_empty() {
        println!("Ledger: not configured (set SPREADSHEET_ID)");
    } else {
        println!(
            "Ledger: spreadsheet {} / worksheet {}",
            config.spreadsheet_id, config.worksheet_name
        );
    }

    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}…")
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_short_text_unchanged() {
        assert_eq!(preview("hola", 10), "hola");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        // Multi-byte chars must not be split mid-codepoint.
        let text = "ñañañañaña";
        let cut = preview(text, 4);
        assert_eq!(cut, "ñaña…");
    }

    #[test]
    fn preview_flattens_newlines() {
        assert_eq!(preview("a\nb", 10), "a b");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
