//! Markdown rendering of the usage report, plus writing and archiving it.

use anyhow::{Context, Result};
use cardusage_core::{CoreError, ReportArchive, ReportView};
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

pub fn render_markdown(view: &ReportView) -> String {
    let mut lines: Vec<String> = vec!["# Cards In Use\n".into()];

    if !view.decks.is_empty() {
        lines.push(format!("## Tracked Decks ({})\n", view.decks.len()));
        for d in &view.decks {
            lines.push(format!("- [{}] [{}]({}) ({})", d.index, d.title, d.url, d.format));
        }
        lines.push(String::new());
    }

    lines.push(format!("## Cards ({} unique)\n", view.unique_cards()));
    lines.push("Format: `- NUMBER: Card Name (xTOTAL) [DECK:QTY, ...]`\n".into());

    for group in &view.sets {
        lines.push(format!("\n### {} ({} cards)\n", group.set, group.cards.len()));
        for card in &group.cards {
            let mut line = format!("- {}: {}", card.number, card.name);
            if card.use_count > 1 {
                line.push_str(&format!(" (x{})", card.use_count));
            }
            if !card.decks.is_empty() {
                let entries: Vec<String> = card
                    .decks
                    .iter()
                    .map(|u| format!("{}:{}", u.index, u.quantity))
                    .collect();
                line.push_str(&format!(" [{}]", entries.join(", ")));
            }
            lines.push(line);
        }
    }

    lines.join("\n")
}

/// Writes through a temp file in the target directory, then renames over `path`.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub struct MarkdownReport {
    path: PathBuf,
}

impl MarkdownReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the report file atomically.
    pub fn write(&self, view: &ReportView) -> Result<()> {
        write_atomic(&self.path, &render_markdown(view))
    }

    /// `cards_in_use.md` -> `cards_in_use_2025-01-31_094500.md`.
    pub fn archive_path(&self, stamp: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match self.path.extension() {
            Some(ext) => format!("{stem}_{stamp}.{}", ext.to_string_lossy()),
            None => format!("{stem}_{stamp}"),
        };
        self.path.with_file_name(name)
    }
}

impl ReportArchive for MarkdownReport {
    fn archive(&self) -> Result<Option<PathBuf>, CoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let stamp = Local::now().format("%Y-%m-%d_%H%M%S").to_string();
        let target = self.archive_path(&stamp);
        fs::rename(&self.path, &target).map_err(|_| CoreError::Storage("archive report"))?;
        info!(path = %target.display(), "report archived");
        Ok(Some(target))
    }
}
