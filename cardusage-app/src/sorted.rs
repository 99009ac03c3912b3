//! Per-deck listing grouped by set: the `sort` command's output.

use crate::source::{file_stem, CardRef, LoadedDeck};
use anyhow::Result;
use cardusage_core::{order_sets, CardEntry, DeckFormat, MainSets};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where URL decks land when no output directory is given.
pub const DEFAULT_URL_OUTPUT_DIR: &str = "swudb_lists";

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("unsafe chars pattern"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("separator pattern"));

fn card_ref(card: &CardRef) -> String {
    format!("{} ({})", card.name, card.key)
}

fn render_header(deck: &LoadedDeck) -> Vec<String> {
    let meta = &deck.submission.deck;
    let details = &deck.details;
    let mut lines = vec![format!("# {}", meta.title), String::new()];

    let mut info = Vec::new();
    if meta.format != DeckFormat::Unknown {
        info.push(format!("**Format:** {}", meta.format));
    }
    if let Some(author) = &details.author {
        info.push(format!("**Author:** {author}"));
    }
    if !info.is_empty() {
        lines.push(info.join("  \n"));
        lines.push(String::new());
    }

    let mut cards = Vec::new();
    for (i, leader) in details.leaders.iter().enumerate() {
        let label = match i {
            0 => "Leader".to_string(),
            n => format!("Leader {}", n + 1),
        };
        cards.push(format!("**{label}:** {}", card_ref(leader)));
    }
    if let Some(base) = &details.base {
        cards.push(format!("**Base:** {}", card_ref(base)));
    }
    if !cards.is_empty() {
        lines.push(cards.join("  \n"));
        lines.push(String::new());
    }

    lines.push("---".into());
    lines
}

/// Header, then one `## SET (N CARDS)` section per set, main sets first.
pub fn render_sorted(deck: &LoadedDeck, main_sets: &MainSets) -> String {
    let mut lines = render_header(deck);

    let mut groups: HashMap<&str, Vec<&CardEntry>> = HashMap::new();
    for card in &deck.submission.cards {
        groups.entry(card.key.set()).or_default().push(card);
    }

    for set in order_sets(groups.keys().copied(), main_sets) {
        let mut cards = groups.remove(set.as_str()).unwrap_or_default();
        cards.sort_by(|a, b| a.key.number().cmp(b.key.number()));

        lines.push(format!("\n## {set} ({} CARDS)", cards.len()));
        for card in cards {
            let mut line = format!("- {}: {}", card.key.number(), card.name);
            if let Some(alts) = deck.details.alternates.get(&card.key).filter(|a| !a.is_empty()) {
                line.push_str(&format!(" (also in: {})", alts.join(", ")));
            }
            lines.push(line);
        }
    }

    lines.join("\n")
}

/// `decks/bail.json` -> `decks/bail-sorted.md`, or `<out_dir>/bail-sorted.md`.
pub fn file_output_path(source: &Path, out_dir: Option<&Path>) -> Result<PathBuf> {
    let name = format!("{}-sorted.md", file_stem(source)?);
    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    Ok(dir.join(name))
}

/// Deck titles become file names: punctuation dropped, runs of spaces and
/// dashes collapsed to one dash.
pub fn sanitize_title(title: &str) -> String {
    let kept = UNSAFE_CHARS.replace_all(title, "");
    SEPARATORS.replace_all(kept.trim(), "-").into_owned()
}

pub fn url_output_path(title: &str, deck_id: &str, out_dir: Option<&Path>) -> PathBuf {
    let mut name = sanitize_title(title);
    if name.is_empty() {
        name = sanitize_title(deck_id);
    }
    out_dir
        .unwrap_or_else(|| Path::new(DEFAULT_URL_OUTPUT_DIR))
        .join(format!("{name}-sorted.md"))
}
