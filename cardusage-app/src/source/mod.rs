//! Turns a user-supplied deck reference into a [`DeckSubmission`].

pub mod deck_file;
pub mod picklist;
pub mod swudb;

use anyhow::{bail, Context, Result};
use cardusage_core::{CardCatalog, CardKey, DeckSubmission, MainSets};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File decks share the tracked-id space with SWUDB ids, so they get a prefix.
pub const FILE_ID_PREFIX: &str = "file:";

/// A leader or base as named in a deck header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRef {
    pub key: CardKey,
    pub name: String,
}

/// What a source knows about a deck beyond its card counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckDetails {
    pub author: Option<String>,
    pub leaders: Vec<CardRef>,
    pub base: Option<CardRef>,
    /// Other sets a card was printed in, keyed by the printing it is tracked under.
    pub alternates: HashMap<CardKey, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct LoadedDeck {
    pub submission: DeckSubmission,
    pub details: DeckDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckInput {
    SwuDb { url: String, deck_id: String },
    DeckFile(PathBuf),
    Picklist(PathBuf),
}

impl DeckInput {
    pub fn classify(input: &str) -> Result<Self> {
        let input = input.trim();
        if swudb::is_deck_url(input) {
            let deck_id = swudb::extract_deck_id(input)
                .with_context(|| format!("could not extract deck id from URL: {input}"))?;
            return Ok(DeckInput::SwuDb {
                url: input.to_string(),
                deck_id,
            });
        }
        let path = PathBuf::from(input);
        if !path.is_file() {
            bail!("not a SWUDB deck URL or readable file: {input}");
        }
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        Ok(if is_json {
            DeckInput::DeckFile(path)
        } else {
            DeckInput::Picklist(path)
        })
    }

    pub async fn load(
        &self,
        client: &reqwest::Client,
        catalog: &dyn CardCatalog,
        main_sets: &MainSets,
    ) -> Result<LoadedDeck> {
        match self {
            DeckInput::SwuDb { url, deck_id } => swudb::fetch(client, url, deck_id).await,
            DeckInput::DeckFile(path) => {
                let text = read(path)?;
                let stem = file_stem(path)?;
                let id = format!("{FILE_ID_PREFIX}{stem}");
                deck_file::parse(&text, &id, &stem, &path.display().to_string(), catalog).await
            }
            DeckInput::Picklist(path) => {
                let text = read(path)?;
                let stem = file_stem(path)?;
                let id = format!("{FILE_ID_PREFIX}{stem}");
                Ok(picklist::parse(&text, &id, &stem, &path.display().to_string(), main_sets))
            }
        }
    }
}

/// Resolves what `remove` was given to the tracked deck id.
pub fn deck_id_for_removal(input: &str) -> Result<String> {
    let input = input.trim();
    if swudb::is_deck_url(input) {
        return swudb::extract_deck_id(input)
            .with_context(|| format!("could not extract deck id from URL: {input}"));
    }
    let path = Path::new(input);
    if path.is_file() {
        return Ok(format!("{FILE_ID_PREFIX}{}", file_stem(path)?));
    }
    if input.is_empty() {
        bail!("empty deck reference");
    }
    Ok(input.to_string())
}

pub fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("no usable file name: {}", path.display()))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
