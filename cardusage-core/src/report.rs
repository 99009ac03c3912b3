//! Read-only projection of the store into a grouped, deck-indexed view.

use crate::{Card, CoreError, Deck, DeckCard, DeckFormat, MainSets};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportView {
    pub decks: Vec<IndexedDeck>,
    pub sets: Vec<SetGroup>,
}

impl ReportView {
    pub fn unique_cards(&self) -> usize {
        self.sets.iter().map(|g| g.cards.len()).sum()
    }

    pub fn find(&self, set: &str, number: &str) -> Option<&CardUsage> {
        self.sets
            .iter()
            .find(|g| g.set == set)
            .and_then(|g| g.cards.iter().find(|c| c.number == number))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IndexedDeck {
    /// 1-based display index.
    pub index: usize,
    pub deck_id: String,
    pub title: String,
    pub url: String,
    pub format: DeckFormat,
    pub added_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SetGroup {
    pub set: String,
    pub cards: Vec<CardUsage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardUsage {
    pub number: String,
    pub name: String,
    pub use_count: i64,
    pub alternate_sets: Vec<String>,
    pub decks: Vec<DeckUsage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DeckUsage {
    pub index: usize,
    pub quantity: i64,
}

/// Moves an already rendered report out of the way before a purge.
pub trait ReportArchive: Send + Sync {
    /// Returns where the report went, or `None` when there was nothing to archive.
    fn archive(&self) -> Result<Option<PathBuf>, CoreError>;
}

/// Main sets first in their declared order, then the rest alphabetically.
pub fn order_sets<'a, I>(sets: I, main_sets: &MainSets) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut known: Vec<(usize, &str)> = Vec::new();
    let mut other: Vec<&str> = Vec::new();
    for s in sets {
        match main_sets.position(s) {
            Some(pos) => known.push((pos, s)),
            None => other.push(s),
        }
    }
    known.sort_unstable();
    known.dedup();
    other.sort_unstable();
    other.dedup();
    known
        .into_iter()
        .map(|(_, s)| s)
        .chain(other)
        .map(str::to_string)
        .collect()
}

pub fn project(
    mut decks: Vec<Deck>,
    cards: Vec<Card>,
    links: &[DeckCard],
    main_sets: &MainSets,
) -> ReportView {
    decks.sort_by_key(|d| (d.added_at, d.row_id));
    let index_of: HashMap<_, _> = decks
        .iter()
        .enumerate()
        .map(|(i, d)| (d.row_id, i + 1))
        .collect();

    let mut per_card: HashMap<_, Vec<DeckUsage>> = HashMap::new();
    for l in links {
        // Associations of a deck that no longer exists are not displayable.
        if let Some(&index) = index_of.get(&l.deck_row_id) {
            per_card.entry(l.card_row_id).or_default().push(DeckUsage {
                index,
                quantity: l.quantity,
            });
        }
    }

    let mut grouped: BTreeMap<String, Vec<CardUsage>> = BTreeMap::new();
    for card in cards {
        let mut usage = per_card.remove(&card.row_id).unwrap_or_default();
        usage.sort_by_key(|u| u.index);
        grouped
            .entry(card.key.set().to_string())
            .or_default()
            .push(CardUsage {
                number: card.key.number().to_string(),
                name: card.name,
                use_count: card.use_count,
                alternate_sets: card.alternate_sets,
                decks: usage,
            });
    }

    let order = order_sets(grouped.keys().map(|s| s.as_str()), main_sets);
    let sets = order
        .into_iter()
        .filter_map(|set| {
            let mut cards = grouped.remove(&set)?;
            cards.sort_by(|a, b| a.number.cmp(&b.number));
            Some(SetGroup { set, cards })
        })
        .collect();

    ReportView {
        decks: decks
            .into_iter()
            .enumerate()
            .map(|(i, d)| IndexedDeck {
                index: i + 1,
                deck_id: d.deck_id,
                title: d.title,
                url: d.url,
                format: d.format,
                added_at: d.added_at,
            })
            .collect(),
        sets,
    }
}
