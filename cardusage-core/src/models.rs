use crate::CardKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type DeckRowId = i64;
pub type CardRowId = i64;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeckFormat {
    Premier,
    TwinSuns,
    Unknown,
}

impl DeckFormat {
    /// Maps the numeric format code used by deck builders.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => DeckFormat::Premier,
            2 => DeckFormat::TwinSuns,
            _ => DeckFormat::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeckFormat::Premier => "Premier",
            DeckFormat::TwinSuns => "Twin Suns",
            DeckFormat::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Premier" => DeckFormat::Premier,
            "Twin Suns" => DeckFormat::TwinSuns,
            _ => DeckFormat::Unknown,
        }
    }
}

impl fmt::Display for DeckFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked deck as stored.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deck {
    pub row_id: DeckRowId,
    pub deck_id: String,
    pub title: String,
    pub url: String,
    pub format: DeckFormat,
    pub added_at: DateTime<Utc>,
}

/// Deck attributes supplied on insert.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDeck {
    pub deck_id: String,
    pub title: String,
    pub url: String,
    pub format: DeckFormat,
    pub added_at: DateTime<Utc>,
}

impl NewDeck {
    pub fn new(
        deck_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        format: DeckFormat,
    ) -> Self {
        Self {
            deck_id: deck_id.into(),
            title: title.into(),
            url: url.into(),
            format,
            added_at: Utc::now(),
        }
    }

    pub fn into_deck(self, row_id: DeckRowId) -> Deck {
        Deck {
            row_id,
            deck_id: self.deck_id,
            title: self.title,
            url: self.url,
            format: self.format,
            added_at: self.added_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub row_id: CardRowId,
    pub name: String,
    pub key: CardKey,
    /// Reserved; not populated by ledger operations.
    pub alternate_sets: Vec<String>,
    pub use_count: i64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeckCard {
    pub deck_row_id: DeckRowId,
    pub card_row_id: CardRowId,
    pub quantity: i64,
}

/// One distinct card of a deck submission.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardEntry {
    pub key: CardKey,
    pub name: String,
    pub quantity: i64,
}

/// Everything add-deck needs: the deck row and its merged card list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeckSubmission {
    pub deck: NewDeck,
    pub cards: Vec<CardEntry>,
}

/// Merges per-key quantities in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct CardTally {
    entries: Vec<CardEntry>,
    index: HashMap<CardKey, usize>,
}

impl CardTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges by key; the first name seen is kept and quantities saturate.
    pub fn add(&mut self, key: CardKey, name: impl Into<String>, quantity: i64) {
        match self.index.get(&key) {
            Some(&i) => {
                let e = &mut self.entries[i];
                e.quantity = e.quantity.saturating_add(quantity);
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(CardEntry {
                    key,
                    name: name.into(),
                    quantity,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<CardEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_merges_same_key() {
        let mut t = CardTally::new();
        t.add(CardKey::normalize("SOR", "5").unwrap(), "Leader", 1);
        t.add(CardKey::normalize("SOR", "10").unwrap(), "Unit", 3);
        t.add(CardKey::normalize("SOR", "005").unwrap(), "Other name", 1);
        let v = t.into_entries();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].quantity, 2);
        assert_eq!(v[0].name, "Leader");
        assert_eq!(v[1].key.number(), "010");
    }

    #[test]
    fn tally_saturates_instead_of_wrapping() {
        let key = CardKey::normalize("SOR", "5").unwrap();
        let mut t = CardTally::new();
        t.add(key.clone(), "Leader", i64::MAX);
        t.add(key, "Leader", 1);
        assert_eq!(t.into_entries()[0].quantity, i64::MAX);
    }

    #[test]
    fn format_codes() {
        assert_eq!(DeckFormat::from_code(1), DeckFormat::Premier);
        assert_eq!(DeckFormat::from_code(2), DeckFormat::TwinSuns);
        assert_eq!(DeckFormat::from_code(9), DeckFormat::Unknown);
        assert_eq!(DeckFormat::parse(DeckFormat::TwinSuns.as_str()), DeckFormat::TwinSuns);
    }
}
