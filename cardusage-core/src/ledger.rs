//! The mutating protocols over a [`UsageStore`]: add-deck, remove-deck and
//! purge-all. Each one runs inside a single store transaction.

use crate::report::{self, ReportArchive, ReportView};
use crate::repo::UsageStore;
use crate::{Card, CardEntry, CardKey, CoreError, Deck, DeckCard, DeckRowId, DeckSubmission, MainSets};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddOutcome {
    pub deck_row_id: DeckRowId,
    pub unique_cards: usize,
    pub total_quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub deck: Deck,
    pub cards_purged: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurgeOutcome {
    NothingToDo,
    Cleared {
        decks: u64,
        cards: u64,
        archived: Option<PathBuf>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    UsageMismatch { key: CardKey, use_count: i64, linked: i64 },
    DeadCard { key: CardKey, use_count: i64 },
    NonPositiveQuantity { deck_row_id: DeckRowId, key: CardKey, quantity: i64 },
    DanglingLink(DeckCard),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UsageMismatch { key, use_count, linked } => {
                write!(f, "{key}: use count {use_count}, linked quantity {linked}")
            }
            Violation::DeadCard { key, use_count } => {
                write!(f, "{key}: stored with use count {use_count}")
            }
            Violation::NonPositiveQuantity { deck_row_id, key, quantity } => {
                write!(f, "{key}: quantity {quantity} in deck row {deck_row_id}")
            }
            Violation::DanglingLink(l) => write!(
                f,
                "association deck row {} -> card row {} has no card",
                l.deck_row_id, l.card_row_id
            ),
        }
    }
}

pub struct Ledger {
    store: Arc<dyn UsageStore>,
    main_sets: MainSets,
}

impl Ledger {
    pub fn new(store: Arc<dyn UsageStore>, main_sets: MainSets) -> Self {
        Self { store, main_sets }
    }

    pub fn main_sets(&self) -> &MainSets {
        &self.main_sets
    }

    pub async fn add_deck(&self, submission: &DeckSubmission) -> Result<AddOutcome, CoreError> {
        let deck = &submission.deck;
        if deck.deck_id.trim().is_empty() {
            return Err(CoreError::InvariantViolation("empty deck id"));
        }
        let total_quantity = validate_entries(&submission.cards)?;

        let mut tx = self.store.begin().await?;
        if tx.find_deck_by_external_id(&deck.deck_id).await?.is_some() {
            return Err(CoreError::DuplicateDeck(deck.deck_id.clone()));
        }
        let deck_row_id = tx.insert_deck(deck).await?;

        for entry in &submission.cards {
            let card = tx
                .upsert_card_usage(&entry.key, &entry.name, entry.quantity)
                .await?;
            tx.link_deck_card(deck_row_id, card, entry.quantity).await?;
        }
        tx.commit().await?;

        info!(
            deck_id = %deck.deck_id,
            unique_cards = submission.cards.len(),
            total_quantity,
            "deck added"
        );
        Ok(AddOutcome {
            deck_row_id,
            unique_cards: submission.cards.len(),
            total_quantity,
        })
    }

    pub async fn remove_deck(&self, deck_id: &str) -> Result<RemoveOutcome, CoreError> {
        let mut tx = self.store.begin().await?;
        let deck = tx
            .find_deck_by_external_id(deck_id)
            .await?
            .ok_or_else(|| CoreError::DeckNotFound(deck_id.to_string()))?;

        let rows = tx.deck_card_rows(deck.row_id).await?;
        for (card, quantity) in &rows {
            tx.adjust_card_usage(*card, -quantity).await?;
        }
        tx.delete_deck(deck.row_id).await?;
        let cards_purged = tx.purge_zero_or_negative_cards().await?;
        tx.commit().await?;

        info!(deck_id, linked = rows.len(), cards_purged, "deck removed");
        Ok(RemoveOutcome { deck, cards_purged })
    }

    /// Clears every deck and card. `archive` runs once it is known there is
    /// something to clear, before anything is deleted.
    pub async fn purge_all(&self, archive: &dyn ReportArchive) -> Result<PurgeOutcome, CoreError> {
        let mut tx = self.store.begin().await?;
        let decks = tx.count_decks().await?;
        if decks == 0 {
            debug!("purge requested with no tracked decks");
            return Ok(PurgeOutcome::NothingToDo);
        }

        let archived = archive.archive()?;
        let cards = tx.count_cards().await?;
        tx.clear_all().await?;
        tx.commit().await?;

        info!(decks, cards, "all decks removed");
        Ok(PurgeOutcome::Cleared {
            decks,
            cards,
            archived,
        })
    }

    pub async fn list_decks(&self) -> Result<Vec<Deck>, CoreError> {
        let mut decks = self.store.list_decks().await?;
        decks.sort_by_key(|d| (d.added_at, d.row_id));
        Ok(decks)
    }

    pub async fn project(&self) -> Result<ReportView, CoreError> {
        let decks = self.store.list_decks().await?;
        let cards = self.store.list_cards().await?;
        let links = self.store.list_deck_cards().await?;
        Ok(report::project(decks, cards, &links, &self.main_sets))
    }

    pub async fn audit(&self) -> Result<Vec<Violation>, CoreError> {
        let cards = self.store.list_cards().await?;
        let links = self.store.list_deck_cards().await?;
        Ok(audit(&cards, &links))
    }
}

/// Returns the deck's total quantity.
fn validate_entries(entries: &[CardEntry]) -> Result<i64, CoreError> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut total: i64 = 0;
    for e in entries {
        if e.quantity <= 0 {
            return Err(CoreError::InvalidQuantity {
                key: e.key.clone(),
                quantity: e.quantity,
            });
        }
        if !seen.insert(&e.key) {
            return Err(CoreError::InvariantViolation("card listed twice in one deck"));
        }
        total = total.checked_add(e.quantity).ok_or(CoreError::InvalidQuantity {
            key: e.key.clone(),
            quantity: e.quantity,
        })?;
    }
    Ok(total)
}

/// Checks the usage-sum and no-dead-card invariants.
pub fn audit(cards: &[Card], links: &[DeckCard]) -> Vec<Violation> {
    let by_row: HashMap<_, _> = cards.iter().map(|c| (c.row_id, c)).collect();
    let mut linked: HashMap<_, i64> = HashMap::new();
    let mut out = Vec::new();

    for l in links {
        match by_row.get(&l.card_row_id) {
            Some(card) => {
                *linked.entry(l.card_row_id).or_default() += l.quantity;
                if l.quantity <= 0 {
                    out.push(Violation::NonPositiveQuantity {
                        deck_row_id: l.deck_row_id,
                        key: card.key.clone(),
                        quantity: l.quantity,
                    });
                }
            }
            None => out.push(Violation::DanglingLink(*l)),
        }
    }

    for c in cards {
        if c.use_count <= 0 {
            out.push(Violation::DeadCard {
                key: c.key.clone(),
                use_count: c.use_count,
            });
        }
        let sum = linked.get(&c.row_id).copied().unwrap_or(0);
        if sum != c.use_count {
            out.push(Violation::UsageMismatch {
                key: c.key.clone(),
                use_count: c.use_count,
                linked: sum,
            });
        }
    }
    out
}
