use crate::{Card, CardKey, CardRowId, CoreError, Deck, DeckCard, DeckRowId, NewDeck};
use async_trait::async_trait;

pub mod memory;

/// Durable storage for decks, cards and their associations.
///
/// Reads go straight to the store. Every mutation happens on a [`UsageTx`]
/// obtained from [`UsageStore::begin`]; dropping a transaction without
/// committing discards all of its changes.
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn begin<'a>(&'a self) -> Result<Box<dyn UsageTx + 'a>, CoreError>;

    async fn find_deck_by_external_id(&self, deck_id: &str) -> Result<Option<Deck>, CoreError>;
    async fn list_decks(&self) -> Result<Vec<Deck>, CoreError>;
    async fn list_cards(&self) -> Result<Vec<Card>, CoreError>;
    async fn list_deck_cards(&self) -> Result<Vec<DeckCard>, CoreError>;
}

/// One atomic unit of work against a [`UsageStore`].
#[async_trait]
pub trait UsageTx: Send {
    // Decks
    async fn find_deck_by_external_id(&mut self, deck_id: &str) -> Result<Option<Deck>, CoreError>;
    /// Fails with `DuplicateDeck` when `deck.deck_id` is already stored.
    async fn insert_deck(&mut self, deck: &NewDeck) -> Result<DeckRowId, CoreError>;
    /// Removes the deck and all of its associations.
    async fn delete_deck(&mut self, deck: DeckRowId) -> Result<(), CoreError>;
    async fn count_decks(&mut self) -> Result<u64, CoreError>;

    // Cards
    /// Adds `delta` to the card's use count, creating the card when absent.
    /// Creating with a non-positive delta is an `InvariantViolation`.
    async fn upsert_card_usage(
        &mut self,
        key: &CardKey,
        name: &str,
        delta: i64,
    ) -> Result<CardRowId, CoreError>;
    /// Adds `delta` (usually negative) to an existing card's use count.
    async fn adjust_card_usage(&mut self, card: CardRowId, delta: i64) -> Result<(), CoreError>;
    /// Deletes every card whose use count dropped to zero or below.
    async fn purge_zero_or_negative_cards(&mut self) -> Result<u64, CoreError>;
    async fn count_cards(&mut self) -> Result<u64, CoreError>;

    // Associations
    /// Sets the quantity for (deck, card), overwriting any previous value.
    async fn link_deck_card(
        &mut self,
        deck: DeckRowId,
        card: CardRowId,
        quantity: i64,
    ) -> Result<(), CoreError>;
    async fn deck_card_rows(&mut self, deck: DeckRowId) -> Result<Vec<(CardRowId, i64)>, CoreError>;

    /// Empties decks, cards and associations.
    async fn clear_all(&mut self) -> Result<(), CoreError>;

    async fn commit(&mut self) -> Result<(), CoreError>;
}
