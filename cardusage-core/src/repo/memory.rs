use crate::repo::{UsageStore, UsageTx};
use crate::{Card, CardKey, CardRowId, CoreError, Deck, DeckCard, DeckRowId, NewDeck};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Clone, Default)]
struct State {
    last_deck: DeckRowId,
    last_card: CardRowId,
    decks: BTreeMap<DeckRowId, Deck>,
    cards: BTreeMap<CardRowId, Card>,
    links: BTreeMap<(DeckRowId, CardRowId), i64>,
}

/// Process-local store. Transactions work on a copy of the state that
/// replaces the live state on commit.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn UsageTx + 'a>, CoreError> {
        let work = self.state.read().clone();
        Ok(Box::new(MemoryTx {
            store: self,
            work: Some(work),
        }))
    }

    async fn find_deck_by_external_id(&self, deck_id: &str) -> Result<Option<Deck>, CoreError> {
        Ok(self
            .state
            .read()
            .decks
            .values()
            .find(|d| d.deck_id == deck_id)
            .cloned())
    }

    async fn list_decks(&self) -> Result<Vec<Deck>, CoreError> {
        let mut v: Vec<Deck> = self.state.read().decks.values().cloned().collect();
        v.sort_by_key(|d| (d.added_at, d.row_id));
        Ok(v)
    }

    async fn list_cards(&self) -> Result<Vec<Card>, CoreError> {
        Ok(self.state.read().cards.values().cloned().collect())
    }

    async fn list_deck_cards(&self) -> Result<Vec<DeckCard>, CoreError> {
        Ok(self
            .state
            .read()
            .links
            .iter()
            .map(|(&(deck_row_id, card_row_id), &quantity)| DeckCard {
                deck_row_id,
                card_row_id,
                quantity,
            })
            .collect())
    }
}

pub struct MemoryTx<'a> {
    store: &'a MemoryStore,
    work: Option<State>,
}

impl MemoryTx<'_> {
    fn state(&mut self) -> Result<&mut State, CoreError> {
        self.work.as_mut().ok_or(CoreError::Storage("tx closed"))
    }
}

#[async_trait]
impl<'a> UsageTx for MemoryTx<'a> {
    async fn find_deck_by_external_id(&mut self, deck_id: &str) -> Result<Option<Deck>, CoreError> {
        let s = self.state()?;
        Ok(s.decks.values().find(|d| d.deck_id == deck_id).cloned())
    }

    async fn insert_deck(&mut self, deck: &NewDeck) -> Result<DeckRowId, CoreError> {
        let s = self.state()?;
        if s.decks.values().any(|d| d.deck_id == deck.deck_id) {
            return Err(CoreError::DuplicateDeck(deck.deck_id.clone()));
        }
        s.last_deck += 1;
        let id = s.last_deck;
        s.decks.insert(id, deck.clone().into_deck(id));
        Ok(id)
    }

    async fn delete_deck(&mut self, deck: DeckRowId) -> Result<(), CoreError> {
        let s = self.state()?;
        if s.decks.remove(&deck).is_none() {
            return Err(CoreError::InvariantViolation("delete of missing deck row"));
        }
        s.links.retain(|&(d, _), _| d != deck);
        Ok(())
    }

    async fn count_decks(&mut self) -> Result<u64, CoreError> {
        Ok(self.state()?.decks.len() as u64)
    }

    async fn upsert_card_usage(
        &mut self,
        key: &CardKey,
        name: &str,
        delta: i64,
    ) -> Result<CardRowId, CoreError> {
        let s = self.state()?;
        if let Some(card) = s.cards.values_mut().find(|c| &c.key == key) {
            card.use_count = apply_delta(card.use_count, delta)?;
            return Ok(card.row_id);
        }
        if delta <= 0 {
            return Err(CoreError::InvariantViolation("new card with non-positive use count"));
        }
        s.last_card += 1;
        let id = s.last_card;
        s.cards.insert(
            id,
            Card {
                row_id: id,
                name: name.to_string(),
                key: key.clone(),
                alternate_sets: Vec::new(),
                use_count: delta,
            },
        );
        Ok(id)
    }

    async fn adjust_card_usage(&mut self, card: CardRowId, delta: i64) -> Result<(), CoreError> {
        let s = self.state()?;
        let Some(c) = s.cards.get_mut(&card) else {
            return Err(CoreError::InvariantViolation("usage change on missing card row"));
        };
        c.use_count = apply_delta(c.use_count, delta)?;
        Ok(())
    }

    async fn purge_zero_or_negative_cards(&mut self) -> Result<u64, CoreError> {
        let s = self.state()?;
        let dead: Vec<CardRowId> = s
            .cards
            .values()
            .filter(|c| c.use_count <= 0)
            .map(|c| c.row_id)
            .collect();
        for id in &dead {
            s.cards.remove(id);
        }
        s.links.retain(|(_, c), _| !dead.contains(c));
        Ok(dead.len() as u64)
    }

    async fn count_cards(&mut self) -> Result<u64, CoreError> {
        Ok(self.state()?.cards.len() as u64)
    }

    async fn link_deck_card(
        &mut self,
        deck: DeckRowId,
        card: CardRowId,
        quantity: i64,
    ) -> Result<(), CoreError> {
        let s = self.state()?;
        if !s.decks.contains_key(&deck) || !s.cards.contains_key(&card) {
            return Err(CoreError::InvariantViolation("link to missing row"));
        }
        s.links.insert((deck, card), quantity);
        Ok(())
    }

    async fn deck_card_rows(&mut self, deck: DeckRowId) -> Result<Vec<(CardRowId, i64)>, CoreError> {
        let s = self.state()?;
        Ok(s.links
            .iter()
            .filter(|((d, _), _)| *d == deck)
            .map(|(&(_, c), &q)| (c, q))
            .collect())
    }

    async fn clear_all(&mut self) -> Result<(), CoreError> {
        let s = self.state()?;
        s.links.clear();
        s.cards.clear();
        s.decks.clear();
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), CoreError> {
        let work = self.work.take().ok_or(CoreError::Storage("tx closed"))?;
        *self.store.state.write() = work;
        Ok(())
    }
}

fn apply_delta(use_count: i64, delta: i64) -> Result<i64, CoreError> {
    use_count
        .checked_add(delta)
        .ok_or(CoreError::InvariantViolation("use count out of range"))
}
