use crate::CardKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("deck already tracked: {0}")]
    DuplicateDeck(String),
    #[error("deck not tracked: {0}")]
    DeckNotFound(String),
    #[error("invalid quantity {quantity} for {key}")]
    InvalidQuantity { key: CardKey, quantity: i64 },
    #[error("invalid card id: {0}")]
    InvalidCardId(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
    #[error("storage error: {0}")]
    Storage(&'static str),
    #[error("source unavailable: {0}")]
    Source(String),
}
