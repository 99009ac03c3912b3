use cardusage_core::{
    CardEntry, CardKey, CoreError, DeckFormat, DeckSubmission, Ledger, MainSets, NewDeck,
    PurgeOutcome, ReportArchive, UsageStore, UsageTx,
};
use cardusage_sqlite::SqliteStore;
use chrono::{Duration, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;

fn entry(set: &str, num: &str, quantity: i64) -> CardEntry {
    CardEntry {
        key: CardKey::normalize(set, num).unwrap(),
        name: format!("Card {set} {num}"),
        quantity,
    }
}

fn submission(deck_id: &str, minute: i64, cards: Vec<CardEntry>) -> DeckSubmission {
    let mut deck = NewDeck::new(
        deck_id,
        format!("Deck {deck_id}"),
        format!("https://www.swudb.com/deck/{deck_id}"),
        DeckFormat::TwinSuns,
    );
    deck.added_at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap() + Duration::minutes(minute);
    DeckSubmission { deck, cards }
}

async fn memory_ledger() -> (Arc<SqliteStore>, Ledger) {
    let store = Arc::new(SqliteStore::open_memory().await.unwrap());
    let ledger = Ledger::new(store.clone(), MainSets::default());
    (store, ledger)
}

async fn card_counts(store: &SqliteStore) -> Vec<(String, String, i64)> {
    store
        .list_cards()
        .await
        .unwrap()
        .into_iter()
        .map(|c| (c.key.to_string(), c.name, c.use_count))
        .collect()
}

struct NoReport;

impl ReportArchive for NoReport {
    fn archive(&self) -> Result<Option<PathBuf>, CoreError> {
        Ok(None)
    }
}

#[tokio::test]
async fn scenario_add_add_remove() {
    let (store, ledger) = memory_ledger().await;
    ledger
        .add_deck(&submission("A", 0, vec![entry("SOR", "1", 2), entry("SOR", "2", 1)]))
        .await
        .unwrap();
    ledger
        .add_deck(&submission("B", 1, vec![entry("SOR", "1", 1)]))
        .await
        .unwrap();

    let view = ledger.project().await.unwrap();
    let sor1 = view.find("SOR", "001").unwrap();
    assert_eq!(sor1.use_count, 3);
    let pairs: Vec<_> = sor1.decks.iter().map(|u| (u.index, u.quantity)).collect();
    assert_eq!(pairs, vec![(1, 2), (2, 1)]);
    assert_eq!(view.decks[1].format, DeckFormat::TwinSuns);

    let out = ledger.remove_deck("A").await.unwrap();
    assert_eq!(out.cards_purged, 1);

    let view = ledger.project().await.unwrap();
    assert_eq!(view.decks.len(), 1);
    assert_eq!(view.decks[0].deck_id, "B");
    let sor1 = view.find("SOR", "001").unwrap();
    assert_eq!(sor1.use_count, 1);
    assert_eq!(sor1.decks.len(), 1);
    assert!(view.find("SOR", "002").is_none());
    assert_eq!(store.list_deck_cards().await.unwrap().len(), 1);
    assert!(ledger.audit().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_deck_leaves_store_unchanged() {
    let (store, ledger) = memory_ledger().await;
    let a = submission("A", 0, vec![entry("SHD", "7", 3)]);
    ledger.add_deck(&a).await.unwrap();
    let before = card_counts(&store).await;

    let err = ledger.add_deck(&a).await.unwrap_err();
    assert!(matches!(err, CoreError::DuplicateDeck(_)));
    assert_eq!(card_counts(&store).await, before);
    assert_eq!(store.list_decks().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unique_constraint_surfaces_duplicate_deck() {
    let (store, _ledger) = memory_ledger().await;
    let deck = NewDeck::new("A", "A", "", DeckFormat::Premier);
    let mut tx = store.begin().await.unwrap();
    tx.insert_deck(&deck).await.unwrap();
    let err = tx.insert_deck(&deck).await.unwrap_err();
    assert!(matches!(err, CoreError::DuplicateDeck(ref id) if id == "A"));
}

#[tokio::test]
async fn round_trip_restores_cards() {
    let (store, ledger) = memory_ledger().await;
    ledger
        .add_deck(&submission("base", 0, vec![entry("TWI", "12", 2), entry("SOR", "5", 1)]))
        .await
        .unwrap();
    let before = card_counts(&store).await;

    ledger
        .add_deck(&submission("D", 1, vec![entry("JTL", "100", 3), entry("SEC", "18", 1)]))
        .await
        .unwrap();
    ledger.remove_deck("D").await.unwrap();

    assert_eq!(card_counts(&store).await, before);
}

#[tokio::test]
async fn rejected_deck_writes_nothing() {
    let (store, ledger) = memory_ledger().await;
    let err = ledger
        .add_deck(&submission("A", 0, vec![entry("SOR", "1", 1), entry("SOR", "2", -1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidQuantity { quantity: -1, .. }));
    assert!(store.list_decks().await.unwrap().is_empty());
    assert!(store.list_cards().await.unwrap().is_empty());
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let (store, _ledger) = memory_ledger().await;
    {
        let mut tx = store.begin().await.unwrap();
        let deck = tx
            .insert_deck(&NewDeck::new("X", "X", "", DeckFormat::Unknown))
            .await
            .unwrap();
        let card = tx
            .upsert_card_usage(&CardKey::normalize("SOR", "1").unwrap(), "Card", 2)
            .await
            .unwrap();
        tx.link_deck_card(deck, card, 2).await.unwrap();
    }
    assert!(store.list_decks().await.unwrap().is_empty());
    assert!(store.list_cards().await.unwrap().is_empty());
}

#[tokio::test]
async fn purge_all_on_empty_store_is_a_no_op() {
    let (_store, ledger) = memory_ledger().await;
    assert_eq!(ledger.purge_all(&NoReport).await.unwrap(), PurgeOutcome::NothingToDo);
}

#[tokio::test]
async fn purge_all_clears_every_table() {
    let (store, ledger) = memory_ledger().await;
    ledger
        .add_deck(&submission("A", 0, vec![entry("SOR", "1", 2), entry("P25", "130", 1)]))
        .await
        .unwrap();

    let out = ledger.purge_all(&NoReport).await.unwrap();
    assert_eq!(out, PurgeOutcome::Cleared { decks: 1, cards: 2, archived: None });
    assert!(store.list_decks().await.unwrap().is_empty());
    assert!(store.list_cards().await.unwrap().is_empty());
    assert!(store.list_deck_cards().await.unwrap().is_empty());
}

#[tokio::test]
async fn file_store_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cards_in_use.sqlite3");

    {
        let store = Arc::new(SqliteStore::open_file(&path).await.unwrap());
        let ledger = Ledger::new(store, MainSets::default());
        ledger
            .add_deck(&submission("A", 0, vec![entry("LOF", "33", 2)]))
            .await
            .unwrap();
    }

    let store = Arc::new(SqliteStore::open_file(&path).await.unwrap());
    let deck = store.find_deck_by_external_id("A").await.unwrap().unwrap();
    assert_eq!(deck.title, "Deck A");
    assert_eq!(deck.added_at, Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap());
    assert_eq!(
        card_counts(&store).await,
        vec![("LOF 033".to_string(), "Card LOF 33".to_string(), 2)]
    );
}

#[tokio::test]
async fn use_count_overflow_rolls_back_deck() {
    let (store, ledger) = memory_ledger().await;
    ledger
        .add_deck(&submission("A", 0, vec![entry("SOR", "1", i64::MAX)]))
        .await
        .unwrap();
    let err = ledger
        .add_deck(&submission("B", 1, vec![entry("SOR", "1", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvariantViolation(_)));

    assert!(store.find_deck_by_external_id("B").await.unwrap().is_none());
    assert_eq!(
        card_counts(&store).await,
        vec![("SOR 001".to_string(), "Card SOR 1".to_string(), i64::MAX)]
    );
    let view = ledger.project().await.unwrap();
    assert_eq!(view.find("SOR", "001").unwrap().use_count, i64::MAX);
}

#[tokio::test]
async fn malformed_alternate_sets_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cards_in_use.sqlite3");
    let store = Arc::new(SqliteStore::open_file(&path).await.unwrap());
    let ledger = Ledger::new(store.clone(), MainSets::default());
    ledger
        .add_deck(&submission("A", 0, vec![entry("SOR", "1", 1)]))
        .await
        .unwrap();

    let pool = sqlx::SqlitePool::connect(&format!("sqlite://{}", path.display()))
        .await
        .unwrap();
    sqlx::query("UPDATE cards SET alternate_sets='not json'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let err = store.list_cards().await.unwrap_err();
    assert!(matches!(err, CoreError::Storage("alternate sets")));
}
