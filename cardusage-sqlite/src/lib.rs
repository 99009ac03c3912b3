use async_trait::async_trait;
use cardusage_core::repo::{UsageStore, UsageTx};
use cardusage_core::{
    Card, CardKey, CardRowId, CoreError, Deck, DeckCard, DeckFormat, DeckRowId, NewDeck,
};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let store = Self { pool };
        store.ensure_schema().await?;
        debug!(path = %path.as_ref().display(), "sqlite store opened");
        Ok(store)
    }

    pub async fn open_memory() -> Result<Self, CoreError> {
        // Every connection to :memory: is its own database, so keep exactly one alive.
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|_| CoreError::Storage("sqlite options"))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(opts)
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS decks (
          id        INTEGER PRIMARY KEY AUTOINCREMENT,
          deck_id   TEXT NOT NULL UNIQUE,
          title     TEXT NOT NULL,
          url       TEXT NOT NULL,
          format    TEXT NOT NULL,
          added_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cards (
          id              INTEGER PRIMARY KEY AUTOINCREMENT,
          name            TEXT NOT NULL,
          primary_set     TEXT NOT NULL,
          primary_number  TEXT NOT NULL,
          alternate_sets  TEXT NOT NULL DEFAULT '[]',
          use_count       INTEGER NOT NULL DEFAULT 0,
          UNIQUE(primary_set, primary_number)
        );

        CREATE TABLE IF NOT EXISTS deck_cards (
          deck_id   INTEGER NOT NULL,
          card_id   INTEGER NOT NULL,
          quantity  INTEGER NOT NULL DEFAULT 1,
          PRIMARY KEY (deck_id, card_id),
          FOREIGN KEY(deck_id) REFERENCES decks(id) ON DELETE CASCADE,
          FOREIGN KEY(card_id) REFERENCES cards(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_deck_cards_card ON deck_cards (card_id);
        "#;

        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|_| CoreError::Storage("sqlite schema"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl UsageStore for SqliteStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn UsageTx + 'a>, CoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("tx"))?;
        Ok(Box::new(SqliteTx { tx: Some(tx) }))
    }

    async fn find_deck_by_external_id(&self, deck_id: &str) -> Result<Option<Deck>, CoreError> {
        let row = sqlx::query("SELECT id,deck_id,title,url,format,added_at FROM decks WHERE deck_id=?")
            .bind(deck_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read deck"))?;
        row.map(row_into_deck).transpose()
    }

    async fn list_decks(&self) -> Result<Vec<Deck>, CoreError> {
        let rows = sqlx::query("SELECT id,deck_id,title,url,format,added_at FROM decks ORDER BY added_at ASC, id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("list decks"))?;
        rows.into_iter().map(row_into_deck).collect()
    }

    async fn list_cards(&self) -> Result<Vec<Card>, CoreError> {
        let rows = sqlx::query(
            r#"SELECT id,name,primary_set,primary_number,alternate_sets,use_count
               FROM cards ORDER BY primary_set ASC, primary_number ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("list cards"))?;
        rows.into_iter().map(row_into_card).collect()
    }

    async fn list_deck_cards(&self) -> Result<Vec<DeckCard>, CoreError> {
        let rows = sqlx::query("SELECT deck_id,card_id,quantity FROM deck_cards")
            .fetch_all(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("list deck cards"))?;
        Ok(rows
            .into_iter()
            .map(|row| DeckCard {
                deck_row_id: row.get::<i64, _>("deck_id"),
                card_row_id: row.get::<i64, _>("card_id"),
                quantity: row.get::<i64, _>("quantity"),
            })
            .collect())
    }
}

/// A sqlx transaction. Dropping it before [`UsageTx::commit`] rolls back.
pub struct SqliteTx {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteTx {
    fn conn(&mut self) -> Result<&mut SqliteConnection, CoreError> {
        self.tx.as_deref_mut().ok_or(CoreError::Storage("tx closed"))
    }
}

#[async_trait]
impl UsageTx for SqliteTx {
    // ===== Decks =====
    async fn find_deck_by_external_id(&mut self, deck_id: &str) -> Result<Option<Deck>, CoreError> {
        let conn = self.conn()?;
        let row = sqlx::query("SELECT id,deck_id,title,url,format,added_at FROM decks WHERE deck_id=?")
            .bind(deck_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|_| CoreError::Storage("read deck"))?;
        row.map(row_into_deck).transpose()
    }

    async fn insert_deck(&mut self, deck: &NewDeck) -> Result<DeckRowId, CoreError> {
        let conn = self.conn()?;
        let res = sqlx::query("INSERT INTO decks (deck_id,title,url,format,added_at) VALUES (?,?,?,?,?)")
            .bind(&deck.deck_id)
            .bind(&deck.title)
            .bind(&deck.url)
            .bind(deck.format.as_str())
            .bind(dt_to_str(deck.added_at))
            .execute(&mut *conn)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    CoreError::DuplicateDeck(deck.deck_id.clone())
                }
                _ => CoreError::Storage("insert deck"),
            })?;
        Ok(res.last_insert_rowid())
    }

    async fn delete_deck(&mut self, deck: DeckRowId) -> Result<(), CoreError> {
        let conn = self.conn()?;

        // Manual cascade (robust even if PRAGMA foreign_keys is off)
        sqlx::query("DELETE FROM deck_cards WHERE deck_id=?")
            .bind(deck)
            .execute(&mut *conn)
            .await
            .map_err(|_| CoreError::Storage("del deck cards"))?;

        let res = sqlx::query("DELETE FROM decks WHERE id=?")
            .bind(deck)
            .execute(&mut *conn)
            .await
            .map_err(|_| CoreError::Storage("del deck"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::InvariantViolation("delete of missing deck row"));
        }
        Ok(())
    }

    async fn count_decks(&mut self) -> Result<u64, CoreError> {
        let conn = self.conn()?;
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM decks")
            .fetch_one(&mut *conn)
            .await
            .map_err(|_| CoreError::Storage("count decks"))?;
        Ok(n as u64)
    }

    // ===== Cards =====
    async fn upsert_card_usage(
        &mut self,
        key: &CardKey,
        name: &str,
        delta: i64,
    ) -> Result<CardRowId, CoreError> {
        let conn = self.conn()?;
        let existing: Option<(i64, i64)> = sqlx::query_as(
            "SELECT id,use_count FROM cards WHERE primary_set=? AND primary_number=?",
        )
        .bind(key.set())
        .bind(key.number())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|_| CoreError::Storage("read card"))?;

        if let Some((id, use_count)) = existing {
            set_use_count(conn, id, apply_delta(use_count, delta)?).await?;
            return Ok(id);
        }

        if delta <= 0 {
            return Err(CoreError::InvariantViolation("new card with non-positive use count"));
        }
        let res = sqlx::query(
            r#"INSERT INTO cards (name,primary_set,primary_number,alternate_sets,use_count)
               VALUES (?,?,?,'[]',?)"#,
        )
        .bind(name)
        .bind(key.set())
        .bind(key.number())
        .bind(delta)
        .execute(&mut *conn)
        .await
        .map_err(|_| CoreError::Storage("insert card"))?;
        Ok(res.last_insert_rowid())
    }

    async fn adjust_card_usage(&mut self, card: CardRowId, delta: i64) -> Result<(), CoreError> {
        let conn = self.conn()?;
        let current: Option<i64> = sqlx::query_scalar("SELECT use_count FROM cards WHERE id=?")
            .bind(card)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|_| CoreError::Storage("read card"))?;
        let Some(current) = current else {
            return Err(CoreError::InvariantViolation("usage change on missing card row"));
        };
        set_use_count(conn, card, apply_delta(current, delta)?).await
    }

    async fn purge_zero_or_negative_cards(&mut self) -> Result<u64, CoreError> {
        let conn = self.conn()?;
        sqlx::query("DELETE FROM deck_cards WHERE card_id IN (SELECT id FROM cards WHERE use_count <= 0)")
            .execute(&mut *conn)
            .await
            .map_err(|_| CoreError::Storage("del deck cards"))?;
        let res = sqlx::query("DELETE FROM cards WHERE use_count <= 0")
            .execute(&mut *conn)
            .await
            .map_err(|_| CoreError::Storage("purge cards"))?;
        Ok(res.rows_affected())
    }

    async fn count_cards(&mut self) -> Result<u64, CoreError> {
        let conn = self.conn()?;
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards")
            .fetch_one(&mut *conn)
            .await
            .map_err(|_| CoreError::Storage("count cards"))?;
        Ok(n as u64)
    }

    // ===== Associations =====
    async fn link_deck_card(
        &mut self,
        deck: DeckRowId,
        card: CardRowId,
        quantity: i64,
    ) -> Result<(), CoreError> {
        let conn = self.conn()?;
        sqlx::query(
            r#"INSERT INTO deck_cards (deck_id,card_id,quantity) VALUES (?,?,?)
               ON CONFLICT(deck_id, card_id) DO UPDATE SET quantity = excluded.quantity"#,
        )
        .bind(deck)
        .bind(card)
        .bind(quantity)
        .execute(&mut *conn)
        .await
        .map_err(|_| CoreError::Storage("link deck card"))?;
        Ok(())
    }

    async fn deck_card_rows(&mut self, deck: DeckRowId) -> Result<Vec<(CardRowId, i64)>, CoreError> {
        let conn = self.conn()?;
        let rows = sqlx::query("SELECT card_id,quantity FROM deck_cards WHERE deck_id=? ORDER BY card_id")
            .bind(deck)
            .fetch_all(&mut *conn)
            .await
            .map_err(|_| CoreError::Storage("read deck cards"))?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<i64, _>("card_id"), row.get::<i64, _>("quantity")))
            .collect())
    }

    async fn clear_all(&mut self) -> Result<(), CoreError> {
        let conn = self.conn()?;
        for sql in ["DELETE FROM deck_cards", "DELETE FROM cards", "DELETE FROM decks"] {
            sqlx::query(sql)
                .execute(&mut *conn)
                .await
                .map_err(|_| CoreError::Storage("clear"))?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), CoreError> {
        let tx = self.tx.take().ok_or(CoreError::Storage("tx closed"))?;
        tx.commit()
            .await
            .map_err(|_| CoreError::Storage("tx commit"))
    }
}

// ===== Helpers =====
// use_count is updated from Rust so an overflow fails instead of turning the column into REAL.
fn apply_delta(use_count: i64, delta: i64) -> Result<i64, CoreError> {
    use_count
        .checked_add(delta)
        .ok_or(CoreError::InvariantViolation("use count out of range"))
}

async fn set_use_count(
    conn: &mut SqliteConnection,
    card: CardRowId,
    use_count: i64,
) -> Result<(), CoreError> {
    sqlx::query("UPDATE cards SET use_count=? WHERE id=?")
        .bind(use_count)
        .bind(card)
        .execute(&mut *conn)
        .await
        .map_err(|_| CoreError::Storage("update card"))?;
    Ok(())
}

fn dt_to_str(dt: DateTime<Utc>) -> String {
    // Fixed width keeps ORDER BY added_at chronological.
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn dt_from_str(s: String) -> Result<DateTime<Utc>, CoreError> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map_err(|_| CoreError::Storage("datetime"))
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_into_deck(row: sqlx::sqlite::SqliteRow) -> Result<Deck, CoreError> {
    Ok(Deck {
        row_id: row.get::<i64, _>("id"),
        deck_id: row.get::<String, _>("deck_id"),
        title: row.get::<String, _>("title"),
        url: row.get::<String, _>("url"),
        format: DeckFormat::parse(&row.get::<String, _>("format")),
        added_at: dt_from_str(row.get::<String, _>("added_at"))?,
    })
}

fn row_into_card(row: sqlx::sqlite::SqliteRow) -> Result<Card, CoreError> {
    let alternates_json: String = row.get("alternate_sets");
    let alternate_sets: Vec<String> = serde_json::from_str(&alternates_json)
        .map_err(|_| CoreError::Storage("alternate sets"))?;
    let key = CardKey::normalize(
        &row.get::<String, _>("primary_set"),
        &row.get::<String, _>("primary_number"),
    )?;

    Ok(Card {
        row_id: row.get::<i64, _>("id"),
        name: row.get::<String, _>("name"),
        key,
        alternate_sets,
        use_count: row.get::<i64, _>("use_count"),
    })
}
