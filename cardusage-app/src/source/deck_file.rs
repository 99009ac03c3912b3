//! Deck exports saved as JSON: `SET_NUM` card ids, names looked up in the catalog.

use anyhow::{Context, Result};
use super::{CardRef, DeckDetails, LoadedDeck};
use cardusage_core::{CardCatalog, CardKey, CardTally, DeckFormat, DeckSubmission, NewDeck};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    name: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: String,
    #[serde(default = "one")]
    count: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
struct DeckFile {
    #[serde(default)]
    metadata: Metadata,
    leader: Option<Item>,
    secondleader: Option<Item>,
    base: Option<Item>,
    #[serde(default)]
    deck: Vec<Item>,
    #[serde(default)]
    sideboard: Vec<Item>,
}

/// `SEC_018` -> `SEC 018`.
pub fn parse_card_id(id: &str) -> Option<CardKey> {
    let (set, num) = id.split_once('_')?;
    if num.contains('_') {
        return None;
    }
    CardKey::normalize(set, num).ok()
}

async fn lookup(item: &Item, catalog: &dyn CardCatalog) -> Option<CardRef> {
    let Some(key) = parse_card_id(&item.id) else {
        warn!(id = %item.id, "skipping unrecognised card id");
        return None;
    };
    let name = match catalog.card_name(&key).await {
        Some(name) => name,
        None => format!("[{}]", item.id),
    };
    Some(CardRef { key, name })
}

/// `stem` names the deck when the file carries no `metadata.name`.
pub async fn parse(
    text: &str,
    deck_id: &str,
    stem: &str,
    url: &str,
    catalog: &dyn CardCatalog,
) -> Result<LoadedDeck> {
    let file: DeckFile = serde_json::from_str(text).context("decoding deck file")?;
    let format = if file.secondleader.is_some() {
        DeckFormat::TwinSuns
    } else {
        DeckFormat::Premier
    };

    let singles = [&file.leader, &file.secondleader, &file.base];
    let items = singles
        .into_iter()
        .flatten()
        .map(|item| (item, 1))
        .chain(file.deck.iter().chain(&file.sideboard).map(|item| (item, item.count)));

    let mut tally = CardTally::new();
    for (item, quantity) in items {
        if quantity <= 0 {
            continue;
        }
        if let Some(card) = lookup(item, catalog).await {
            tally.add(card.key, card.name, quantity);
        }
    }

    let mut leaders = Vec::new();
    for item in [&file.leader, &file.secondleader].into_iter().flatten() {
        leaders.extend(lookup(item, catalog).await);
    }
    let base = match &file.base {
        Some(item) => lookup(item, catalog).await,
        None => None,
    };

    let title = file.metadata.name.unwrap_or_else(|| stem.to_string());
    Ok(LoadedDeck {
        submission: DeckSubmission {
            deck: NewDeck::new(deck_id, title, url, format),
            cards: tally.into_entries(),
        },
        details: DeckDetails {
            author: file.metadata.author,
            leaders,
            base,
            ..DeckDetails::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedCatalog;

    #[async_trait]
    impl CardCatalog for FixedCatalog {
        async fn card_name(&self, key: &CardKey) -> Option<String> {
            (key.set() == "SEC" && key.number() == "018").then(|| "Bail Organa".to_string())
        }
    }

    #[test]
    fn card_ids() {
        assert_eq!(parse_card_id("SEC_18"), CardKey::normalize("SEC", "018").ok());
        assert_eq!(parse_card_id("SEC-18"), None);
        assert_eq!(parse_card_id("SEC_1_8"), None);
        assert_eq!(parse_card_id("SEC_x"), None);
    }

    #[tokio::test]
    async fn parses_sections_and_counts() {
        let text = r#"{
          "metadata": {"name": "Bail Control", "author": "someone"},
          "leader": {"id": "SEC_018", "count": 1},
          "base": {"id": "SOR_023"},
          "deck": [{"id": "SEC_018", "count": 2}, {"id": "P25_130", "count": 3}, {"id": "bogus"}],
          "sideboard": [{"id": "P25_130", "count": 1}]
        }"#;
        let loaded = parse(text, "file:bail", "bail", "decks/bail.json", &FixedCatalog)
            .await
            .unwrap();
        let sub = &loaded.submission;
        assert_eq!(sub.deck.deck_id, "file:bail");
        assert_eq!(sub.deck.title, "Bail Control");
        assert_eq!(sub.deck.format, DeckFormat::Premier);

        let got: Vec<_> = sub
            .cards
            .iter()
            .map(|c| (c.key.to_string(), c.name.as_str(), c.quantity))
            .collect();
        assert_eq!(
            got,
            vec![
                ("SEC 018".to_string(), "Bail Organa", 3),
                ("SOR 023".to_string(), "[SOR_023]", 1),
                ("P25 130".to_string(), "[P25_130]", 4),
            ]
        );

        assert_eq!(loaded.details.author.as_deref(), Some("someone"));
        assert_eq!(loaded.details.leaders[0].name, "Bail Organa");
        assert_eq!(loaded.details.base.as_ref().unwrap().name, "[SOR_023]");
    }

    #[tokio::test]
    async fn second_leader_means_twin_suns() {
        let text = r#"{"leader": {"id": "SOR_001"}, "secondleader": {"id": "SOR_002"}}"#;
        let loaded = parse(text, "file:ts", "ts", "ts.json", &FixedCatalog).await.unwrap();
        assert_eq!(loaded.submission.deck.title, "ts");
        assert_eq!(loaded.submission.deck.format, DeckFormat::TwinSuns);
        assert_eq!(loaded.submission.cards.len(), 2);
        assert_eq!(loaded.details.leaders.len(), 2);
        assert!(loaded.details.author.is_none());
    }
}
