//! SWUDB deck URLs and the deck API response.

use anyhow::{bail, Context, Result};
use super::{CardRef, DeckDetails, LoadedDeck};
use cardusage_core::{CardKey, CardTally, DeckFormat, DeckSubmission, NewDeck};
use reqwest::Url;
use serde::Deserialize;
use tracing::{info, warn};

const API_BASE: &str = "https://www.swudb.com/api/deck";

pub fn is_deck_url(input: &str) -> bool {
    match Url::parse(input) {
        Ok(url) => {
            matches!(url.host_str(), Some("swudb.com") | Some("www.swudb.com"))
                && url.path().contains("/deck/")
        }
        Err(_) => false,
    }
}

/// `https://www.swudb.com/deck/<id>` -> `<id>`.
pub fn extract_deck_id(input: &str) -> Option<String> {
    let url = Url::parse(input).ok()?;
    let mut parts = url.path().trim_matches('/').split('/');
    match (parts.next(), parts.next()) {
        (Some("deck"), Some(id)) if !id.is_empty() => Some(id.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeckResponse {
    deck_name: Option<String>,
    deck_format: Option<i64>,
    author_name: Option<String>,
    leader: Option<CardData>,
    second_leader: Option<CardData>,
    base: Option<CardData>,
    #[serde(default)]
    shuffled_deck: Vec<DeckEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardData {
    #[serde(default)]
    card_name: String,
    title: Option<String>,
    #[serde(default)]
    default_expansion_abbreviation: String,
    #[serde(default)]
    default_card_number: String,
}

impl CardData {
    fn display_name(&self) -> String {
        match self.title.as_deref().filter(|t| !t.is_empty()) {
            Some(title) => format!("{} - {}", self.card_name, title),
            None => self.card_name.clone(),
        }
    }

    fn card_ref(&self) -> Option<CardRef> {
        let name = self.display_name();
        if name.is_empty() || self.default_expansion_abbreviation.is_empty() {
            return None;
        }
        match CardKey::normalize(&self.default_expansion_abbreviation, &self.default_card_number) {
            Ok(key) => Some(CardRef { key, name }),
            Err(e) => {
                warn!(card = %name, error = %e, "skipping card");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeckEntry {
    card: Option<CardData>,
    #[serde(default)]
    count: i64,
    #[serde(default)]
    sideboard_count: i64,
}

pub async fn fetch(client: &reqwest::Client, url: &str, deck_id: &str) -> Result<LoadedDeck> {
    let api_url = format!("{API_BASE}/{deck_id}");
    info!(%api_url, "fetching deck");
    let resp = client
        .get(&api_url)
        .send()
        .await
        .with_context(|| format!("fetching {api_url}"))?;
    if !resp.status().is_success() {
        bail!("failed to fetch deck (status {})", resp.status());
    }
    let body = resp.text().await.context("reading deck response")?;
    parse_response(&body, deck_id, url)
}

pub fn parse_response(body: &str, deck_id: &str, url: &str) -> Result<LoadedDeck> {
    let data: DeckResponse = serde_json::from_str(body).context("decoding deck response")?;
    let mut tally = CardTally::new();

    let leaders: Vec<CardRef> = [&data.leader, &data.second_leader]
        .into_iter()
        .flatten()
        .filter_map(CardData::card_ref)
        .collect();
    let base = data.base.as_ref().and_then(CardData::card_ref);
    for card in leaders.iter().chain(&base) {
        tally.add(card.key.clone(), card.name.clone(), 1);
    }
    for entry in &data.shuffled_deck {
        let total = entry.count.saturating_add(entry.sideboard_count);
        if total <= 0 {
            continue;
        }
        if let Some(card) = entry.card.as_ref().and_then(CardData::card_ref) {
            tally.add(card.key, card.name, total);
        }
    }

    let title = data
        .deck_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| deck_id.to_string());
    let format = DeckFormat::from_code(data.deck_format.unwrap_or(1));
    Ok(LoadedDeck {
        submission: DeckSubmission {
            deck: NewDeck::new(deck_id, title, url, format),
            cards: tally.into_entries(),
        },
        details: DeckDetails {
            author: data.author_name.filter(|a| !a.trim().is_empty()),
            leaders,
            base,
            ..DeckDetails::default()
        },
    })
}
