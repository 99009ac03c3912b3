//! Picklist text: a `[ ] Name` line followed by the printings it exists in,
//! e.g. `SEC 018, SEC 282, P25 130`.

use super::{DeckDetails, LoadedDeck};
use cardusage_core::{resolve_printing, CardKey, CardTally, DeckFormat, DeckSubmission, MainSets, NewDeck};
use once_cell::sync::Lazy;
use regex::Regex;

static SET_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z0-9]+)\s+(\d+)").expect("set code pattern"));

const CARD_MARK: &str = "[ ]";
const SECTION_MARK: &str = "-----";

pub fn parse_set_codes(line: &str) -> Vec<CardKey> {
    SET_CODE
        .captures_iter(line)
        .filter_map(|c| CardKey::normalize(&c[1], &c[2]).ok())
        .collect()
}

/// Every listed card counts once; repeated names add up. Picklists carry no
/// header, so the deck is titled after the file `stem`.
pub fn parse(text: &str, deck_id: &str, stem: &str, url: &str, main_sets: &MainSets) -> LoadedDeck {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut tally = CardTally::new();
    let mut details = DeckDetails::default();

    let mut i = 0;
    while i < lines.len() {
        if let Some(name) = lines[i].strip_prefix(CARD_MARK) {
            if let Some(next) = lines.get(i + 1) {
                if !next.is_empty() && !next.starts_with(CARD_MARK) && !next.starts_with(SECTION_MARK) {
                    if let Some(p) = resolve_printing(&parse_set_codes(next), main_sets) {
                        if !p.alternates.is_empty() {
                            details.alternates.entry(p.primary.clone()).or_insert(p.alternates);
                        }
                        tally.add(p.primary, name.trim(), 1);
                    }
                    i += 1;
                }
            }
        }
        i += 1;
    }

    LoadedDeck {
        submission: DeckSubmission {
            deck: NewDeck::new(deck_id, stem, url, DeckFormat::Unknown),
            cards: tally.into_entries(),
        },
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_codes() {
        let keys = parse_set_codes("SEC 018, SEC 282, P25 130, SOROP 10");
        let s: Vec<_> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(s, vec!["SEC 018", "SEC 282", "P25 130", "SOROP 010"]);
        assert!(parse_set_codes("nothing here").is_empty());
    }

    #[test]
    fn picks_primary_printing_and_counts() {
        let text = "\
Leaders
-----
[ ] Bail Organa - Doing Everything He Can
P25 130, SEC 018
[ ] Bail Organa - Doing Everything He Can
SEC 018
[ ] Promo Only
P25 200
[ ] Missing codes
[ ] Battlefield Marine
SOR 095, SOR 095, SHD 300
";
        let loaded = parse(text, "file:picks", "picks", "picks.txt", &MainSets::default());
        let sub = &loaded.submission;
        assert_eq!(sub.deck.deck_id, "file:picks");
        assert_eq!(sub.deck.title, "picks");
        assert_eq!(sub.deck.format, DeckFormat::Unknown);

        let got: Vec<_> = sub
            .cards
            .iter()
            .map(|c| (c.key.to_string(), c.quantity))
            .collect();
        assert_eq!(
            got,
            vec![
                ("SEC 018".to_string(), 2),
                ("P25 200".to_string(), 1),
                ("SOR 095".to_string(), 1),
            ]
        );

        let sec18 = CardKey::normalize("SEC", "18").unwrap();
        let sor95 = CardKey::normalize("SOR", "95").unwrap();
        assert_eq!(loaded.details.alternates[&sec18], vec!["P25".to_string()]);
        assert_eq!(loaded.details.alternates[&sor95], vec!["SHD".to_string()]);
        assert_eq!(loaded.details.alternates.len(), 2);
        assert!(loaded.details.author.is_none());
    }
}
