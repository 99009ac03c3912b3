//! Canonical card identity: a set abbreviation plus a zero-padded collector number.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width collector numbers are padded to.
pub const NUMBER_WIDTH: usize = 3;

/// Main sets in chronological order.
pub const DEFAULT_MAIN_SETS: [&str; 6] = ["SOR", "SHD", "TWI", "JTL", "LOF", "SEC"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardKey {
    set: String,
    number: String,
}

impl CardKey {
    /// Builds a key, padding `raw_number` to [`NUMBER_WIDTH`] digits.
    ///
    /// Numbers wider than the pad width are kept as-is.
    pub fn normalize(set_abbr: &str, raw_number: &str) -> Result<Self, CoreError> {
        let set = set_abbr.trim();
        let number = raw_number.trim();
        if set.is_empty() {
            return Err(CoreError::InvalidCardId(format!("empty set for number {number:?}")));
        }
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidCardId(format!("{set} {number:?}")));
        }
        Ok(Self {
            set: set.to_string(),
            number: format!("{number:0>width$}", width = NUMBER_WIDTH),
        })
    }

    pub fn set(&self) -> &str {
        &self.set
    }

    pub fn number(&self) -> &str {
        &self.number
    }
}

impl fmt::Display for CardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.set, self.number)
    }
}

/// Ordered list of canonical set codes. Order is the preference order for
/// printings and the group order in reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MainSets(Vec<String>);

impl MainSets {
    pub fn new<I, S>(sets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut v: Vec<String> = Vec::new();
        for s in sets {
            let s = s.into().trim().to_string();
            if !s.is_empty() && !v.contains(&s) {
                v.push(s);
            }
        }
        Self(v)
    }

    pub fn contains(&self, set: &str) -> bool {
        self.position(set).is_some()
    }

    pub fn position(&self, set: &str) -> Option<usize> {
        self.0.iter().position(|s| s == set)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for MainSets {
    fn default() -> Self {
        Self::new(DEFAULT_MAIN_SETS)
    }
}

impl FromStr for MainSets {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sets = MainSets::new(s.split(','));
        if sets.is_empty() {
            return Err(CoreError::InvalidCardId("empty main-set list".into()));
        }
        Ok(sets)
    }
}

impl fmt::Display for MainSets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// Picks the canonical printing among `candidates`.
///
/// Candidates in a main set win, ranked by main-set order; otherwise the first
/// candidate is returned. `None` only for an empty slice.
pub fn select_primary<'a>(candidates: &'a [CardKey], main_sets: &MainSets) -> Option<&'a CardKey> {
    candidates
        .iter()
        .filter_map(|k| main_sets.position(k.set()).map(|pos| (pos, k)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, k)| k)
        .or_else(|| candidates.first())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Printing {
    pub primary: CardKey,
    /// Other sets the card was printed in, input order, primary set excluded.
    pub alternates: Vec<String>,
}

pub fn resolve_printing(candidates: &[CardKey], main_sets: &MainSets) -> Option<Printing> {
    let primary = select_primary(candidates, main_sets)?.clone();
    let mut alternates: Vec<String> = Vec::new();
    for k in candidates {
        if k.set() != primary.set() && !alternates.iter().any(|s| s == k.set()) {
            alternates.push(k.set().to_string());
        }
    }
    Some(Printing { primary, alternates })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(set: &str, num: &str) -> CardKey {
        CardKey::normalize(set, num).unwrap()
    }

    #[test]
    fn normalize_pads_to_width() {
        let k = key("SOR", "7");
        assert_eq!(k.number(), "007");
        assert_eq!(key("SOR", "1234").number(), "1234");
        assert_eq!(key(" SHD ", "010").to_string(), "SHD 010");
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert!(matches!(CardKey::normalize("", "1"), Err(CoreError::InvalidCardId(_))));
        assert!(matches!(CardKey::normalize("SOR", "12a"), Err(CoreError::InvalidCardId(_))));
        assert!(matches!(CardKey::normalize("SOR", ""), Err(CoreError::InvalidCardId(_))));
        assert!(matches!(CardKey::normalize("SOR", "-1"), Err(CoreError::InvalidCardId(_))));
    }

    #[test]
    fn primary_prefers_main_set() {
        let sets = MainSets::default();
        let cands = vec![key("P25", "130"), key("SEC", "018")];
        let p = resolve_printing(&cands, &sets).unwrap();
        assert_eq!(p.primary, key("SEC", "018"));
        assert_eq!(p.alternates, vec!["P25".to_string()]);
    }

    #[test]
    fn primary_ties_follow_main_set_order() {
        let sets = MainSets::new(["SOR", "SHD"]);
        let cands = vec![key("SHD", "002"), key("SOR", "005")];
        assert_eq!(select_primary(&cands, &sets), Some(&key("SOR", "005")));
    }

    #[test]
    fn primary_falls_back_to_first() {
        let sets = MainSets::new(["SOR"]);
        let cands = vec![key("P25", "130"), key("SOROP", "010")];
        assert_eq!(select_primary(&cands, &sets), Some(&key("P25", "130")));
        assert_eq!(select_primary(&[], &sets), None);
    }

    #[test]
    fn alternates_are_distinct() {
        let sets = MainSets::default();
        let cands = vec![key("SEC", "018"), key("SEC", "282"), key("P25", "130"), key("P25", "131")];
        let p = resolve_printing(&cands, &sets).unwrap();
        assert_eq!(p.primary, key("SEC", "018"));
        assert_eq!(p.alternates, vec!["P25".to_string()]);
    }

    #[test]
    fn main_sets_parse() {
        let s: MainSets = "SOR, SHD,,SOR".parse().unwrap();
        assert_eq!(s.iter().collect::<Vec<_>>(), vec!["SOR", "SHD"]);
        assert_eq!(s.to_string(), "SOR,SHD");
        assert!(" , ".parse::<MainSets>().is_err());
    }
}
