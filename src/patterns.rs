//! Archetype detection in free-text model output.
//!
//! Case-insensitive substring search for each archetype's name and,
//! optionally, its alias phrase. This is a keyword heuristic: it fires on
//! negations ("this isn't the Parrot") and misses paraphrases. Scores
//! computed from it inherit those errors.

use std::collections::BTreeSet;

use crate::archetype::Archetype;

/// Which keyword table to match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordTable {
    /// Archetype names only ("parrot", "golden retriever", ...).
    NamesOnly,
    /// Names plus alias phrases ("inner critic", ...).
    NamesAndAliases,
}

impl KeywordTable {
    pub fn from_match_aliases(match_aliases: bool) -> Self {
        if match_aliases {
            KeywordTable::NamesAndAliases
        } else {
            KeywordTable::NamesOnly
        }
    }

    fn keywords(self, archetype: Archetype) -> Vec<&'static str> {
        match self {
            KeywordTable::NamesOnly => vec![archetype.name()],
            KeywordTable::NamesAndAliases => vec![archetype.name(), archetype.alias()],
        }
    }
}

/// The set of archetypes mentioned in `response`.
pub fn extract(response: &str, table: KeywordTable) -> BTreeSet<Archetype> {
    let lower = response.to_lowercase();
    Archetype::ALL
        .into_iter()
        .filter(|a| table.keywords(*a).iter().any(|kw| lower.contains(kw)))
        .collect()
}
