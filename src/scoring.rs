//! Set-based precision, recall and F1 between expected and detected
//! archetypes.
//!
//! | expected | detected | precision | recall | f1 | exact |
//! |---|---|---|---|---|---|
//! | ∅ | ∅ | 1.0 | 1.0 | 1.0 | true |
//! | ∅ | non-∅ | 0.0 | 1.0 | 0.0 | false |
//! | non-∅ | ∅ | 1.0 | 0.0 | 0.0 | false |
//! | non-∅ | non-∅ | \|∩\|/\|detected\| | \|∩\|/\|expected\| | harmonic mean | sets equal |

use serde::Serialize;
use std::collections::BTreeSet;

use crate::archetype::Archetype;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub exact_match: bool,
}

pub fn score(expected: &BTreeSet<Archetype>, detected: &BTreeSet<Archetype>) -> Score {
    match (expected.is_empty(), detected.is_empty()) {
        (true, true) => Score {
            precision: 1.0,
            recall: 1.0,
            f1: 1.0,
            exact_match: true,
        },
        (true, false) => Score {
            precision: 0.0,
            recall: 1.0,
            f1: 0.0,
            exact_match: false,
        },
        (false, true) => Score {
            precision: 1.0,
            recall: 0.0,
            f1: 0.0,
            exact_match: false,
        },
        (false, false) => {
            let hits = expected.intersection(detected).count() as f64;
            let precision = hits / detected.len() as f64;
            let recall = hits / expected.len() as f64;
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            Score {
                precision,
                recall,
                f1,
                exact_match: expected == detected,
            }
        }
    }
}
