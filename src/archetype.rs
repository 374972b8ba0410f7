//! The five archetypes ("saboteurs") and the situational contexts a user
//! writes from.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Parrot,
    Peacock,
    Octopus,
    GoldenRetriever,
    Rabbit,
}

impl Archetype {
    pub const ALL: [Archetype; 5] = [
        Archetype::Parrot,
        Archetype::Peacock,
        Archetype::Octopus,
        Archetype::GoldenRetriever,
        Archetype::Rabbit,
    ];

    /// Stable identifier used in datasets and reports.
    pub fn id(self) -> &'static str {
        match self {
            Archetype::Parrot => "parrot",
            Archetype::Peacock => "peacock",
            Archetype::Octopus => "octopus",
            Archetype::GoldenRetriever => "golden_retriever",
            Archetype::Rabbit => "rabbit",
        }
    }

    /// Lower-case name as it appears in prose.
    pub fn name(self) -> &'static str {
        match self {
            Archetype::Parrot => "parrot",
            Archetype::Peacock => "peacock",
            Archetype::Octopus => "octopus",
            Archetype::GoldenRetriever => "golden retriever",
            Archetype::Rabbit => "rabbit",
        }
    }

    /// Descriptive alias phrase, lower-case.
    pub fn alias(self) -> &'static str {
        match self {
            Archetype::Parrot => "inner critic",
            Archetype::Peacock => "insecure performer",
            Archetype::Octopus => "anxious controller",
            Archetype::GoldenRetriever => "compulsive pleaser",
            Archetype::Rabbit => "restless escapist",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Archetype {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Archetype::ALL
            .into_iter()
            .find(|a| a.id() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown archetype: '{}'", s))
    }
}

/// The situation a user selected before writing their entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Situation {
    Setback,
    Decision,
    Procrastinating,
    Imposter,
    Overwhelmed,
}

impl Situation {
    pub const ALL: [Situation; 5] = [
        Situation::Setback,
        Situation::Decision,
        Situation::Procrastinating,
        Situation::Imposter,
        Situation::Overwhelmed,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Situation::Setback => "setback",
            Situation::Decision => "decision",
            Situation::Procrastinating => "procrastinating",
            Situation::Imposter => "imposter",
            Situation::Overwhelmed => "overwhelmed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Situation::Setback => "Facing a setback",
            Situation::Decision => "Paralyzed by a decision",
            Situation::Procrastinating => "Procrastinating",
            Situation::Imposter => "Feeling like an imposter",
            Situation::Overwhelmed => "Overwhelmed",
        }
    }

    /// The question the user was answering.
    pub fn prompt(self) -> &'static str {
        match self {
            Situation::Setback => {
                "What happened, and what story are you telling yourself about what it means?"
            }
            Situation::Decision => {
                "What's the decision, and what are you afraid will happen if you choose wrong?"
            }
            Situation::Procrastinating => {
                "What are you avoiding — the PRD, the conversation, the decision? What happens if you keep avoiding it?"
            }
            Situation::Imposter => {
                "What triggered this? What do you think they'll discover about you?"
            }
            Situation::Overwhelmed => {
                "What's on your plate right now? What feels most out of your control?"
            }
        }
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Situation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Situation::ALL.into_iter().find(|c| c.id() == s) {
            Some(c) => Ok(c),
            None => bail!("Unknown situation: '{}'", s),
        }
    }
}
