//! Mastery catalog
//!
//! Four fixed proficiency tiers. Each tier is a `Mastery` node keyed by its
//! number, seeded by migration; skills link to the tiers they offer and a
//! user's hold on a skill records one of them as its `level`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::graph::{NodeLabel, NodeRecord};

/// A proficiency tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MasteryLevel {
    Beginner = 1,
    Intermediate = 2,
    Advanced = 3,
    Expert = 4,
}

impl MasteryLevel {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Beginner),
            2 => Some(Self::Intermediate),
            3 => Some(Self::Advanced),
            4 => Some(Self::Expert),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
            Self::Expert => "Expert",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Beginner => "Has a basic understanding of the concepts.",
            Self::Intermediate => "Can apply the skill to simple projects without supervision.",
            Self::Advanced => "Can apply the skill to complex projects and mentor others.",
            Self::Expert => "Is a recognized authority on the skill, pushing its boundaries.",
        }
    }

    /// Parse from a tier name (any case) or number
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(level) = s.parse::<u8>() {
            return Self::from_u8(level).ok_or_else(|| Error::InvalidMasteryLevel(s.to_string()));
        }
        Self::all()
            .iter()
            .copied()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidMasteryLevel(s.to_string()))
    }

    pub fn all() -> &'static [MasteryLevel] {
        &[
            Self::Beginner,
            Self::Intermediate,
            Self::Advanced,
            Self::Expert,
        ]
    }

    /// Natural key of the tier's node
    pub fn node_key(&self) -> String {
        self.as_u8().to_string()
    }

    /// Properties the tier's node is created with
    pub(crate) fn node_properties(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
        })
    }
}

impl std::fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A catalog tier as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mastery {
    pub id: String,
    pub level: MasteryLevel,
    pub name: String,
    pub description: String,
}

impl TryFrom<NodeRecord> for Mastery {
    type Error = Error;

    fn try_from(record: NodeRecord) -> Result<Self> {
        record.expect_label(NodeLabel::Mastery)?;
        let level = record
            .key
            .parse::<u8>()
            .ok()
            .and_then(MasteryLevel::from_u8)
            .ok_or_else(|| Error::Other(format!("Invalid mastery node key: {}", record.key)))?;

        Ok(Self {
            name: record
                .str_prop("name")
                .unwrap_or_else(|| level.name())
                .to_string(),
            description: record
                .str_prop("description")
                .unwrap_or_else(|| level.description())
                .to_string(),
            id: record.id,
            level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_numbers_match_catalog() {
        assert_eq!(MasteryLevel::Beginner.as_u8(), 1);
        assert_eq!(MasteryLevel::Expert.as_u8(), 4);
        assert_eq!(MasteryLevel::from_u8(3), Some(MasteryLevel::Advanced));
        assert_eq!(MasteryLevel::from_u8(0), None);
        assert_eq!(MasteryLevel::from_u8(5), None);
    }

    #[test]
    fn test_parse_by_name_or_number() {
        assert_eq!(MasteryLevel::parse("expert").unwrap(), MasteryLevel::Expert);
        assert_eq!(MasteryLevel::parse(" Intermediate ").unwrap(), MasteryLevel::Intermediate);
        assert_eq!(MasteryLevel::parse("2").unwrap(), MasteryLevel::Intermediate);
        assert!(matches!(
            MasteryLevel::parse("guru"),
            Err(Error::InvalidMasteryLevel(_))
        ));
        assert!(MasteryLevel::parse("7").is_err());
    }

    #[test]
    fn test_ordering_follows_tiers() {
        assert!(MasteryLevel::Beginner < MasteryLevel::Expert);
    }

    #[test]
    fn test_from_record() {
        let record = NodeRecord {
            id: "mastery-2".into(),
            label: NodeLabel::Mastery,
            key: "2".into(),
            properties: MasteryLevel::Intermediate.node_properties(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mastery = Mastery::try_from(record).unwrap();
        assert_eq!(mastery.level, MasteryLevel::Intermediate);
        assert_eq!(mastery.name, "Intermediate");
    }
}
