//! Records crossing the graph store boundary
//!
//! Nodes and edges carry their properties as a JSON object. Domain modules
//! convert these records into typed structs and never see raw rows.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::error::{Error, Result};

/// Label of a node in the property graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Skill,
    Mastery,
    User,
    Goal,
    Quest,
    Accomplishment,
}

impl NodeLabel {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skill => "Skill",
            Self::Mastery => "Mastery",
            Self::User => "User",
            Self::Goal => "Goal",
            Self::Quest => "Quest",
            Self::Accomplishment => "Accomplishment",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Skill" => Some(Self::Skill),
            "Mastery" => Some(Self::Mastery),
            "User" => Some(Self::User),
            "Goal" => Some(Self::Goal),
            "Quest" => Some(Self::Quest),
            "Accomplishment" => Some(Self::Accomplishment),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of a directed edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Skill requires a prerequisite skill
    Requires,
    /// Skill offers a mastery level
    HasMastery,
    /// User holds a skill at a level (`level` property)
    HasMasteryOf,
    /// User holds a skill (no level recorded)
    HasSkill,
    HasGoal,
    /// Goal's current step; exactly one while the goal is in progress
    HasActiveQuest,
    /// Goal's materialized steps, active or past
    HasQuest,
    /// Quest history chain, older to newer
    Precedes,
    AchievedGoal,
    /// User completed an accomplishment
    Completed,
    /// Accomplishment demonstrates a skill
    Demonstrates,
    /// Accomplishment fulfills a quest
    Fulfills,
}

impl EdgeType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requires => "REQUIRES",
            Self::HasMastery => "HAS_MASTERY",
            Self::HasMasteryOf => "HAS_MASTERY_OF",
            Self::HasSkill => "HAS_SKILL",
            Self::HasGoal => "HAS_GOAL",
            Self::HasActiveQuest => "HAS_ACTIVE_QUEST",
            Self::HasQuest => "HAS_QUEST",
            Self::Precedes => "PRECEDES",
            Self::AchievedGoal => "ACHIEVED_GOAL",
            Self::Completed => "COMPLETED",
            Self::Demonstrates => "DEMONSTRATES",
            Self::Fulfills => "FULFILLS",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == s)
    }

    /// Get all edge types
    pub fn all() -> &'static [EdgeType] {
        &[
            Self::Requires,
            Self::HasMastery,
            Self::HasMasteryOf,
            Self::HasSkill,
            Self::HasGoal,
            Self::HasActiveQuest,
            Self::HasQuest,
            Self::Precedes,
            Self::AchievedGoal,
            Self::Completed,
            Self::Demonstrates,
            Self::Fulfills,
        ]
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which end of an edge a one-hop match starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `(node)-[edge]->(neighbor)`
    Outgoing,
    /// `(neighbor)-[edge]->(node)`
    Incoming,
}

/// A node as stored
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub label: NodeLabel,
    /// Natural key, unique per label
    pub key: String,
    pub properties: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeRecord {
    /// String property, if present
    pub fn str_prop(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// String property that must be present
    pub fn required_str(&self, name: &str) -> Result<String> {
        self.str_prop(name).map(str::to_string).ok_or_else(|| {
            Error::Other(format!(
                "{} node {} is missing property '{}'",
                self.label, self.id, name
            ))
        })
    }

    /// Unsigned integer property, if present
    pub fn u64_prop(&self, name: &str) -> Option<u64> {
        self.properties.get(name).and_then(Value::as_u64)
    }

    /// Deserialize a structured property, if present
    pub fn json_prop<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.properties.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// Timestamp property stored as RFC 3339, if present and well formed
    pub fn time_prop(&self, name: &str) -> Option<DateTime<Utc>> {
        self.str_prop(name).and_then(parse_timestamp)
    }

    /// Fail unless this record carries `label`
    pub fn expect_label(&self, label: NodeLabel) -> Result<()> {
        if self.label == label {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "Expected a {} node, found {} node {}",
                label, self.label, self.id
            )))
        }
    }
}

/// An edge as stored
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub edge_type: EdgeType,
    pub properties: Value,
    pub created_at: DateTime<Utc>,
}

/// One-hop match result: the traversed edge and the node at its other end
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub edge: EdgeRecord,
    pub node: NodeRecord,
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn parse_properties(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(Default::default()))
}

// ========== Row Types ==========

#[derive(Debug, FromRow)]
pub(crate) struct NodeRow {
    id: String,
    label: String,
    natural_key: String,
    properties: String,
    created_at: String,
    updated_at: String,
}

impl NodeRow {
    pub(crate) fn into_record(self) -> Result<NodeRecord> {
        let label = NodeLabel::parse(&self.label)
            .ok_or_else(|| Error::Other(format!("Invalid node label: {}", self.label)))?;

        Ok(NodeRecord {
            id: self.id,
            label,
            key: self.natural_key,
            properties: parse_properties(&self.properties),
            created_at: parse_timestamp(&self.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_timestamp(&self.updated_at).unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EdgeRow {
    id: String,
    source_id: String,
    target_id: String,
    edge_type: String,
    properties: String,
    created_at: String,
}

impl EdgeRow {
    pub(crate) fn into_record(self) -> Result<EdgeRecord> {
        let edge_type = EdgeType::parse(&self.edge_type)
            .ok_or_else(|| Error::Other(format!("Invalid edge type: {}", self.edge_type)))?;

        Ok(EdgeRecord {
            id: self.id,
            source_id: self.source_id,
            target_id: self.target_id,
            edge_type,
            properties: parse_properties(&self.properties),
            created_at: parse_timestamp(&self.created_at).unwrap_or_else(Utc::now),
        })
    }
}

/// Joined edge + node row produced by one-hop matches
#[derive(Debug, FromRow)]
pub(crate) struct NeighborRow {
    edge_id: String,
    edge_source_id: String,
    edge_target_id: String,
    edge_type: String,
    edge_properties: String,
    edge_created_at: String,
    node_id: String,
    node_label: String,
    node_natural_key: String,
    node_properties: String,
    node_created_at: String,
    node_updated_at: String,
}

impl NeighborRow {
    pub(crate) fn into_neighbor(self) -> Result<Neighbor> {
        let edge = EdgeRow {
            id: self.edge_id,
            source_id: self.edge_source_id,
            target_id: self.edge_target_id,
            edge_type: self.edge_type,
            properties: self.edge_properties,
            created_at: self.edge_created_at,
        }
        .into_record()?;

        let node = NodeRow {
            id: self.node_id,
            label: self.node_label,
            natural_key: self.node_natural_key,
            properties: self.node_properties,
            created_at: self.node_created_at,
            updated_at: self.node_updated_at,
        }
        .into_record()?;

        Ok(Neighbor { edge, node })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(properties: Value) -> NodeRecord {
        NodeRecord {
            id: "n1".into(),
            label: NodeLabel::Goal,
            key: "n1".into(),
            properties,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_edge_type_roundtrip() {
        for edge_type in EdgeType::all() {
            assert_eq!(EdgeType::parse(edge_type.as_str()), Some(*edge_type));
        }
        assert_eq!(EdgeType::parse("requires"), None);
    }

    #[test]
    fn test_edge_type_serde_matches_storage_name() {
        let encoded = serde_json::to_string(&EdgeType::HasActiveQuest).unwrap();
        assert_eq!(encoded, "\"HAS_ACTIVE_QUEST\"");
    }

    #[test]
    fn test_label_parse() {
        assert_eq!(NodeLabel::parse("Quest"), Some(NodeLabel::Quest));
        assert_eq!(NodeLabel::parse("quest"), None);
    }

    #[test]
    fn test_property_accessors() {
        let node = record(json!({
            "text": "Learn Rust",
            "count": 3,
            "plan": ["a", "b"],
            "completed_at": "2024-05-01T10:00:00Z",
        }));

        assert_eq!(node.str_prop("text"), Some("Learn Rust"));
        assert_eq!(node.u64_prop("count"), Some(3));
        assert_eq!(
            node.json_prop::<Vec<String>>("plan").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(node.json_prop::<Vec<String>>("missing").unwrap().is_none());
        assert!(node.time_prop("completed_at").is_some());
        assert!(node.required_str("status").is_err());
    }

    #[test]
    fn test_expect_label() {
        let node = record(json!({}));
        assert!(node.expect_label(NodeLabel::Goal).is_ok());
        assert!(node.expect_label(NodeLabel::Quest).is_err());
    }

    #[test]
    fn test_malformed_properties_become_empty_object() {
        assert_eq!(parse_properties("not json"), json!({}));
    }
}
