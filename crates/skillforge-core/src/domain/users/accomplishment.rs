//! Accomplishments
//!
//! A user's completed piece of work. It can demonstrate skills (which then
//! count as possessed) and fulfill a quest. Recording one never advances a
//! goal by itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::profile::require_user;
use crate::domain::skills::upsert_skill_in;
use crate::error::{Error, Result};
use crate::graph::{EdgeType, GraphStore, GraphTransaction, NodeLabel, NodeRecord};

/// A stored accomplishment with its links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accomplishment {
    pub id: String,
    pub name: String,
    pub description: String,
    pub proof_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Quest this accomplishment fulfills
    pub quest_id: Option<String>,
    /// Names of demonstrated skills
    pub skills: Vec<String>,
}

impl TryFrom<NodeRecord> for Accomplishment {
    type Error = Error;

    fn try_from(record: NodeRecord) -> Result<Self> {
        record.expect_label(NodeLabel::Accomplishment)?;
        Ok(Self {
            name: record.required_str("name")?,
            description: record.str_prop("description").unwrap_or_default().to_string(),
            proof_url: record.str_prop("proof_url").map(str::to_string),
            timestamp: record.time_prop("timestamp").unwrap_or(record.created_at),
            id: record.id,
            quest_id: None,
            skills: Vec::new(),
        })
    }
}

/// Input for recording an accomplishment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAccomplishment {
    pub name: String,
    pub description: String,
    pub proof_url: Option<String>,
    pub quest_id: Option<String>,
    /// Skills to link as demonstrated; created if absent
    pub skills: Vec<String>,
}

impl NewAccomplishment {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_proof_url(mut self, url: impl Into<String>) -> Self {
        self.proof_url = Some(url.into());
        self
    }

    pub fn for_quest(mut self, quest_id: impl Into<String>) -> Self {
        self.quest_id = Some(quest_id.into());
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }
}

async fn load_links(tx: &mut GraphTransaction, accomplishment: &mut Accomplishment) -> Result<()> {
    accomplishment.quest_id = tx
        .targets(&accomplishment.id, EdgeType::Fulfills)
        .await?
        .into_iter()
        .next()
        .map(|n| n.node.id);
    accomplishment.skills = tx
        .targets(&accomplishment.id, EdgeType::Demonstrates)
        .await?
        .into_iter()
        .map(|n| n.node.key)
        .collect();
    Ok(())
}

/// Records and reads accomplishments
#[derive(Debug, Clone)]
pub struct AccomplishmentLog {
    store: GraphStore,
}

impl AccomplishmentLog {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Record a completed piece of work for the user
    pub async fn record_accomplishment(
        &self,
        email: &str,
        new: NewAccomplishment,
    ) -> Result<Accomplishment> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Accomplishment name cannot be empty".into()));
        }

        let mut tx = self.store.begin_write().await?;
        let user = require_user(&mut tx, email).await?;

        let quest = match &new.quest_id {
            Some(quest_id) => match tx.find_node_by_id(quest_id).await? {
                Some(node) if node.label == NodeLabel::Quest => Some(node),
                _ => return Err(Error::QuestNotFound(quest_id.clone())),
            },
            None => None,
        };

        let timestamp = Utc::now();
        let node = tx
            .create_node(
                NodeLabel::Accomplishment,
                &json!({
                    "name": name,
                    "description": new.description,
                    "proof_url": new.proof_url,
                    "timestamp": timestamp.to_rfc3339(),
                }),
            )
            .await?;
        tx.merge_edge(&user.id, EdgeType::Completed, &node.id, &json!({}))
            .await?;

        if let Some(quest) = &quest {
            tx.merge_edge(&node.id, EdgeType::Fulfills, &quest.id, &json!({}))
                .await?;
        }

        for skill in &new.skills {
            let (skill, _) = upsert_skill_in(&mut tx, skill, None).await?;
            tx.merge_edge(&node.id, EdgeType::Demonstrates, &skill.id, &json!({}))
                .await?;
        }

        let mut accomplishment = Accomplishment::try_from(node)?;
        load_links(&mut tx, &mut accomplishment).await?;
        tx.commit().await?;

        info!(
            user = %user.key,
            accomplishment_id = %accomplishment.id,
            skills = accomplishment.skills.len(),
            "Accomplishment recorded"
        );
        Ok(accomplishment)
    }

    /// Link an accomplishment to a skill it demonstrates, creating the
    /// skill if needed. Returns false if the link already existed.
    pub async fn link_accomplishment_to_skill(&self, id: &str, skill: &str) -> Result<bool> {
        let mut tx = self.store.begin_write().await?;
        let node = match tx.find_node_by_id(id).await? {
            Some(node) if node.label == NodeLabel::Accomplishment => node,
            _ => return Err(Error::AccomplishmentNotFound(id.to_string())),
        };

        let (skill, _) = upsert_skill_in(&mut tx, skill, None).await?;
        let created = tx
            .merge_edge(&node.id, EdgeType::Demonstrates, &skill.id, &json!({}))
            .await?;
        tx.commit().await?;

        if created {
            info!(accomplishment_id = %id, skill = %skill.name, "Accomplishment linked to skill");
        }
        Ok(created)
    }

    pub async fn get_accomplishment(&self, id: &str) -> Result<Option<Accomplishment>> {
        let mut tx = self.store.begin().await?;
        let Some(node) = tx.find_node_by_id(id).await? else {
            return Ok(None);
        };
        if node.label != NodeLabel::Accomplishment {
            return Ok(None);
        }

        let mut accomplishment = Accomplishment::try_from(node)?;
        load_links(&mut tx, &mut accomplishment).await?;
        Ok(Some(accomplishment))
    }

    /// The user's accomplishments, oldest first
    pub async fn accomplishments_for_user(&self, email: &str) -> Result<Vec<Accomplishment>> {
        let mut tx = self.store.begin().await?;
        let user = require_user(&mut tx, email).await?;

        let mut accomplishments = Vec::new();
        for completed in tx.targets(&user.id, EdgeType::Completed).await? {
            let mut accomplishment = Accomplishment::try_from(completed.node)?;
            load_links(&mut tx, &mut accomplishment).await?;
            accomplishments.push(accomplishment);
        }

        accomplishments.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(accomplishments)
    }
}
