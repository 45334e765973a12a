//! Goal creation and goal/quest reads
//!
//! Graph shape of a goal:
//!
//! ```text
//! (User)-[HAS_GOAL]->(Goal)-[HAS_ACTIVE_QUEST]->(Quest)      while in progress
//!                    (Goal)-[HAS_QUEST]->(Quest)             every materialized step
//!                    (Quest)-[PRECEDES]->(Quest)             history, oldest first
//! (User)-[ACHIEVED_GOAL]->(Goal)                             once completed
//! ```

use std::collections::HashSet;

use serde_json::json;
use tracing::info;

use super::entity::{Goal, GoalPlan, GoalStatus, PlanStep, Quest};
use crate::domain::users::require_user;
use crate::error::{Error, Result};
use crate::graph::{EdgeType, GraphStore, GraphTransaction, NodeLabel, NodeRecord};

/// Create a Quest node for `step`
pub(crate) async fn materialize_quest(
    tx: &mut GraphTransaction,
    step: &PlanStep,
) -> Result<NodeRecord> {
    tx.create_node(
        NodeLabel::Quest,
        &json!({
            "name": step.title,
            "description": step.description,
            "duration_minutes": step.duration_minutes,
        }),
    )
    .await
}

async fn require_goal(tx: &mut GraphTransaction, goal_id: &str) -> Result<NodeRecord> {
    match tx.find_node_by_id(goal_id).await? {
        Some(node) if node.label == NodeLabel::Goal => Ok(node),
        _ => Err(Error::GoalNotFound(goal_id.to_string())),
    }
}

/// Goal creation and reads
#[derive(Debug, Clone)]
pub struct GoalLifecycle {
    store: GraphStore,
}

impl GoalLifecycle {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Create an in-progress goal for the user with the plan's first step
    /// as its active quest. Everything is written in one transaction.
    pub async fn create_goal(
        &self,
        email: &str,
        text: &str,
        plan: GoalPlan,
    ) -> Result<(Goal, Quest)> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("Goal text cannot be empty".into()));
        }

        let plan_value = serde_json::to_value(&plan)?;

        let mut tx = self.store.begin_write().await?;
        let user = require_user(&mut tx, email).await?;

        let goal_node = tx
            .create_node(
                NodeLabel::Goal,
                &json!({
                    "user_email": user.key,
                    "text": text,
                    "status": GoalStatus::InProgress.as_str(),
                    "plan": plan_value,
                    "completed_at": null,
                }),
            )
            .await?;
        tx.merge_edge(&user.id, EdgeType::HasGoal, &goal_node.id, &json!({}))
            .await?;

        let quest_node = materialize_quest(&mut tx, plan.first()).await?;
        tx.merge_edge(&goal_node.id, EdgeType::HasActiveQuest, &quest_node.id, &json!({}))
            .await?;
        tx.merge_edge(&goal_node.id, EdgeType::HasQuest, &quest_node.id, &json!({}))
            .await?;

        tx.commit().await?;

        let goal = Goal::try_from(goal_node)?;
        let quest = Quest::try_from(quest_node)?;
        info!(
            user = %goal.user_email,
            goal_id = %goal.id,
            quest_id = %quest.id,
            steps = goal.plan.len(),
            "Goal created"
        );
        Ok((goal, quest))
    }

    pub async fn get_goal(&self, goal_id: &str) -> Result<Option<Goal>> {
        let mut tx = self.store.begin().await?;
        match tx.find_node_by_id(goal_id).await? {
            Some(node) if node.label == NodeLabel::Goal => Ok(Some(Goal::try_from(node)?)),
            _ => Ok(None),
        }
    }

    pub async fn get_quest(&self, quest_id: &str) -> Result<Option<Quest>> {
        let mut tx = self.store.begin().await?;
        match tx.find_node_by_id(quest_id).await? {
            Some(node) if node.label == NodeLabel::Quest => Ok(Some(Quest::try_from(node)?)),
            _ => Ok(None),
        }
    }

    /// The user's goals, oldest first
    pub async fn goals_for_user(&self, email: &str) -> Result<Vec<Goal>> {
        self.user_goals(email, EdgeType::HasGoal).await
    }

    /// Goals the user has completed, oldest first
    pub async fn achieved_goals(&self, email: &str) -> Result<Vec<Goal>> {
        self.user_goals(email, EdgeType::AchievedGoal).await
    }

    async fn user_goals(&self, email: &str, edge_type: EdgeType) -> Result<Vec<Goal>> {
        let mut tx = self.store.begin().await?;
        let user = require_user(&mut tx, email).await?;

        let mut goals = tx
            .targets(&user.id, edge_type)
            .await?
            .into_iter()
            .map(|n| Goal::try_from(n.node))
            .collect::<Result<Vec<_>>>()?;
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(goals)
    }

    /// The goal's current quest; `None` once the goal is completed
    pub async fn active_quest(&self, goal_id: &str) -> Result<Option<Quest>> {
        let mut tx = self.store.begin().await?;
        let goal = require_goal(&mut tx, goal_id).await?;

        tx.targets(&goal.id, EdgeType::HasActiveQuest)
            .await?
            .into_iter()
            .next()
            .map(|n| Quest::try_from(n.node))
            .transpose()
    }

    /// Every quest materialized for the goal, in `PRECEDES` order
    pub async fn quest_history(&self, goal_id: &str) -> Result<Vec<Quest>> {
        let mut tx = self.store.begin().await?;
        let goal = require_goal(&mut tx, goal_id).await?;

        let quests: Vec<NodeRecord> = tx
            .targets(&goal.id, EdgeType::HasQuest)
            .await?
            .into_iter()
            .map(|n| n.node)
            .collect();
        let ids: HashSet<&str> = quests.iter().map(|q| q.id.as_str()).collect();

        // The head is the quest no other quest of this goal precedes
        let mut head = None;
        for quest in &quests {
            let preceded = tx
                .sources(&quest.id, EdgeType::Precedes)
                .await?
                .iter()
                .any(|p| ids.contains(p.node.id.as_str()));
            if !preceded {
                head = Some(quest.clone());
                break;
            }
        }

        let mut history = Vec::with_capacity(quests.len());
        let mut seen = HashSet::new();
        let mut current = head;
        while let Some(node) = current.take() {
            if !seen.insert(node.id.clone()) {
                break;
            }
            current = tx
                .targets(&node.id, EdgeType::Precedes)
                .await?
                .into_iter()
                .map(|n| n.node)
                .find(|n| ids.contains(n.id.as_str()));
            history.push(Quest::try_from(node)?);
        }

        Ok(history)
    }
}
