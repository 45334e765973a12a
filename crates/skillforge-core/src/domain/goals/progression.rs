//! Goal progression
//!
//! Advancing a goal moves its active-quest edge from the completed quest to
//! a newly materialized quest for the next plan step, or completes the goal
//! when the plan is exhausted. The match and every write happen in one
//! write transaction, so of several concurrent advances for the same quest
//! exactly one sees the active edge.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::entity::{Goal, GoalStatus, Quest};
use super::lifecycle::materialize_quest;
use crate::error::{Error, Result};
use crate::graph::{EdgeType, GraphStore, NodeLabel};

/// Outcome of [`GoalProgressionEngine::advance`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Advancement {
    /// The next step is now the goal's active quest
    Advanced(Quest),
    /// The completed quest was the last step; the goal is finished
    GoalCompleted(Goal),
    /// The quest is not the active quest of any of the user's goals
    NoActiveMatch,
}

impl Advancement {
    /// The newly active quest, if the goal moved on to one
    pub fn next_quest(&self) -> Option<&Quest> {
        match self {
            Self::Advanced(quest) => Some(quest),
            _ => None,
        }
    }

    pub fn is_goal_completed(&self) -> bool {
        matches!(self, Self::GoalCompleted(_))
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self, Self::NoActiveMatch)
    }
}

/// Drives goals through their plans
#[derive(Debug, Clone)]
pub struct GoalProgressionEngine {
    store: GraphStore,
}

impl GoalProgressionEngine {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Mark `quest_id` as completed by the user and move its goal along
    pub async fn advance(&self, quest_id: &str, email: &str) -> Result<Advancement> {
        let mut tx = self.store.begin_write().await?;

        let Some(user) = tx.find_node(NodeLabel::User, email.trim()).await? else {
            debug!(user = %email, quest_id = %quest_id, "Unknown user, nothing to advance");
            return Ok(Advancement::NoActiveMatch);
        };

        let mut matched = None;
        for owner in tx.sources(quest_id, EdgeType::HasActiveQuest).await? {
            if tx
                .find_edge(&user.id, EdgeType::HasGoal, &owner.node.id)
                .await?
                .is_some()
            {
                matched = Some(owner.node);
                break;
            }
        }

        let Some(goal_node) = matched else {
            tx.rollback().await?;
            debug!(
                user = %user.key,
                quest_id = %quest_id,
                "Quest is not active, nothing to advance"
            );
            return Ok(Advancement::NoActiveMatch);
        };

        let goal = Goal::try_from(goal_node)?;
        let quest = tx
            .find_node_by_id(quest_id)
            .await?
            .map(Quest::try_from)
            .transpose()?
            .ok_or_else(|| Error::QuestNotFound(quest_id.to_string()))?;

        let Some(position) = goal.plan.position_of(&quest.name) else {
            tx.rollback().await?;
            warn!(
                goal_id = %goal.id,
                quest_id = %quest.id,
                quest = %quest.name,
                "Active quest matches no step of the goal's plan"
            );
            return Ok(Advancement::NoActiveMatch);
        };

        tx.delete_edge(&goal.id, EdgeType::HasActiveQuest, &quest.id)
            .await?;

        if let Some(next_step) = goal.plan.step(position + 1) {
            let next = materialize_quest(&mut tx, next_step).await?;
            tx.merge_edge(&goal.id, EdgeType::HasActiveQuest, &next.id, &json!({}))
                .await?;
            tx.merge_edge(&goal.id, EdgeType::HasQuest, &next.id, &json!({}))
                .await?;
            tx.merge_edge(&quest.id, EdgeType::Precedes, &next.id, &json!({}))
                .await?;
            tx.commit().await?;

            let next = Quest::try_from(next)?;
            info!(
                goal_id = %goal.id,
                from = %quest.name,
                to = %next.name,
                step = position + 2,
                steps = goal.plan.len(),
                "Goal advanced"
            );
            return Ok(Advancement::Advanced(next));
        }

        let completed_at = Utc::now();
        tx.set_properties(
            &goal.id,
            &json!({
                "status": GoalStatus::Completed.as_str(),
                "completed_at": completed_at.to_rfc3339(),
            }),
        )
        .await?;
        tx.merge_edge(&user.id, EdgeType::AchievedGoal, &goal.id, &json!({}))
            .await?;
        tx.commit().await?;

        info!(user = %user.key, goal_id = %goal.id, "Goal completed");
        Ok(Advancement::GoalCompleted(Goal {
            status: GoalStatus::Completed,
            completed_at: Some(completed_at),
            ..goal
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::goals::{GoalLifecycle, GoalPlan, PlanStep};
    use crate::domain::users::UserProfile;
    use crate::storage::Database;

    struct Fixture {
        store: GraphStore,
        goals: GoalLifecycle,
        engine: GoalProgressionEngine,
    }

    async fn setup() -> Fixture {
        let db = Database::in_memory().await.expect("Failed to create database");
        let store = GraphStore::new(db);
        let users = UserProfile::new(store.clone());
        users.ensure_user("ada@example.com").await.unwrap();
        users.ensure_user("bob@example.com").await.unwrap();
        Fixture {
            goals: GoalLifecycle::new(store.clone()),
            engine: GoalProgressionEngine::new(store.clone()),
            store,
        }
    }

    fn plan(titles: &[&str]) -> GoalPlan {
        GoalPlan::new(titles.iter().map(|t| PlanStep::new(*t, "")).collect()).unwrap()
    }

    async fn edge_count(store: &GraphStore, edge_type: EdgeType) -> u64 {
        let mut tx = store.begin().await.unwrap();
        tx.count_edges(Some(edge_type)).await.unwrap()
    }

    #[tokio::test]
    async fn test_advance_to_next_step() {
        let f = setup().await;
        let (goal, first) = f
            .goals
            .create_goal("ada@example.com", "Learn", plan(&["A", "B", "C"]))
            .await
            .unwrap();

        let outcome = f.engine.advance(&first.id, "ada@example.com").await.unwrap();
        let second = outcome.next_quest().cloned().unwrap();
        assert_eq!(second.name, "B");

        let active = f.goals.active_quest(&goal.id).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(edge_count(&f.store, EdgeType::HasActiveQuest).await, 1);
        assert_eq!(edge_count(&f.store, EdgeType::Precedes).await, 1);

        let goal = f.goals.get_goal(&goal.id).await.unwrap().unwrap();
        assert_eq!(goal.status, GoalStatus::InProgress);
    }

    #[tokio::test]
    async fn test_full_plan_completes_goal() {
        let f = setup().await;
        let (goal, mut quest) = f
            .goals
            .create_goal("ada@example.com", "Learn", plan(&["A", "B", "C"]))
            .await
            .unwrap();

        for _ in 0..2 {
            quest = f
                .engine
                .advance(&quest.id, "ada@example.com")
                .await
                .unwrap()
                .next_quest()
                .cloned()
                .unwrap();
        }

        let outcome = f.engine.advance(&quest.id, "ada@example.com").await.unwrap();
        let Advancement::GoalCompleted(completed) = outcome else {
            panic!("expected goal completion, got {:?}", outcome);
        };
        assert_eq!(completed.id, goal.id);
        assert!(completed.completed_at.is_some());

        let stored = f.goals.get_goal(&goal.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GoalStatus::Completed);
        assert!(f.goals.active_quest(&goal.id).await.unwrap().is_none());

        let achieved = f.goals.achieved_goals("ada@example.com").await.unwrap();
        assert_eq!(achieved.len(), 1);

        let history: Vec<String> = f
            .goals
            .quest_history(&goal.id)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.name)
            .collect();
        assert_eq!(history, vec!["A", "B", "C"]);

        let mut tx = f.store.begin().await.unwrap();
        assert_eq!(tx.count_nodes(NodeLabel::Quest).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_single_step_plan_completes_immediately() {
        let f = setup().await;
        let (_, quest) = f
            .goals
            .create_goal("ada@example.com", "Quick", plan(&["Only"]))
            .await
            .unwrap();

        let outcome = f.engine.advance(&quest.id, "ada@example.com").await.unwrap();
        assert!(outcome.is_goal_completed());
    }

    #[tokio::test]
    async fn test_stale_quest_is_no_op() {
        let f = setup().await;
        let (_, first) = f
            .goals
            .create_goal("ada@example.com", "Learn", plan(&["A", "B", "C"]))
            .await
            .unwrap();
        f.engine.advance(&first.id, "ada@example.com").await.unwrap();

        let quests_before = {
            let mut tx = f.store.begin().await.unwrap();
            tx.count_nodes(NodeLabel::Quest).await.unwrap()
        };
        let edges_before = {
            let mut tx = f.store.begin().await.unwrap();
            tx.count_edges(None).await.unwrap()
        };

        let outcome = f.engine.advance(&first.id, "ada@example.com").await.unwrap();
        assert!(outcome.is_no_op());

        let mut tx = f.store.begin().await.unwrap();
        assert_eq!(tx.count_nodes(NodeLabel::Quest).await.unwrap(), quests_before);
        assert_eq!(tx.count_edges(None).await.unwrap(), edges_before);
    }

    #[tokio::test]
    async fn test_foreign_or_unknown_quest_is_no_op() {
        let f = setup().await;
        let (goal, first) = f
            .goals
            .create_goal("ada@example.com", "Learn", plan(&["A", "B"]))
            .await
            .unwrap();

        assert!(f.engine.advance(&first.id, "bob@example.com").await.unwrap().is_no_op());
        assert!(f.engine.advance(&first.id, "ghost@example.com").await.unwrap().is_no_op());
        assert!(f.engine.advance("no-such-quest", "ada@example.com").await.unwrap().is_no_op());

        let active = f.goals.active_quest(&goal.id).await.unwrap().unwrap();
        assert_eq!(active.id, first.id);
    }

    #[tokio::test]
    async fn test_plan_mismatch_is_no_op() {
        let f = setup().await;
        let (goal, first) = f
            .goals
            .create_goal("ada@example.com", "Learn", plan(&["A", "B"]))
            .await
            .unwrap();

        let mut tx = f.store.begin_write().await.unwrap();
        tx.set_properties(&first.id, &json!({"name": "Renamed"})).await.unwrap();
        tx.commit().await.unwrap();

        assert!(f.engine.advance(&first.id, "ada@example.com").await.unwrap().is_no_op());

        let active = f.goals.active_quest(&goal.id).await.unwrap().unwrap();
        assert_eq!(active.id, first.id);
    }

    #[test]
    fn test_outcome_serialization() {
        let value = serde_json::to_value(Advancement::NoActiveMatch).unwrap();
        assert_eq!(value, json!({"outcome": "no_active_match"}));
    }
}
