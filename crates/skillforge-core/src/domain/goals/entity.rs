//! Goal, plan and quest types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{NodeLabel, NodeRecord};

/// Lifecycle state of a goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalStatus {
    /// Has exactly one active quest
    #[serde(rename = "in-progress", alias = "in_progress")]
    InProgress,
    /// Terminal; no active quest
    #[serde(rename = "completed")]
    Completed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in-progress" | "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of a goal's plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Estimated effort in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl PlanStep {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            duration_minutes: None,
        }
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }
}

/// An ordered, non-empty list of steps with distinct titles. Fixed once a
/// goal is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PlanStep>", into = "Vec<PlanStep>")]
pub struct GoalPlan {
    steps: Vec<PlanStep>,
}

impl GoalPlan {
    /// Validate and build a plan. Titles are trimmed.
    pub fn new(steps: Vec<PlanStep>) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::InvalidPlan("a plan needs at least one step".into()));
        }

        let mut normalized: Vec<PlanStep> = Vec::with_capacity(steps.len());
        for (index, mut step) in steps.into_iter().enumerate() {
            step.title = step.title.trim().to_string();
            if step.title.is_empty() {
                return Err(Error::InvalidPlan(format!("step {} has no title", index + 1)));
            }
            if normalized.iter().any(|s| s.title == step.title) {
                return Err(Error::InvalidPlan(format!(
                    "step title '{}' appears more than once",
                    step.title
                )));
            }
            normalized.push(step);
        }

        Ok(Self { steps: normalized })
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first(&self) -> &PlanStep {
        // Construction guarantees at least one step
        &self.steps[0]
    }

    pub fn step(&self, index: usize) -> Option<&PlanStep> {
        self.steps.get(index)
    }

    /// Position of the step titled `title`
    pub fn position_of(&self, title: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.title == title)
    }
}

impl TryFrom<Vec<PlanStep>> for GoalPlan {
    type Error = Error;

    fn try_from(steps: Vec<PlanStep>) -> Result<Self> {
        Self::new(steps)
    }
}

impl From<GoalPlan> for Vec<PlanStep> {
    fn from(plan: GoalPlan) -> Self {
        plan.steps
    }
}

/// A user's accepted objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_email: String,
    pub text: String,
    pub status: GoalStatus,
    pub plan: GoalPlan,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn is_completed(&self) -> bool {
        self.status == GoalStatus::Completed
    }
}

impl TryFrom<NodeRecord> for Goal {
    type Error = Error;

    fn try_from(record: NodeRecord) -> Result<Self> {
        record.expect_label(NodeLabel::Goal)?;

        let status_raw = record.required_str("status")?;
        let status = GoalStatus::parse(&status_raw)
            .ok_or_else(|| Error::Other(format!("Invalid goal status: {}", status_raw)))?;
        let plan: GoalPlan = record
            .json_prop("plan")?
            .ok_or_else(|| Error::Other(format!("Goal {} has no plan", record.id)))?;

        Ok(Self {
            user_email: record.required_str("user_email")?,
            text: record.str_prop("text").unwrap_or_default().to_string(),
            completed_at: record.time_prop("completed_at"),
            created_at: record.created_at,
            id: record.id,
            status,
            plan,
        })
    }
}

/// A materialized plan step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    /// Title of the plan step this quest materializes
    pub name: String,
    pub description: String,
    pub duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NodeRecord> for Quest {
    type Error = Error;

    fn try_from(record: NodeRecord) -> Result<Self> {
        record.expect_label(NodeLabel::Quest)?;
        Ok(Self {
            name: record.required_str("name")?,
            description: record.str_prop("description").unwrap_or_default().to_string(),
            duration_minutes: record
                .u64_prop("duration_minutes")
                .and_then(|m| u32::try_from(m).ok()),
            created_at: record.created_at,
            id: record.id,
        })
    }
}
