//! Goals, plans and quests
//!
//! A goal is decomposed once into an ordered [`GoalPlan`]. Steps are
//! materialized as [`Quest`] nodes one at a time: the first when the goal is
//! created, each following one when the previous is completed through
//! [`GoalProgressionEngine::advance`].

mod entity;
mod lifecycle;
mod progression;

pub use entity::{Goal, GoalPlan, GoalStatus, PlanStep, Quest};
pub use lifecycle::GoalLifecycle;
pub use progression::{Advancement, GoalProgressionEngine};
