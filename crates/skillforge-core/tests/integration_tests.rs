//! SkillForge Core Integration Tests

use skillforge_core::{
    Error, SkillForge,
    domain::goals::{Advancement, GoalPlan, GoalStatus, PlanStep},
    domain::paths::{PathOrder, personalize},
    domain::skills::MasteryLevel,
    domain::users::NewAccomplishment,
    graph::{EdgeType, NodeLabel},
    storage::{Database, DatabaseConfig},
};
use std::collections::BTreeSet;
use tokio::task::JoinSet;

async fn forge() -> SkillForge {
    SkillForge::new(Database::in_memory().await.expect("Failed to create database"))
}

async fn link(forge: &SkillForge, dependent: &str, prerequisite: &str) {
    forge.upsert_skill(dependent, None).await.unwrap();
    forge.upsert_skill(prerequisite, None).await.unwrap();
    forge.add_skill_dependency(dependent, prerequisite).await.unwrap();
}

fn three_step_plan() -> GoalPlan {
    GoalPlan::new(vec![
        PlanStep::new("Set up toolchain", "Install rustup and cargo"),
        PlanStep::new("Read the book", "Chapters 1-10").with_duration(600),
        PlanStep::new("Build a CLI", "Ship something small"),
    ])
    .unwrap()
}

async fn node_count(forge: &SkillForge, label: NodeLabel) -> u64 {
    let mut tx = forge.store().begin().await.unwrap();
    tx.count_nodes(label).await.unwrap()
}

async fn edge_count(forge: &SkillForge, edge_type: Option<EdgeType>) -> u64 {
    let mut tx = forge.store().begin().await.unwrap();
    tx.count_edges(edge_type).await.unwrap()
}

#[tokio::test]
async fn test_skill_without_prerequisites_resolves_to_itself() {
    let forge = forge().await;
    forge.upsert_skill("Typing", Some("Touch typing")).await.unwrap();

    assert_eq!(forge.resolve_learning_path("Typing").await.unwrap(), vec!["Typing"]);
}

#[tokio::test]
async fn test_chain_resolves_with_depths() {
    let forge = forge().await;
    link(&forge, "A", "B").await;
    link(&forge, "B", "C").await;

    let path = forge.learning_path("A").await.unwrap();
    assert_eq!(path.depth_of("C"), Some(0));
    assert_eq!(path.depth_of("B"), Some(1));
    assert_eq!(path.depth_of("A"), Some(2));
    assert_eq!(path.names(), vec!["C", "B", "A"]);

    for _ in 0..3 {
        assert_eq!(forge.resolve_learning_path("A").await.unwrap(), vec!["C", "B", "A"]);
    }
}

#[tokio::test]
async fn test_target_first_order() {
    let forge = forge().await.with_path_order(PathOrder::TargetFirst);
    link(&forge, "A", "B").await;
    link(&forge, "B", "C").await;

    assert_eq!(forge.resolve_learning_path("A").await.unwrap(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_unknown_skill_resolves_to_empty_path() {
    let forge = forge().await;
    assert!(forge.resolve_learning_path("unknown-skill").await.unwrap().is_empty());
    assert!(forge
        .personalized_path("unknown-skill", "nobody@example.com")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_personalized_path_filters_possessed_skills() {
    let forge = forge().await;
    link(&forge, "Backend", "SQL").await;
    link(&forge, "Backend", "HTTP").await;
    link(&forge, "HTTP", "TCP").await;
    forge.users().ensure_user("ada@example.com").await.unwrap();
    forge
        .users()
        .assign_mastery("ada@example.com", "TCP", MasteryLevel::Expert)
        .await
        .unwrap();

    let full = forge.resolve_learning_path("Backend").await.unwrap();
    let personal = forge.personalized_path("Backend", "ada@example.com").await.unwrap();

    assert!(!personal.contains(&"TCP".to_string()));
    let expected: Vec<String> = full.iter().filter(|s| *s != "TCP").cloned().collect();
    assert_eq!(personal, expected);

    let possessed: BTreeSet<String> = full.iter().cloned().collect();
    assert!(personalize(&full, &possessed).is_empty());
}

#[tokio::test]
async fn test_upsert_twice_yields_one_skill() {
    let forge = forge().await;
    forge.upsert_skill("Rust", None).await.unwrap();
    forge.upsert_skill("Rust", None).await.unwrap();

    assert_eq!(node_count(&forge, NodeLabel::Skill).await, 1);
}

#[tokio::test]
async fn test_dependency_cycle_rejected() {
    let forge = forge().await;
    link(&forge, "A", "B").await;
    link(&forge, "B", "C").await;

    let err = forge.add_skill_dependency("C", "A").await.unwrap_err();
    assert!(matches!(err, Error::DependencyCycle { .. }));
    assert_eq!(err.code(), "E102");
    assert_eq!(edge_count(&forge, Some(EdgeType::Requires)).await, 2);
}

#[tokio::test]
async fn test_add_dependency_missing_skill() {
    let forge = forge().await;
    forge.upsert_skill("A", None).await.unwrap();

    let err = forge.add_skill_dependency("A", "Nope").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_first_advance_moves_active_quest() {
    let forge = forge().await;
    forge.users().ensure_user("ada@example.com").await.unwrap();
    let (goal, first) = forge
        .create_goal_with_first_quest("ada@example.com", "Learn Rust", three_step_plan())
        .await
        .unwrap();

    let quests_before = node_count(&forge, NodeLabel::Quest).await;
    let outcome = forge.advance_goal(&first.id, "ada@example.com").await.unwrap();
    let second = outcome.next_quest().cloned().expect("expected a next quest");

    assert_eq!(second.name, "Read the book");
    assert_eq!(second.duration_minutes, Some(600));
    assert_eq!(node_count(&forge, NodeLabel::Quest).await, quests_before + 1);

    let active = forge.goals().active_quest(&goal.id).await.unwrap().unwrap();
    assert_eq!(active.id, second.id);
    assert_eq!(edge_count(&forge, Some(EdgeType::HasActiveQuest)).await, 1);

    let mut tx = forge.store().begin().await.unwrap();
    assert!(tx
        .find_edge(&first.id, EdgeType::Precedes, &second.id)
        .await
        .unwrap()
        .is_some());
    drop(tx);

    let goal = forge.goals().get_goal(&goal.id).await.unwrap().unwrap();
    assert_eq!(goal.status, GoalStatus::InProgress);
}

#[tokio::test]
async fn test_third_advance_completes_goal() {
    let forge = forge().await;
    forge.users().ensure_user("ada@example.com").await.unwrap();
    let (goal, first) = forge
        .create_goal_with_first_quest("ada@example.com", "Learn Rust", three_step_plan())
        .await
        .unwrap();

    let second = forge.advance_goal(&first.id, "ada@example.com").await.unwrap();
    let third = forge
        .advance_goal(&second.next_quest().unwrap().id, "ada@example.com")
        .await
        .unwrap();
    let third = third.next_quest().unwrap().clone();

    let quests_before = node_count(&forge, NodeLabel::Quest).await;
    let outcome = forge.advance_goal(&third.id, "ada@example.com").await.unwrap();

    assert!(matches!(outcome, Advancement::GoalCompleted(ref g) if g.id == goal.id));
    assert_eq!(node_count(&forge, NodeLabel::Quest).await, quests_before);
    assert_eq!(edge_count(&forge, Some(EdgeType::HasActiveQuest)).await, 0);

    let goal = forge.goals().get_goal(&goal.id).await.unwrap().unwrap();
    assert_eq!(goal.status, GoalStatus::Completed);

    let achieved = forge.goals().achieved_goals("ada@example.com").await.unwrap();
    assert_eq!(achieved.iter().map(|g| g.id.as_str()).collect::<Vec<_>>(), vec![goal.id.as_str()]);

    let history: Vec<String> = forge
        .goals()
        .quest_history(&goal.id)
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.name)
        .collect();
    assert_eq!(history, vec!["Set up toolchain", "Read the book", "Build a CLI"]);
}

#[tokio::test]
async fn test_advance_with_inactive_quest_changes_nothing() {
    let forge = forge().await;
    forge.users().ensure_user("ada@example.com").await.unwrap();
    let (_, first) = forge
        .create_goal_with_first_quest("ada@example.com", "Learn Rust", three_step_plan())
        .await
        .unwrap();
    forge.advance_goal(&first.id, "ada@example.com").await.unwrap();

    let quests = node_count(&forge, NodeLabel::Quest).await;
    let edges = edge_count(&forge, None).await;

    let outcome = forge.advance_goal(&first.id, "ada@example.com").await.unwrap();
    assert_eq!(outcome, Advancement::NoActiveMatch);
    assert_eq!(node_count(&forge, NodeLabel::Quest).await, quests);
    assert_eq!(edge_count(&forge, None).await, edges);
}

#[tokio::test]
async fn test_goal_requires_registered_user() {
    let forge = forge().await;
    let err = forge
        .create_goal_with_first_quest("ghost@example.com", "Learn", three_step_plan())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UserNotFound(_)));
    assert_eq!(node_count(&forge, NodeLabel::Goal).await, 0);
}

#[tokio::test]
async fn test_accomplishment_for_quest_does_not_advance() {
    let forge = forge().await;
    forge.users().ensure_user("ada@example.com").await.unwrap();
    let (goal, first) = forge
        .create_goal_with_first_quest("ada@example.com", "Learn Rust", three_step_plan())
        .await
        .unwrap();

    let recorded = forge
        .accomplishments()
        .record_accomplishment(
            "ada@example.com",
            NewAccomplishment::new("Installed rustup", "Works on my machine")
                .for_quest(&first.id)
                .with_skill("Tooling"),
        )
        .await
        .unwrap();
    assert_eq!(recorded.quest_id.as_deref(), Some(first.id.as_str()));

    let active = forge.goals().active_quest(&goal.id).await.unwrap().unwrap();
    assert_eq!(active.id, first.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_advances_transition_once() {
    let dir = tempfile::tempdir().unwrap();
    let database = Database::new(
        DatabaseConfig::with_path(dir.path().join("race.db")).max_connections(4),
    )
    .await
    .unwrap();
    let forge = SkillForge::new(database);

    forge.users().ensure_user("ada@example.com").await.unwrap();
    let (goal, first) = forge
        .create_goal_with_first_quest("ada@example.com", "Learn Rust", three_step_plan())
        .await
        .unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..6 {
        let forge = forge.clone();
        let quest_id = first.id.clone();
        tasks.spawn(async move { forge.advance_goal(&quest_id, "ada@example.com").await });
    }

    let mut advanced = 0;
    let mut no_op = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap().unwrap() {
            Advancement::Advanced(_) => advanced += 1,
            Advancement::NoActiveMatch => no_op += 1,
            Advancement::GoalCompleted(_) => panic!("a three-step goal cannot complete here"),
        }
    }

    assert_eq!(advanced, 1);
    assert_eq!(no_op, 5);
    assert_eq!(node_count(&forge, NodeLabel::Quest).await, 2);
    assert_eq!(edge_count(&forge, Some(EdgeType::HasActiveQuest)).await, 1);

    let history = forge.goals().quest_history(&goal.id).await.unwrap();
    assert_eq!(history.len(), 2);

    forge.close().await;
}

#[tokio::test]
async fn test_write_epoch_tracks_writes() {
    let forge = forge().await;
    let start = forge.store().write_epoch().await.unwrap();

    forge.resolve_learning_path("Nothing").await.unwrap();
    assert_eq!(forge.store().write_epoch().await.unwrap(), start);

    forge.upsert_skill("Rust", None).await.unwrap();
    assert!(forge.store().write_epoch().await.unwrap() > start);
}
