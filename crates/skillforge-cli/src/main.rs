//! SkillForge CLI - skill graph, learning paths and quest-driven goals

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use skillforge_core::SkillForge;
use skillforge_core::config::Config;
use skillforge_core::domain::goals::{Advancement, GoalPlan, PlanStep};
use skillforge_core::domain::paths::PathOrder;
use skillforge_core::domain::skills::MasteryLevel;
use skillforge_core::domain::users::NewAccomplishment;
use skillforge_core::graph::NodeLabel;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "skillforge")]
#[command(
    author,
    version,
    about = "Skill graph, learning paths and quest-driven goals",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OrderArg {
    FundamentalsFirst,
    TargetFirst,
}

impl From<OrderArg> for PathOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::FundamentalsFirst => PathOrder::FundamentalsFirst,
            OrderArg::TargetFirst => PathOrder::TargetFirst,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage skills and their prerequisites
    Skills {
        #[command(subcommand)]
        action: SkillAction,
    },

    /// Resolve the learning path to a skill
    Path {
        /// Target skill
        skill: String,
        /// Drop skills this user already has
        #[arg(short, long)]
        user: Option<String>,
        /// Override the configured ordering
        #[arg(short, long)]
        order: Option<OrderArg>,
    },

    /// Manage users and their skills
    Users {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage goals and advance quests
    Goals {
        #[command(subcommand)]
        action: GoalAction,
    },

    /// Record and list accomplishments
    Accomplishments {
        #[command(subcommand)]
        action: AccomplishmentAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum SkillAction {
    /// Create a skill or update its description
    Add {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List all skills
    List,
    /// Show skill details
    Show { name: String },
    /// Rename a skill
    Rename { old_name: String, new_name: String },
    /// Delete a skill and its edges
    Delete {
        name: String,
        #[arg(long)]
        force: bool,
    },
    /// Record that DEPENDENT requires PREREQUISITE
    Depend {
        dependent: String,
        prerequisite: String,
    },
    /// Remove a prerequisite edge
    Undepend {
        dependent: String,
        prerequisite: String,
    },
    /// Show a skill's direct prerequisites
    Deps { name: String },
    /// Show the mastery levels defined for a skill
    Mastery { name: String },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a user
    Add { email: String },
    /// Show a user and their skills
    Show { email: String },
    /// Record that a user holds a skill at a mastery level
    Assign {
        email: String,
        skill: String,
        /// Level name or number (beginner, 1, ..., expert, 4)
        level: String,
    },
    /// List the skills a user holds
    Skills { email: String },
    /// Remove a skill from a user
    Unassign { email: String, skill: String },
}

#[derive(Subcommand)]
enum GoalAction {
    /// Create a goal with its first quest active
    Create {
        email: String,
        text: String,
        /// Plan step as "Title: description" (repeatable, in order)
        #[arg(short, long = "step")]
        steps: Vec<String>,
        /// JSON file with an array of {title, description, duration_minutes}
        #[arg(long, conflicts_with = "steps")]
        plan_file: Option<PathBuf>,
    },
    /// List a user's goals
    List {
        email: String,
        /// Only completed goals
        #[arg(long)]
        achieved: bool,
    },
    /// Show a goal with its active quest and history
    Show { id: String },
    /// Complete a quest and move its goal forward
    Advance {
        quest_id: String,
        #[arg(short, long = "user")]
        email: String,
    },
}

#[derive(Subcommand)]
enum AccomplishmentAction {
    /// Record an accomplishment for a user
    Record {
        email: String,
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long)]
        proof_url: Option<String>,
        /// Quest this accomplishment fulfills
        #[arg(long)]
        quest: Option<String>,
        /// Demonstrated skill (repeatable)
        #[arg(short, long = "skill")]
        skills: Vec<String>,
    },
    /// List a user's accomplishments
    List { email: String },
    /// Link an accomplishment to a demonstrated skill
    Link { id: String, skill: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so json output stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skillforge=info".parse()?)
                .add_directive("skillforge_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        if let Some(hint) = err
            .downcast_ref::<skillforge_core::Error>()
            .and_then(|e| e.suggestion())
        {
            eprintln!("  Try: {}", hint);
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Skills { action } => cmd_skills(&open_forge().await?, action, out).await,
        Commands::Path { skill, user, order } => {
            let mut forge = open_forge().await?;
            if let Some(order) = order {
                forge = forge.with_path_order(order.into());
            }
            cmd_path(&forge, &skill, user.as_deref(), out).await
        }
        Commands::Users { action } => cmd_users(&open_forge().await?, action, out).await,
        Commands::Goals { action } => cmd_goals(&open_forge().await?, action, out).await,
        Commands::Accomplishments { action } => {
            cmd_accomplishments(&open_forge().await?, action, out).await
        }
        Commands::Config { action } => cmd_config(action, out),
        Commands::Doctor => cmd_doctor(out).await,
    }
}

async fn open_forge() -> anyhow::Result<SkillForge> {
    let config = Config::load()?;
    SkillForge::from_config(&config).await
}

/// Output settings shared by every command
#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    /// Print `value` as json, or run `text` to print it for humans
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }

    /// Print a confirmation line unless quiet or in json mode
    fn note(&self, message: impl AsRef<str>) {
        if !self.quiet && self.format == OutputFormat::Text {
            println!("{}", message.as_ref());
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_skills(forge: &SkillForge, action: SkillAction, out: Output) -> anyhow::Result<()> {
    let skills = forge.skills();
    match action {
        SkillAction::Add { name, description } => {
            let skill = forge.upsert_skill(&name, description.as_deref()).await?;
            out.emit(&skill, || out.note(format!("Skill '{}' saved.", skill.name)))?;
        }
        SkillAction::List => {
            let all = skills.list_skills().await?;
            out.emit(&all, || {
                if all.is_empty() {
                    out.note("No skills found.\n\nCreate one with: skillforge skills add <name>");
                }
                for skill in &all {
                    match &skill.description {
                        Some(description) => println!("  {} - {}", skill.name, description),
                        None => println!("  {}", skill.name),
                    }
                }
            })?;
        }
        SkillAction::Show { name } => {
            let skill = skills
                .get_skill(&name)
                .await?
                .ok_or_else(|| skillforge_core::Error::SkillNotFound(name.clone()))?;
            let requires = skills.direct_dependencies(&skill.name).await?;
            let required_by = skills.dependents(&skill.name).await?;

            let value = json!({
                "skill": skill,
                "requires": requires,
                "required_by": required_by,
            });
            out.emit(&value, || {
                println!("Skill: {}", skill.name);
                println!("  ID: {}", skill.id);
                if let Some(description) = &skill.description {
                    println!("  Description: {}", description);
                }
                println!("  Requires: {}", list_or_none(&requires));
                println!("  Required by: {}", list_or_none(&required_by));
                println!("  Created: {}", skill.created_at.format("%Y-%m-%d %H:%M:%S"));
            })?;
        }
        SkillAction::Rename { old_name, new_name } => {
            let skill = skills.rename_skill(&old_name, &new_name).await?;
            out.emit(&skill, || {
                out.note(format!("Skill '{}' renamed to '{}'.", old_name, skill.name))
            })?;
        }
        SkillAction::Delete { name, force } => {
            if !force {
                anyhow::bail!(
                    "Deleting '{}' also removes its prerequisite edges. Re-run with --force to confirm.",
                    name
                );
            }
            if !skills.delete_skill(&name).await? {
                return Err(skillforge_core::Error::SkillNotFound(name).into());
            }
            out.emit(&json!({ "deleted": name }), || {
                out.note(format!("Skill '{}' deleted.", name))
            })?;
        }
        SkillAction::Depend {
            dependent,
            prerequisite,
        } => {
            let added = forge.add_skill_dependency(&dependent, &prerequisite).await?;
            let value = json!({
                "dependent": dependent,
                "prerequisite": prerequisite,
                "added": added,
            });
            out.emit(&value, || {
                if added {
                    out.note(format!("'{}' now requires '{}'.", dependent, prerequisite));
                } else {
                    out.note(format!("'{}' already requires '{}'.", dependent, prerequisite));
                }
            })?;
        }
        SkillAction::Undepend {
            dependent,
            prerequisite,
        } => {
            let removed = skills.remove_dependency(&dependent, &prerequisite).await?;
            let value =
                json!({ "dependent": dependent, "prerequisite": prerequisite, "removed": removed });
            out.emit(&value, || {
                if removed {
                    out.note(format!("'{}' no longer requires '{}'.", dependent, prerequisite));
                } else {
                    out.note(format!("'{}' did not require '{}'.", dependent, prerequisite));
                }
            })?;
        }
        SkillAction::Deps { name } => {
            let requires = skills.direct_dependencies(&name).await?;
            out.emit(&requires, || {
                if requires.is_empty() {
                    out.note(format!("'{}' has no prerequisites.", name));
                }
                for prerequisite in &requires {
                    println!("  {}", prerequisite);
                }
            })?;
        }
        SkillAction::Mastery { name } => {
            let levels = skills.mastery_levels(&name).await?;
            out.emit(&levels, || {
                println!("Mastery levels for {}:", name);
                for m in &levels {
                    println!("  {} {} - {}", m.level.as_u8(), m.name, m.description);
                }
            })?;
        }
    }
    Ok(())
}

async fn cmd_path(
    forge: &SkillForge,
    skill: &str,
    user: Option<&str>,
    out: Output,
) -> anyhow::Result<()> {
    match user {
        None => {
            let path = forge.learning_path(skill).await?;
            out.emit(&path, || {
                if path.is_empty() {
                    out.note(format!("No skill named '{}'.", skill));
                    return;
                }
                out.note(format!("Learning path to {} ({}):", skill, path.order));
                for (i, step) in path.steps.iter().enumerate() {
                    println!("  {}. {} (depth {})", i + 1, step.skill, step.depth);
                }
            })?;
        }
        Some(email) => {
            let steps = forge.personalized_path(skill, email).await?;
            let value = json!({
                "target": skill,
                "user": email,
                "order": forge.path_order(),
                "skills": steps,
            });
            out.emit(&value, || {
                if steps.is_empty() {
                    out.note(format!("Nothing left to learn for '{}'.", skill));
                    return;
                }
                out.note(format!("Learning path to {} for {}:", skill, email));
                for (i, name) in steps.iter().enumerate() {
                    println!("  {}. {}", i + 1, name);
                }
            })?;
        }
    }
    Ok(())
}

async fn cmd_users(forge: &SkillForge, action: UserAction, out: Output) -> anyhow::Result<()> {
    let users = forge.users();
    match action {
        UserAction::Add { email } => {
            let user = users.ensure_user(&email).await?;
            out.emit(&user, || out.note(format!("User '{}' registered.", user.email)))?;
        }
        UserAction::Show { email } => {
            let user = users
                .get_user(&email)
                .await?
                .ok_or_else(|| skillforge_core::Error::UserNotFound(email.clone()))?;
            let held = users.user_skills(&email).await?;
            let value = json!({ "user": user, "skills": held });
            out.emit(&value, || {
                println!("User: {}", user.email);
                println!("  ID: {}", user.id);
                println!("  Registered: {}", user.created_at.format("%Y-%m-%d %H:%M:%S"));
                if held.is_empty() {
                    println!("  Skills: (none)");
                } else {
                    println!("  Skills:");
                    for s in &held {
                        match s.level {
                            Some(level) => println!("    {} ({})", s.skill, level.name()),
                            None => println!("    {}", s.skill),
                        }
                    }
                }
            })?;
        }
        UserAction::Assign {
            email,
            skill,
            level,
        } => {
            let level = MasteryLevel::parse(&level)?;
            users.assign_mastery(&email, &skill, level).await?;
            let value = json!({ "user": email, "skill": skill, "level": level });
            out.emit(&value, || {
                out.note(format!("{} now holds {} at {}.", email, skill, level.name()))
            })?;
        }
        UserAction::Skills { email } => {
            let held = users.user_skills(&email).await?;
            out.emit(&held, || {
                if held.is_empty() {
                    out.note(format!("{} holds no skills yet.", email));
                }
                for s in &held {
                    match s.level {
                        Some(level) => println!("  {} ({})", s.skill, level.name()),
                        None => println!("  {}", s.skill),
                    }
                }
            })?;
        }
        UserAction::Unassign { email, skill } => {
            let removed = users.remove_user_skill(&email, &skill).await?;
            let value = json!({ "user": email, "skill": skill, "removed": removed });
            out.emit(&value, || {
                if removed {
                    out.note(format!("Removed {} from {}.", skill, email));
                } else {
                    out.note(format!("{} did not hold {}.", email, skill));
                }
            })?;
        }
    }
    Ok(())
}

/// Parse a `--step` argument of the form "Title: description"
fn parse_step(raw: &str) -> PlanStep {
    match raw.split_once(':') {
        Some((title, description)) => PlanStep::new(title.trim(), description.trim()),
        None => PlanStep::new(raw.trim(), ""),
    }
}

fn load_plan(steps: &[String], plan_file: Option<&PathBuf>) -> anyhow::Result<GoalPlan> {
    if let Some(path) = plan_file {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?;
        let plan: GoalPlan = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid plan file: {}", path.display()))?;
        debug!(path = %path.display(), steps = plan.len(), "Plan loaded");
        return Ok(plan);
    }
    Ok(GoalPlan::new(steps.iter().map(|s| parse_step(s)).collect())?)
}

async fn cmd_goals(forge: &SkillForge, action: GoalAction, out: Output) -> anyhow::Result<()> {
    let goals = forge.goals();
    match action {
        GoalAction::Create {
            email,
            text,
            steps,
            plan_file,
        } => {
            let plan = load_plan(&steps, plan_file.as_ref())?;
            let (goal, quest) = forge
                .create_goal_with_first_quest(&email, &text, plan)
                .await?;
            let value = json!({ "goal": goal, "active_quest": quest });
            out.emit(&value, || {
                out.note("Goal created successfully!");
                out.note(format!("  ID: {}", goal.id));
                out.note(format!("  Steps: {}", goal.plan.len()));
                out.note(format!("  Active quest: {} ({})", quest.name, quest.id));
                out.note(format!(
                    "\nWhen it is done, run `skillforge goals advance {} --user {}`",
                    quest.id, goal.user_email
                ));
            })?;
        }
        GoalAction::List { email, achieved } => {
            let listed = if achieved {
                goals.achieved_goals(&email).await?
            } else {
                goals.goals_for_user(&email).await?
            };
            out.emit(&listed, || {
                if listed.is_empty() {
                    out.note("No goals found.");
                }
                for goal in &listed {
                    println!("  {} - {} [{}]", short_id(&goal.id), goal.text, goal.status);
                }
            })?;
        }
        GoalAction::Show { id } => {
            let goal = goals
                .get_goal(&id)
                .await?
                .ok_or_else(|| skillforge_core::Error::GoalNotFound(id.clone()))?;
            let active = goals.active_quest(&goal.id).await?;
            let history = goals.quest_history(&goal.id).await?;
            let value = json!({ "goal": goal, "active_quest": active, "history": history });
            out.emit(&value, || {
                println!("Goal: {}", goal.text);
                println!("  ID: {}", goal.id);
                println!("  User: {}", goal.user_email);
                println!("  Status: {}", goal.status);
                if let Some(done) = goal.completed_at {
                    println!("  Completed: {}", done.format("%Y-%m-%d %H:%M:%S"));
                }
                println!("  Plan:");
                for (i, step) in goal.plan.steps().iter().enumerate() {
                    let marker = match &active {
                        Some(q) if q.name == step.title => "*",
                        _ if history.iter().any(|q| q.name == step.title) => "x",
                        _ => " ",
                    };
                    println!("    [{}] {}. {}", marker, i + 1, step.title);
                }
                if let Some(q) = &active {
                    println!("  Active quest: {} ({})", q.name, q.id);
                }
            })?;
        }
        GoalAction::Advance { quest_id, email } => {
            let outcome = forge.advance_goal(&quest_id, &email).await?;
            out.emit(&outcome, || match &outcome {
                Advancement::Advanced(quest) => {
                    println!("Advanced: next quest is '{}' ({})", quest.name, quest.id)
                }
                Advancement::GoalCompleted(goal) => {
                    println!("Goal completed: {}", goal.text)
                }
                Advancement::NoActiveMatch => {
                    warn!(quest = %quest_id, user = %email, "Quest is not active");
                    println!("No change: quest '{}' is not an active quest of {}", quest_id, email)
                }
            })?;
        }
    }
    Ok(())
}

async fn cmd_accomplishments(
    forge: &SkillForge,
    action: AccomplishmentAction,
    out: Output,
) -> anyhow::Result<()> {
    let log = forge.accomplishments();
    match action {
        AccomplishmentAction::Record {
            email,
            name,
            description,
            proof_url,
            quest,
            skills,
        } => {
            let mut input = NewAccomplishment::new(name, description);
            if let Some(url) = proof_url {
                input = input.with_proof_url(url);
            }
            if let Some(quest_id) = quest {
                input = input.for_quest(quest_id);
            }
            for skill in skills {
                input = input.with_skill(skill);
            }

            let recorded = log.record_accomplishment(&email, input).await?;
            out.emit(&recorded, || {
                out.note(format!("Accomplishment '{}' recorded.", recorded.name));
                out.note(format!("  ID: {}", recorded.id));
            })?;
        }
        AccomplishmentAction::List { email } => {
            let all = log.accomplishments_for_user(&email).await?;
            out.emit(&all, || {
                if all.is_empty() {
                    out.note("No accomplishments found.");
                }
                for a in &all {
                    println!(
                        "  {} - {} ({}) [{}]",
                        short_id(&a.id),
                        a.name,
                        a.timestamp.format("%Y-%m-%d"),
                        list_or_none(&a.skills)
                    );
                }
            })?;
        }
        AccomplishmentAction::Link { id, skill } => {
            let linked = log.link_accomplishment_to_skill(&id, &skill).await?;
            let value = json!({ "accomplishment": id, "skill": skill, "linked": linked });
            out.emit(&value, || {
                out.note(format!("Accomplishment {} demonstrates {}.", short_id(&id), skill))
            })?;
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, out: Output) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            out.note(format!("Set {} = {}", key, value));
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            out.note("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(out: Output) -> anyhow::Result<()> {
    let quiet = out.quiet;
    if !quiet {
        println!("SkillForge Health Check");
        println!("=======================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }
            Some(config)
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {:#}", e);
            }
            None
        }
    };

    if !quiet {
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
    }

    if let Some(config) = config {
        match SkillForge::from_config(&config).await {
            Ok(forge) => {
                let db = forge.database();
                match db.health_check().await {
                    Ok(()) => {
                        if !quiet {
                            println!("[OK] Database: Connected");
                            println!("     Path: {}", db.path().display());
                        }
                        match db.migration_status().await {
                            Ok(status) if status.needs_migration => {
                                all_ok = false;
                                if !quiet {
                                    println!(
                                        "[!!] Database: Migrations pending (v{} -> v{})",
                                        status.current_version, status.target_version
                                    );
                                }
                            }
                            Ok(status) => {
                                if !quiet {
                                    println!("[OK] Database: Schema v{}", status.current_version);
                                }
                            }
                            Err(e) => {
                                all_ok = false;
                                if !quiet {
                                    println!("[!!] Database: Migration check failed - {}", e);
                                }
                            }
                        }

                        if !quiet {
                            let mut tx = forge.store().begin().await?;
                            for label in [NodeLabel::Skill, NodeLabel::User, NodeLabel::Goal] {
                                let count = tx.count_nodes(label).await?;
                                println!("     {}s: {}", label, count);
                            }
                        }
                    }
                    Err(e) => {
                        all_ok = false;
                        if !quiet {
                            println!("[!!] Database: Health check failed - {}", e);
                        }
                    }
                }
                forge.close().await;
            }
            Err(e) => {
                all_ok = false;
                if !quiet {
                    println!("[!!] Database: Failed to open - {:#}", e);
                }
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    if !all_ok {
        anyhow::bail!("health check failed");
    }
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
