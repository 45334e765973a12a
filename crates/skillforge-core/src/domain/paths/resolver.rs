//! Learning path resolution
//!
//! A target's learning path is the target plus every skill reachable from it
//! over `REQUIRES` edges, each listed once and ordered by depth. A skill's
//! depth is the longest `REQUIRES` chain from it down to a root (a skill
//! with no prerequisites, depth 0).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{EdgeType, GraphStore, NodeLabel};

/// Direction in which a path is ordered by depth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathOrder {
    /// Roots first, the target last
    #[default]
    FundamentalsFirst,
    /// The target first, roots last
    TargetFirst,
}

impl PathOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FundamentalsFirst => "fundamentals_first",
            Self::TargetFirst => "target_first",
        }
    }

    /// Parse from string, accepting `_` or `-` as separator
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fundamentals_first" | "fundamentals" => Some(Self::FundamentalsFirst),
            "target_first" | "target" => Some(Self::TargetFirst),
            _ => None,
        }
    }
}

impl std::fmt::Display for PathOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One skill on a learning path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub skill: String,
    pub depth: u32,
}

/// A resolved learning path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    pub target: String,
    pub order: PathOrder,
    pub steps: Vec<PathStep>,
}

impl LearningPath {
    fn empty(target: &str, order: PathOrder) -> Self {
        Self {
            target: target.to_string(),
            order,
            steps: Vec::new(),
        }
    }

    /// Skill names in path order
    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.skill.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn depth_of(&self, skill: &str) -> Option<u32> {
        self.steps.iter().find(|s| s.skill == skill).map(|s| s.depth)
    }
}

/// Resolves learning paths from the skill graph. Read-only.
#[derive(Debug, Clone)]
pub struct LearningPathResolver {
    store: GraphStore,
    order: PathOrder,
}

impl LearningPathResolver {
    pub fn new(store: GraphStore) -> Self {
        Self {
            store,
            order: PathOrder::default(),
        }
    }

    pub fn with_order(mut self, order: PathOrder) -> Self {
        self.order = order;
        self
    }

    pub fn order(&self) -> PathOrder {
        self.order
    }

    /// Resolve the path for `target` in the configured order
    pub async fn resolve(&self, target: &str) -> Result<LearningPath> {
        self.resolve_ordered(target, self.order).await
    }

    /// Resolve the path for `target` in an explicit order. An unknown
    /// target yields an empty path.
    pub async fn resolve_ordered(&self, target: &str, order: PathOrder) -> Result<LearningPath> {
        let target = target.trim();
        let mut tx = self.store.begin().await?;

        let Some(start) = tx.find_node(NodeLabel::Skill, target).await? else {
            debug!(skill = %target, "No such skill, empty learning path");
            return Ok(LearningPath::empty(target, order));
        };

        let nodes = tx.reachable(&start.id, EdgeType::Requires).await?;
        let edges = tx.closure_edges(&start.id, EdgeType::Requires).await?;
        drop(tx);

        let names: HashMap<String, String> = nodes
            .into_iter()
            .map(|node| (node.id, node.key))
            .collect();
        let depths = longest_depths(&names, &edges)?;

        let mut steps: Vec<PathStep> = depths
            .into_iter()
            .filter_map(|(id, depth)| {
                names.get(&id).map(|name| PathStep {
                    skill: name.clone(),
                    depth,
                })
            })
            .collect();

        match order {
            PathOrder::FundamentalsFirst => {
                steps.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.skill.cmp(&b.skill)))
            }
            PathOrder::TargetFirst => {
                steps.sort_by(|a, b| b.depth.cmp(&a.depth).then_with(|| a.skill.cmp(&b.skill)))
            }
        }

        debug!(skill = %start.key, steps = steps.len(), order = %order, "Learning path resolved");
        Ok(LearningPath {
            target: start.key,
            order,
            steps,
        })
    }
}

/// Longest-chain depth of every node in `names` over `edges`
/// (`source` requires `target`). Walks the graph in post-order with an
/// explicit stack so chain length is bounded by heap, not call depth.
fn longest_depths(
    names: &HashMap<String, String>,
    edges: &[(String, String)],
) -> Result<HashMap<String, u32>> {
    let mut prerequisites: HashMap<&str, Vec<&str>> = HashMap::new();
    for (source, target) in edges {
        prerequisites
            .entry(source.as_str())
            .or_default()
            .push(target.as_str());
    }

    let mut depths: HashMap<&str, u32> = HashMap::new();
    let mut on_stack: HashSet<&str> = HashSet::new();

    for root in names.keys() {
        if depths.contains_key(root.as_str()) {
            continue;
        }

        // (node, index of the next prerequisite to visit)
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        on_stack.insert(root.as_str());

        while let Some(&(id, index)) = stack.last() {
            let next = prerequisites.get(id).map(Vec::as_slice).unwrap_or(&[]);

            if let Some(&prerequisite) = next.get(index) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                if depths.contains_key(prerequisite) {
                    continue;
                }
                if !on_stack.insert(prerequisite) {
                    return Err(Error::DependencyCycle {
                        dependent: display_name(names, id),
                        prerequisite: display_name(names, prerequisite),
                    });
                }
                stack.push((prerequisite, 0));
            } else {
                let depth = next
                    .iter()
                    .filter_map(|prerequisite| depths.get(prerequisite))
                    .map(|depth| depth + 1)
                    .max()
                    .unwrap_or(0);
                depths.insert(id, depth);
                on_stack.remove(id);
                stack.pop();
            }
        }
    }

    Ok(depths
        .into_iter()
        .map(|(id, depth)| (id.to_string(), depth))
        .collect())
}

fn display_name(names: &HashMap<String, String>, id: &str) -> String {
    names.get(id).cloned().unwrap_or_else(|| id.to_string())
}
