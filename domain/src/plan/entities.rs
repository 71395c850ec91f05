//! Execution plan entities

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// How a plan intends to answer the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One Resolver step.
    DirectLookup,
    /// One RAG step.
    VectorSearch,
    /// Resolver and RAG side by side; the better result wins.
    Hybrid,
    /// Sub-steps where each depends on the previous one.
    MultiStep,
    /// Independent sub-steps joined by a synthesis step.
    Parallel,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DirectLookup => "direct_lookup",
            Strategy::VectorSearch => "vector_search",
            Strategy::Hybrid => "hybrid",
            Strategy::MultiStep => "multi_step",
            Strategy::Parallel => "parallel",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Component a step is executed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTarget {
    Resolver,
    RagExecutor,
    /// Combines the outputs of the steps it depends on into one answer.
    Synthesizer,
}

impl StepTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepTarget::Resolver => "resolver",
            StepTarget::RagExecutor => "rag_executor",
            StepTarget::Synthesizer => "synthesizer",
        }
    }

    /// Parameters a step of this target cannot run without.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            StepTarget::Resolver => &["entity_type", "location"],
            StepTarget::RagExecutor => &["query"],
            StepTarget::Synthesizer => &["question"],
        }
    }
}

impl std::fmt::Display for StepTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifier of a step within a plan ("1", "2", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for StepId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single unit of work in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: StepId,
    pub target: StepTarget,
    pub params: BTreeMap<String, String>,
    pub depends_on: Vec<StepId>,
}

impl PlanStep {
    pub fn new(id: impl Into<StepId>, target: StepTarget) -> Self {
        Self {
            id: id.into(),
            target,
            params: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, id: impl Into<StepId>) -> Self {
        let id = id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Required parameters that are absent or blank.
    pub fn missing_params(&self) -> Vec<&'static str> {
        self.target
            .required_params()
            .iter()
            .copied()
            .filter(|key| self.param(key).is_none())
            .collect()
    }
}

/// Ordered, dependency-graphed set of steps for one request.
///
/// Invariant: the `depends_on` graph is acyclic and only references steps
/// in the same plan. [`ExecutionPlan::validate`] checks both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub strategy: Strategy,
    pub steps: Vec<PlanStep>,
    /// Why the planner had to fall back from the classified strategy.
    pub downgrade_reason: Option<String>,
}

impl ExecutionPlan {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            steps: Vec::new(),
            downgrade_reason: None,
        }
    }

    pub fn with_step(mut self, step: PlanStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_downgrade(mut self, reason: impl Into<String>) -> Self {
        self.downgrade_reason = Some(reason.into());
        self
    }

    pub fn is_downgraded(&self) -> bool {
        self.downgrade_reason.is_some()
    }

    pub fn step(&self, id: &StepId) -> Option<&PlanStep> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// Check ids are unique, dependencies exist, and the graph is acyclic.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.steps.is_empty() {
            return Err(DomainError::InvalidPlan("plan has no steps".to_string()));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(&step.id) {
                return Err(DomainError::InvalidPlan(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
        }

        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen.contains(dep) {
                    return Err(DomainError::InvalidPlan(format!(
                        "step '{}' depends on unknown step '{}'",
                        step.id, dep
                    )));
                }
            }
        }

        let layered: usize = self.layers()?.iter().map(Vec::len).sum();
        debug_assert_eq!(layered, self.steps.len());
        Ok(())
    }

    /// Kahn layering: every step in a layer depends only on earlier layers.
    ///
    /// Order inside a layer follows plan order, so the layering is
    /// deterministic.
    pub fn layers(&self) -> Result<Vec<Vec<&PlanStep>>, DomainError> {
        let mut remaining: HashMap<&StepId, usize> = self
            .steps
            .iter()
            .map(|s| (&s.id, s.depends_on.len()))
            .collect();
        let mut done: HashSet<&StepId> = HashSet::new();
        let mut layers = Vec::new();

        while done.len() < self.steps.len() {
            let layer: Vec<&PlanStep> = self
                .steps
                .iter()
                .filter(|s| !done.contains(&s.id) && remaining.get(&s.id) == Some(&0))
                .collect();

            if layer.is_empty() {
                return Err(DomainError::InvalidPlan(
                    "dependency cycle between steps".to_string(),
                ));
            }

            for step in &layer {
                done.insert(&step.id);
            }
            for step in &self.steps {
                if done.contains(&step.id) {
                    continue;
                }
                let unmet = step.depends_on.iter().filter(|d| !done.contains(d)).count();
                remaining.insert(&step.id, unmet);
            }
            layers.push(layer);
        }

        Ok(layers)
    }

    /// Steps no other step depends on; their results form the plan's output.
    pub fn sinks(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| !self.steps.iter().any(|o| o.depends_on.contains(&s.id)))
            .collect()
    }

    /// True when some layer holds more than one step.
    pub fn has_parallel_steps(&self) -> bool {
        self.layers()
            .map(|layers| layers.iter().any(|l| l.len() > 1))
            .unwrap_or(false)
    }
}
