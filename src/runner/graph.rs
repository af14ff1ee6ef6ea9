//! Step dependency graph.
//!
//! [`StepGraph`] is the validated, immutable set of wizard steps. Loading a
//! graph checks that ids are unique, every dependency resolves, the dependency
//! relation is acyclic, and the declared `order` values form a dense `1..=N`
//! sequence that is itself a valid topological order. Among steps at the same
//! dependency depth, required steps must come before optional ones.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::ValidationError;
use crate::steps::{StepDefinition, StepStatus};

/// Outcome of checking a step's dependencies against recorded statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyCheck {
    /// Every dependency succeeded or is an optional step that was skipped.
    Satisfied,
    /// The named dependency failed.
    Failed(String),
    /// The named dependency was skipped (and is required) or has not run.
    Unmet(String),
}

/// Validated dependency graph of wizard steps.
#[derive(Debug, Clone)]
pub struct StepGraph {
    /// Steps sorted by `order`.
    steps: Vec<StepDefinition>,
    /// Step id to position in `steps`.
    index: HashMap<String, usize>,
    /// Map of step id to steps that depend on it.
    dependents: HashMap<String, BTreeSet<String>>,
}

impl StepGraph {
    /// Load and validate a set of steps with declared orders.
    pub fn load(steps: Vec<StepDefinition>) -> Result<Self, ValidationError> {
        validate_structure(&steps)?;

        let mut orders: Vec<u32> = steps.iter().map(|s| s.order).collect();
        orders.sort_unstable();
        for (expected, actual) in (1..).zip(&orders) {
            if *actual != expected {
                return Err(ValidationError::InvalidOrder {
                    message: format!(
                        "orders must be unique and contiguous from 1 to {}, found {:?}",
                        steps.len(),
                        orders
                    ),
                });
            }
        }

        let mut steps = steps;
        steps.sort_by_key(|s| s.order);

        let order_of: HashMap<&str, u32> =
            steps.iter().map(|s| (s.id.as_str(), s.order)).collect();
        for step in &steps {
            for dep in &step.depends_on {
                if order_of[dep.as_str()] >= step.order {
                    return Err(ValidationError::OrderViolatesDependency {
                        step: step.id.clone(),
                        order: step.order,
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let depth = dependency_depths(&steps);
        for optional in steps.iter().filter(|s| s.optional) {
            let level = depth.get(optional.id.as_str());
            if let Some(required) = steps
                .iter()
                .find(|s| !s.optional && s.order > optional.order && depth.get(s.id.as_str()) == level)
            {
                return Err(ValidationError::InvalidOrder {
                    message: format!(
                        "optional step '{}' (order {}) comes before required step '{}' (order {}) at the same dependency depth",
                        optional.id, optional.order, required.id, required.order
                    ),
                });
            }
        }

        Ok(Self::assemble(steps))
    }

    /// Load steps whose `order` is not declared, assigning orders from the
    /// canonical topological order.
    ///
    /// Ties are broken by dependency depth, then required steps before
    /// optional ones, then declaration order.
    pub fn from_unordered(steps: Vec<StepDefinition>) -> Result<Self, ValidationError> {
        validate_structure(&steps)?;
        let order = canonical_order(&steps);

        let mut by_id: HashMap<String, StepDefinition> =
            steps.into_iter().map(|s| (s.id.clone(), s)).collect();
        let mut ordered = Vec::with_capacity(order.len());
        for (position, id) in (1..).zip(order) {
            if let Some(mut step) = by_id.remove(&id) {
                step.order = position;
                ordered.push(step);
            }
        }

        Ok(Self::assemble(ordered))
    }

    fn assemble(steps: Vec<StepDefinition>) -> Self {
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let mut dependents: HashMap<String, BTreeSet<String>> = steps
            .iter()
            .map(|s| (s.id.clone(), BTreeSet::new()))
            .collect();
        for step in &steps {
            for dep in &step.depends_on {
                if let Some(set) = dependents.get_mut(dep) {
                    set.insert(step.id.clone());
                }
            }
        }

        Self {
            steps,
            index,
            dependents,
        }
    }

    /// Step ids in topological order. Stable for a given graph.
    pub fn topological_order(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    /// All steps, sorted by order.
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Look up a step.
    pub fn get(&self, id: &str) -> Option<&StepDefinition> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// Check if a step exists in the graph.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Get the number of steps in the graph.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get the direct dependencies of a step.
    pub fn dependencies_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.get(id).map(|s| &s.depends_on)
    }

    /// Get steps that depend directly on the given step.
    pub fn dependents_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.dependents.get(id)
    }

    /// Get all transitive dependents of a step.
    pub fn transitive_dependents(&self, id: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut to_visit = vec![id.to_string()];

        while let Some(current) = to_visit.pop() {
            if let Some(dependents) = self.dependents.get(&current) {
                for dep in dependents {
                    if result.insert(dep.clone()) {
                        to_visit.push(dep.clone());
                    }
                }
            }
        }

        result
    }

    /// Check a step's dependencies against the statuses recorded so far.
    ///
    /// A failed dependency takes precedence over an unmet one.
    pub fn check_dependencies(
        &self,
        id: &str,
        statuses: &HashMap<String, StepStatus>,
    ) -> DependencyCheck {
        let Some(step) = self.get(id) else {
            return DependencyCheck::Unmet(id.to_string());
        };

        let mut unmet = None;
        for dep in &step.depends_on {
            let optional = self.get(dep).is_some_and(|d| d.optional);
            match statuses.get(dep) {
                Some(StepStatus::Success) => {}
                Some(StepStatus::Skipped) if optional => {}
                Some(StepStatus::Failed) => return DependencyCheck::Failed(dep.clone()),
                _ => {
                    if unmet.is_none() {
                        unmet = Some(dep.clone());
                    }
                }
            }
        }

        match unmet {
            Some(dep) => DependencyCheck::Unmet(dep),
            None => DependencyCheck::Satisfied,
        }
    }

    /// True iff every dependency of `id` succeeded or is an optional step that
    /// was explicitly skipped.
    pub fn is_eligible(&self, id: &str, statuses: &HashMap<String, StepStatus>) -> bool {
        self.check_dependencies(id, statuses) == DependencyCheck::Satisfied
    }

    /// Validate a custom ordering: it must be a permutation of the graph's
    /// steps that never places a step before one of its dependencies.
    pub fn validate_ordering(&self, ordering: &[String]) -> Result<(), ValidationError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for id in ordering {
            let Some(step) = self.get(id) else {
                return Err(ValidationError::InvalidConfig {
                    message: format!("order override names unknown step '{}'", id),
                });
            };
            if let Some(dep) = step.depends_on.iter().find(|d| !seen.contains(d.as_str())) {
                return Err(ValidationError::InvalidConfig {
                    message: format!("order override places '{}' before its dependency '{}'", id, dep),
                });
            }
            if !seen.insert(id.as_str()) {
                return Err(ValidationError::InvalidConfig {
                    message: format!("order override lists '{}' twice", id),
                });
            }
        }

        if seen.len() != self.steps.len() {
            let missing: Vec<&str> = self
                .steps
                .iter()
                .map(|s| s.id.as_str())
                .filter(|id| !seen.contains(id))
                .collect();
            return Err(ValidationError::InvalidConfig {
                message: format!("order override is missing steps: {}", missing.join(", ")),
            });
        }

        Ok(())
    }
}

/// Checks shared by both loading paths: ids, optionality, references, cycles.
fn validate_structure(steps: &[StepDefinition]) -> Result<(), ValidationError> {
    if steps.is_empty() {
        return Err(ValidationError::EmptyGraph);
    }

    let mut ids: HashSet<&str> = HashSet::new();
    for step in steps {
        if !ids.insert(step.id.as_str()) {
            return Err(ValidationError::DuplicateStep {
                id: step.id.clone(),
            });
        }
    }

    for step in steps {
        if step.optional && !step.skippable {
            return Err(ValidationError::OptionalNotSkippable {
                id: step.id.clone(),
            });
        }
        for dep in &step.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(ValidationError::UnknownDependency {
                    step: step.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    if let Some(path) = find_cycle(steps) {
        return Err(ValidationError::CyclicDependency { path });
    }

    Ok(())
}

/// Find a cycle in the dependency relation, returning the path if one exists.
///
/// Steps are visited in declaration order so the reported path is stable.
pub fn find_cycle(steps: &[StepDefinition]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        Visiting,
        Visited,
    }

    let deps: HashMap<&str, &BTreeSet<String>> =
        steps.iter().map(|s| (s.id.as_str(), &s.depends_on)).collect();
    let mut state: HashMap<&str, State> = steps
        .iter()
        .map(|s| (s.id.as_str(), State::Unvisited))
        .collect();
    let mut path: Vec<String> = Vec::new();

    fn dfs<'a>(
        node: &'a str,
        deps: &HashMap<&'a str, &'a BTreeSet<String>>,
        state: &mut HashMap<&'a str, State>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        state.insert(node, State::Visiting);
        path.push(node.to_string());

        if let Some(&node_deps) = deps.get(node) {
            for dep in node_deps {
                match state.get(dep.as_str()) {
                    Some(State::Visiting) => {
                        let start = path.iter().position(|s| s == dep).unwrap_or(0);
                        let mut cycle: Vec<String> = path[start..].to_vec();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Some(State::Unvisited) => {
                        if let Some(cycle) = dfs(dep.as_str(), deps, state, path) {
                            return Some(cycle);
                        }
                    }
                    Some(State::Visited) | None => {}
                }
            }
        }

        path.pop();
        state.insert(node, State::Visited);
        None
    }

    for step in steps {
        if state.get(step.id.as_str()) == Some(&State::Unvisited) {
            if let Some(cycle) = dfs(step.id.as_str(), &deps, &mut state, &mut path) {
                return Some(cycle);
            }
        }
    }

    None
}

/// Longest dependency chain below each step.
fn dependency_depths(steps: &[StepDefinition]) -> HashMap<&str, usize> {
    let position: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    fn depth_of<'a>(
        id: &'a str,
        steps: &'a [StepDefinition],
        position: &HashMap<&'a str, usize>,
        depth: &mut HashMap<&'a str, usize>,
    ) -> usize {
        if let Some(&d) = depth.get(id) {
            return d;
        }
        let d = position
            .get(id)
            .map(|&i| {
                steps[i]
                    .depends_on
                    .iter()
                    .map(|dep| depth_of(dep.as_str(), steps, position, depth) + 1)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        depth.insert(id, d);
        d
    }

    let mut depth: HashMap<&str, usize> = HashMap::new();
    for step in steps {
        depth_of(step.id.as_str(), steps, &position, &mut depth);
    }
    depth
}

/// Deterministic topological order for an acyclic set of steps.
///
/// Kahn's algorithm, choosing among ready steps by lowest dependency depth,
/// then required before optional, then declaration position.
pub fn canonical_order(steps: &[StepDefinition]) -> Vec<String> {
    let position: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let depth = dependency_depths(steps);

    let mut remaining: HashMap<&str, usize> = steps
        .iter()
        .map(|s| (s.id.as_str(), s.depends_on.len()))
        .collect();
    let mut ready: BTreeSet<(usize, bool, usize)> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.depends_on.is_empty())
        .map(|(i, s)| (depth[s.id.as_str()], s.optional, i))
        .collect();

    let mut result = Vec::with_capacity(steps.len());
    while let Some(key) = ready.pop_first() {
        let step = &steps[key.2];
        result.push(step.id.clone());

        for other in steps.iter().filter(|o| o.depends_on.contains(&step.id)) {
            if let Some(count) = remaining.get_mut(other.id.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.insert((
                        depth[other.id.as_str()],
                        other.optional,
                        position[other.id.as_str()],
                    ));
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wizard() -> Vec<StepDefinition> {
        vec![
            StepDefinition::new("welcome", 1),
            StepDefinition::new("checks", 2).depends_on(["welcome"]),
            StepDefinition::new("install", 3).depends_on(["checks"]),
        ]
    }

    fn statuses(pairs: &[(&str, StepStatus)]) -> HashMap<String, StepStatus> {
        pairs.iter().map(|(id, s)| (id.to_string(), *s)).collect()
    }

    #[test]
    fn load_linear_chain() {
        let graph = StepGraph::load(wizard()).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.topological_order(), vec!["welcome", "checks", "install"]);
    }

    #[test]
    fn load_sorts_by_declared_order() {
        let mut steps = wizard();
        steps.reverse();
        let graph = StepGraph::load(steps).unwrap();
        assert_eq!(graph.topological_order(), vec!["welcome", "checks", "install"]);
    }

    #[test]
    fn load_rejects_empty_graph() {
        assert_eq!(StepGraph::load(vec![]).unwrap_err(), ValidationError::EmptyGraph);
    }

    #[test]
    fn load_rejects_duplicate_id() {
        let steps = vec![StepDefinition::new("a", 1), StepDefinition::new("a", 2)];
        assert!(matches!(
            StepGraph::load(steps),
            Err(ValidationError::DuplicateStep { id }) if id == "a"
        ));
    }

    #[test]
    fn load_rejects_unknown_dependency() {
        let steps = vec![StepDefinition::new("a", 1).depends_on(["nonexistent"])];
        assert!(matches!(
            StepGraph::load(steps),
            Err(ValidationError::UnknownDependency { dependency, .. }) if dependency == "nonexistent"
        ));
    }

    #[test]
    fn load_rejects_cycle_with_path() {
        let steps = vec![
            StepDefinition::new("a", 1).depends_on(["c"]),
            StepDefinition::new("b", 2).depends_on(["a"]),
            StepDefinition::new("c", 3).depends_on(["b"]),
        ];
        match StepGraph::load(steps) {
            Err(ValidationError::CyclicDependency { path }) => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"a".to_string()));
                assert!(path.contains(&"b".to_string()));
                assert!(path.contains(&"c".to_string()));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn self_cycle_detected() {
        let steps = vec![StepDefinition::new("a", 1).depends_on(["a"])];
        assert!(matches!(
            StepGraph::load(steps),
            Err(ValidationError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn load_rejects_optional_not_skippable() {
        let mut step = StepDefinition::new("extras", 1);
        step.optional = true;
        assert!(matches!(
            StepGraph::load(vec![step]),
            Err(ValidationError::OptionalNotSkippable { .. })
        ));
    }

    #[test]
    fn load_rejects_gap_in_order() {
        let steps = vec![StepDefinition::new("a", 1), StepDefinition::new("b", 3)];
        assert!(matches!(
            StepGraph::load(steps),
            Err(ValidationError::InvalidOrder { .. })
        ));
    }

    #[test]
    fn load_rejects_repeated_order() {
        let steps = vec![StepDefinition::new("a", 1), StepDefinition::new("b", 1)];
        assert!(matches!(
            StepGraph::load(steps),
            Err(ValidationError::InvalidOrder { .. })
        ));
    }

    #[test]
    fn load_rejects_order_before_dependency() {
        let steps = vec![
            StepDefinition::new("install", 1).depends_on(["checks"]),
            StepDefinition::new("checks", 2),
        ];
        assert!(matches!(
            StepGraph::load(steps),
            Err(ValidationError::OrderViolatesDependency { step, .. }) if step == "install"
        ));
    }

    #[test]
    fn load_rejects_optional_before_required_at_same_depth() {
        let steps = vec![
            StepDefinition::new("welcome", 1),
            StepDefinition::new("extras", 2).optional().depends_on(["welcome"]),
            StepDefinition::new("checks", 3).depends_on(["welcome"]),
        ];
        match StepGraph::load(steps) {
            Err(ValidationError::InvalidOrder { message }) => {
                assert!(message.contains("'extras'"));
                assert!(message.contains("'checks'"));
            }
            other => panic!("expected invalid order, got {:?}", other),
        }
    }

    #[test]
    fn load_accepts_optional_before_deeper_required_step() {
        let steps = vec![
            StepDefinition::new("welcome", 1),
            StepDefinition::new("extras", 2).optional(),
            StepDefinition::new("finish", 3).depends_on(["welcome"]),
        ];
        let graph = StepGraph::load(steps).unwrap();
        assert_eq!(graph.topological_order(), vec!["welcome", "extras", "finish"]);
    }

    #[test]
    fn topological_order_respects_every_edge() {
        let steps = vec![
            StepDefinition::new("a", 1),
            StepDefinition::new("b", 2).depends_on(["a"]),
            StepDefinition::new("c", 3).depends_on(["a"]),
            StepDefinition::new("d", 4).depends_on(["b", "c"]),
        ];
        let graph = StepGraph::load(steps).unwrap();
        let order = graph.topological_order();
        for step in graph.steps() {
            let idx = order.iter().position(|s| *s == step.id).unwrap();
            for dep in &step.depends_on {
                assert!(order.iter().position(|s| s == dep).unwrap() < idx);
            }
        }
    }

    #[test]
    fn from_unordered_puts_required_before_optional_at_same_depth() {
        let steps = vec![
            StepDefinition::new("welcome", 0),
            StepDefinition::new("extras", 0).optional().depends_on(["welcome"]),
            StepDefinition::new("checks", 0).depends_on(["welcome"]),
            StepDefinition::new("install", 0).depends_on(["checks"]),
        ];
        let graph = StepGraph::from_unordered(steps).unwrap();
        assert_eq!(
            graph.topological_order(),
            vec!["welcome", "checks", "extras", "install"]
        );
        assert_eq!(graph.get("install").unwrap().order, 4);
    }

    #[test]
    fn from_unordered_still_detects_cycles() {
        let steps = vec![
            StepDefinition::new("a", 0).depends_on(["b"]),
            StepDefinition::new("b", 0).depends_on(["a"]),
        ];
        assert!(matches!(
            StepGraph::from_unordered(steps),
            Err(ValidationError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn dependents_are_tracked() {
        let graph = StepGraph::load(wizard()).unwrap();
        assert!(graph.dependents_of("welcome").unwrap().contains("checks"));
        let transitive = graph.transitive_dependents("welcome");
        assert!(transitive.contains("checks"));
        assert!(transitive.contains("install"));
    }

    #[test]
    fn eligible_when_dependencies_succeeded() {
        let graph = StepGraph::load(wizard()).unwrap();
        assert!(graph.is_eligible("welcome", &HashMap::new()));
        assert!(!graph.is_eligible("checks", &HashMap::new()));
        assert!(graph.is_eligible("checks", &statuses(&[("welcome", StepStatus::Success)])));
    }

    #[test]
    fn skipped_optional_dependency_counts_as_met() {
        let steps = vec![
            StepDefinition::new("extras", 1).optional(),
            StepDefinition::new("finish", 2).depends_on(["extras"]),
        ];
        let graph = StepGraph::load(steps).unwrap();
        assert!(graph.is_eligible("finish", &statuses(&[("extras", StepStatus::Skipped)])));
    }

    #[test]
    fn skipped_required_dependency_is_unmet() {
        let steps = vec![
            StepDefinition::new("proxy", 1).skippable(),
            StepDefinition::new("fetch", 2).depends_on(["proxy"]),
        ];
        let graph = StepGraph::load(steps).unwrap();
        assert_eq!(
            graph.check_dependencies("fetch", &statuses(&[("proxy", StepStatus::Skipped)])),
            DependencyCheck::Unmet("proxy".to_string())
        );
    }

    #[test]
    fn failed_dependency_reported() {
        let graph = StepGraph::load(wizard()).unwrap();
        assert_eq!(
            graph.check_dependencies("checks", &statuses(&[("welcome", StepStatus::Failed)])),
            DependencyCheck::Failed("welcome".to_string())
        );
    }

    #[test]
    fn validate_ordering_accepts_alternative_topological_order() {
        let steps = vec![
            StepDefinition::new("a", 1),
            StepDefinition::new("b", 2),
            StepDefinition::new("c", 3).depends_on(["a"]),
        ];
        let graph = StepGraph::load(steps).unwrap();
        let ordering: Vec<String> = ["b", "a", "c"].iter().map(|s| s.to_string()).collect();
        assert!(graph.validate_ordering(&ordering).is_ok());
    }

    #[test]
    fn validate_ordering_rejects_dependency_violation_and_gaps() {
        let graph = StepGraph::load(wizard()).unwrap();
        let backwards: Vec<String> = ["checks", "welcome", "install"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(graph.validate_ordering(&backwards).is_err());

        let partial: Vec<String> = ["welcome", "checks"].iter().map(|s| s.to_string()).collect();
        assert!(graph.validate_ordering(&partial).is_err());
    }
}
