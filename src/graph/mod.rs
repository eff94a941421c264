pub mod validation;

use crate::dependency::Dependency;
use crate::error::{CycleError, ScheduleError, ScheduleResult};
use crate::task::{Task, TaskId, TaskStatus};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

pub use validation::NetworkIssue;

/// All tasks and dependencies of one schedule snapshot.
///
/// Tasks live in the node arena of a `DiGraph` and dependencies on its edges,
/// so a clone is a flat copy of both arrays and owns everything it holds.
/// Acyclicity is checked when the network is traversed, not on insert.
#[derive(Debug, Clone, Default)]
pub struct TaskNetwork {
    graph: DiGraph<Task, Dependency>,
    index: HashMap<TaskId, NodeIndex>,
    dangling: Vec<Dependency>,
}

impl TaskNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task, replacing any task with the same id while keeping its
    /// dependencies.
    pub fn add_task(&mut self, task: Task) {
        match self.index.get(&task.task_id) {
            Some(&node) => self.graph[node] = task,
            None => {
                let id = task.task_id;
                let node = self.graph.add_node(task);
                self.index.insert(id, node);
            }
        }
    }

    /// Strict insert: both endpoints must already be in the network.
    pub fn add_dependency(&mut self, dependency: Dependency) -> ScheduleResult<()> {
        let predecessor = self.index.get(&dependency.predecessor_id).copied();
        let successor = self.index.get(&dependency.successor_id).copied();
        match (predecessor, successor) {
            (Some(from), Some(to)) => {
                self.graph.add_edge(from, to, dependency);
                Ok(())
            }
            (None, _) => Err(ScheduleError::InvalidReference {
                predecessor: dependency.predecessor_id,
                successor: dependency.successor_id,
                missing: dependency.predecessor_id,
            }),
            (_, None) => Err(ScheduleError::InvalidReference {
                predecessor: dependency.predecessor_id,
                successor: dependency.successor_id,
                missing: dependency.successor_id,
            }),
        }
    }

    /// Tolerant insert: a dependency with a missing endpoint is set aside
    /// (see [`dangling_dependencies`](Self::dangling_dependencies)) and
    /// `false` is returned.
    pub fn add_dependency_safe(&mut self, dependency: Dependency) -> bool {
        if self.index.contains_key(&dependency.predecessor_id)
            && self.index.contains_key(&dependency.successor_id)
        {
            self.add_dependency(dependency).is_ok()
        } else {
            self.dangling.push(dependency);
            false
        }
    }

    pub fn dangling_dependencies(&self) -> &[Dependency] {
        &self.dangling
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.index.contains_key(&task_id)
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.index.get(&task_id).map(|&node| &self.graph[node])
    }

    pub fn task_mut(&mut self, task_id: TaskId) -> Option<&mut Task> {
        let node = *self.index.get(&task_id)?;
        Some(&mut self.graph[node])
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_weights()
    }

    pub fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.graph.node_weights_mut()
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.graph.edge_weights()
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks().map(|task| task.task_id).collect()
    }

    pub(crate) fn node(&self, task_id: TaskId) -> Option<NodeIndex> {
        self.index.get(&task_id).copied()
    }

    pub(crate) fn graph(&self) -> &DiGraph<Task, Dependency> {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut DiGraph<Task, Dependency> {
        &mut self.graph
    }

    fn edges(
        &self,
        task_id: TaskId,
        direction: Direction,
    ) -> impl Iterator<Item = EdgeReference<'_, Dependency>> {
        self.node(task_id)
            .into_iter()
            .flat_map(move |node| self.graph.edges_directed(node, direction))
    }

    /// Incoming dependencies of `task_id`; empty for unknown ids.
    pub fn get_predecessors(&self, task_id: TaskId) -> Vec<&Dependency> {
        self.edges(task_id, Direction::Incoming)
            .map(|edge| edge.weight())
            .collect()
    }

    /// Outgoing dependencies of `task_id`; empty for unknown ids.
    pub fn get_successors(&self, task_id: TaskId) -> Vec<&Dependency> {
        self.edges(task_id, Direction::Outgoing)
            .map(|edge| edge.weight())
            .collect()
    }

    pub fn get_predecessor_tasks(&self, task_id: TaskId) -> Vec<&Task> {
        self.edges(task_id, Direction::Incoming)
            .map(|edge| &self.graph[edge.source()])
            .collect()
    }

    pub fn get_successor_tasks(&self, task_id: TaskId) -> Vec<&Task> {
        self.edges(task_id, Direction::Outgoing)
            .map(|edge| &self.graph[edge.target()])
            .collect()
    }

    /// Kahn's algorithm over node indices. Ties are released in insertion order.
    pub(crate) fn topological_indices(&self) -> Result<Vec<NodeIndex>, CycleError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|node| {
                self.graph
                    .edges_directed(node, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|node| in_degree[node.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(node) = queue.pop_front() {
            order.push(node);
            for successor in self.graph.neighbors_directed(node, Direction::Outgoing) {
                let degree = &mut in_degree[successor.index()];
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(successor);
                }
            }
        }

        if order.len() != self.graph.node_count() {
            let unresolved = self
                .graph
                .node_indices()
                .filter(|node| in_degree[node.index()] > 0)
                .map(|node| self.graph[node].task_id)
                .collect();
            return Err(CycleError::new(unresolved));
        }
        Ok(order)
    }

    /// Task ids ordered so every predecessor precedes its successors.
    pub fn topological_sort(&self) -> Result<Vec<TaskId>, CycleError> {
        Ok(self
            .topological_indices()?
            .into_iter()
            .map(|node| self.graph[node].task_id)
            .collect())
    }

    pub fn reverse_topological_sort(&self) -> Result<Vec<TaskId>, CycleError> {
        let mut order = self.topological_sort()?;
        order.reverse();
        Ok(order)
    }

    fn reachable(&self, task_id: TaskId, direction: Direction) -> HashSet<TaskId> {
        let mut seen = HashSet::new();
        let Some(start) = self.node(task_id) else {
            return seen;
        };
        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors_directed(node, direction) {
                if visited.insert(next) {
                    seen.insert(self.graph[next].task_id);
                    queue.push_back(next);
                }
            }
        }
        // A cycle through the start task reaches the task itself.
        seen.remove(&task_id);
        seen
    }

    /// Every task `task_id` transitively depends on.
    pub fn get_all_predecessors(&self, task_id: TaskId) -> HashSet<TaskId> {
        self.reachable(task_id, Direction::Incoming)
    }

    /// Every task transitively depending on `task_id`.
    pub fn get_all_successors(&self, task_id: TaskId) -> HashSet<TaskId> {
        self.reachable(task_id, Direction::Outgoing)
    }

    /// Sets a task's planned duration. Remaining work of an in-progress task
    /// moves by the same amount. Meant for what-if clones.
    pub fn modify_task_duration(
        &mut self,
        task_id: TaskId,
        new_duration_hours: f64,
    ) -> ScheduleResult<()> {
        let task = self
            .task_mut(task_id)
            .ok_or(ScheduleError::NotFound(task_id))?;
        let delta = new_duration_hours - task.duration_hours;
        task.duration_hours = new_duration_hours;
        if task.status == TaskStatus::InProgress {
            if let Some(remaining) = task.remaining_duration_hours.as_mut() {
                *remaining = (*remaining + delta).max(0.0);
            }
        }
        Ok(())
    }

    /// The sub-network induced by tasks whose status is in `statuses`.
    pub fn filter_by_status(&self, statuses: &[TaskStatus]) -> TaskNetwork {
        let mut filtered = TaskNetwork::new();
        for task in self.tasks().filter(|task| statuses.contains(&task.status)) {
            filtered.add_task(task.clone());
        }
        for dependency in self.dependencies() {
            if filtered.contains(dependency.predecessor_id)
                && filtered.contains(dependency.successor_id)
            {
                filtered.add_dependency_safe(dependency.clone());
            }
        }
        filtered
    }

    /// Clears engine output on every task.
    pub fn reset_schedule(&mut self) {
        for task in self.graph.node_weights_mut() {
            task.reset_schedule();
        }
    }
}
