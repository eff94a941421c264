use schedule_cpm::{
    Dependency, NetworkIssue, RelationshipType, ScheduleError, Task, TaskNetwork, TaskStatus,
};
use std::collections::{HashMap, HashSet};

fn task(id: i64, hours: f64) -> Task {
    Task::new(id, format!("T{id}"), format!("Task {id}"), hours).with_calendar(1)
}

/// 1 -> {2, 3} -> 4, plus 5 hanging off 3.
fn diamond() -> TaskNetwork {
    let mut network = TaskNetwork::new();
    for id in 1..=5 {
        network.add_task(task(id, 8.0));
    }
    for (p, s) in [(1, 2), (1, 3), (2, 4), (3, 4), (3, 5)] {
        network.add_dependency(Dependency::finish_to_start(p, s)).unwrap();
    }
    network
}

#[test]
fn strict_insert_rejects_unknown_endpoints() {
    let mut network = diamond();
    let err = network
        .add_dependency(Dependency::finish_to_start(1, 42))
        .unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::InvalidReference {
            predecessor: 1,
            successor: 42,
            missing: 42
        }
    ));
    assert_eq!(network.dependency_count(), 5);
}

#[test]
fn tolerant_insert_records_dangling_dependencies() {
    let mut network = diamond();
    assert!(network.add_dependency_safe(Dependency::finish_to_start(4, 5)));
    assert!(!network.add_dependency_safe(Dependency::finish_to_start(77, 1)));
    assert_eq!(network.dependency_count(), 6);
    assert_eq!(network.dangling_dependencies().len(), 1);
    assert!(network.validate().contains(&NetworkIssue::DanglingDependency {
        predecessor_id: 77,
        successor_id: 1
    }));
}

#[test]
fn topological_sort_places_predecessors_first() {
    let network = diamond();
    let order = network.topological_sort().unwrap();
    assert_eq!(order.len(), 5);
    let position: HashMap<i64, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    for dep in network.dependencies() {
        assert!(position[&dep.predecessor_id] < position[&dep.successor_id]);
    }

    let mut reversed = network.reverse_topological_sort().unwrap();
    reversed.reverse();
    assert_eq!(reversed, order);
}

#[test]
fn cycles_are_reported_with_a_sample() {
    let mut network = diamond();
    network.add_dependency(Dependency::finish_to_start(4, 1)).unwrap();
    let err = network.topological_sort().unwrap_err();
    // 5 hangs off the cycle, so it is never released either.
    assert_eq!(err.unresolved, 5);
    assert_eq!(err.sample, vec![1, 2, 3, 4, 5]);
    assert!(network.validate().iter().any(|issue| matches!(issue, NetworkIssue::Cycle { .. })));
}

#[test]
fn direct_neighbours_by_dependency_and_task() {
    let network = diamond();
    let preds: HashSet<i64> = network
        .get_predecessors(4)
        .iter()
        .map(|dep| dep.predecessor_id)
        .collect();
    assert_eq!(preds, HashSet::from([2, 3]));

    let succs: HashSet<&str> = network
        .get_successor_tasks(3)
        .iter()
        .map(|task| task.task_code.as_str())
        .collect();
    assert_eq!(succs, HashSet::from(["T4", "T5"]));
    assert!(network.get_successors(99).is_empty());
}

#[test]
fn transitive_closure_walks_the_whole_graph() {
    let network = diamond();
    assert_eq!(network.get_all_predecessors(4), HashSet::from([1, 2, 3]));
    assert_eq!(network.get_all_successors(1), HashSet::from([2, 3, 4, 5]));
    assert!(network.get_all_successors(5).is_empty());
}

#[test]
fn clone_isolates_duration_changes() {
    let source = diamond();
    let mut clone = source.clone();
    clone.modify_task_duration(2, 40.0).unwrap();
    assert_eq!(clone.task(2).unwrap().duration_hours, 40.0);
    assert_eq!(source.task(2).unwrap().duration_hours, 8.0);
}

#[test]
fn modifying_in_progress_task_moves_remaining_work() {
    let mut network = TaskNetwork::new();
    network.add_task(
        task(1, 40.0)
            .with_status(TaskStatus::InProgress)
            .with_remaining(16.0),
    );
    network.modify_task_duration(1, 48.0).unwrap();
    assert_eq!(network.task(1).unwrap().remaining_duration_hours, Some(24.0));
    network.modify_task_duration(1, 0.0).unwrap();
    assert_eq!(network.task(1).unwrap().remaining_duration_hours, Some(0.0));

    assert!(matches!(
        network.modify_task_duration(9, 1.0),
        Err(ScheduleError::NotFound(9))
    ));
}

#[test]
fn filter_keeps_only_edges_between_survivors() {
    let mut network = diamond();
    network.task_mut(1).unwrap().status = TaskStatus::Completed;
    network.task_mut(5).unwrap().status = TaskStatus::InProgress;

    let open = network.filter_by_status(&[TaskStatus::NotStarted, TaskStatus::InProgress]);
    assert_eq!(open.len(), 4);
    assert!(!open.contains(1));
    let edges: HashSet<(i64, i64)> = open
        .dependencies()
        .map(|dep| (dep.predecessor_id, dep.successor_id))
        .collect();
    assert_eq!(edges, HashSet::from([(2, 4), (3, 4), (3, 5)]));
}

#[test]
fn re_adding_a_task_keeps_its_dependencies() {
    let mut network = diamond();
    network.add_task(task(2, 24.0));
    assert_eq!(network.len(), 5);
    assert_eq!(network.task(2).unwrap().duration_hours, 24.0);
    assert_eq!(network.get_predecessors(2).len(), 1);
}

#[test]
fn validate_lists_structural_issues() {
    let mut network = diamond();
    assert!(network.validate().is_empty());

    network.add_task(Task::new(6, "T6", "No calendar", -2.0));
    network
        .add_dependency(Dependency::new(6, 6, RelationshipType::FinishToStart, 0.0))
        .unwrap();
    network.add_dependency(Dependency::finish_to_start(1, 2)).unwrap();

    let issues = network.validate();
    assert!(issues.contains(&NetworkIssue::SelfLoop { task_id: 6 }));
    assert!(issues.contains(&NetworkIssue::DuplicateDependency {
        predecessor_id: 1,
        successor_id: 2,
        relationship: RelationshipType::FinishToStart
    }));
    assert!(issues.contains(&NetworkIssue::MissingCalendar { task_id: 6 }));
    assert!(issues.contains(&NetworkIssue::NegativeDuration {
        task_id: 6,
        duration_hours: -2.0
    }));
    assert!(issues.iter().any(|issue| matches!(issue, NetworkIssue::Cycle { unresolved: 1, .. })));
    assert!(issues.iter().all(|issue| !issue.to_string().is_empty()));
}
