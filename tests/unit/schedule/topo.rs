use super::*;
use crate::foundation::ids::ResourceId;
use crate::task::TaskKind;
use crate::task::draw::DrawTask;

fn graph(spec: &[(u32, &[u32])]) -> HashMap<TaskId, Task> {
    let mut tasks = HashMap::new();
    for &(id, deps) in spec {
        let mut t = Task::new(TaskId(id), TaskKind::Draw(DrawTask::new(0)));
        t.targets.push(ResourceId(id));
        for &d in deps {
            t.add_dependency_edge(TaskId(d));
        }
        tasks.insert(TaskId(id), t);
    }
    tasks
}

fn ids(v: &[u32]) -> Vec<TaskId> {
    v.iter().copied().map(TaskId).collect()
}

#[test]
fn dependencies_precede_dependents_and_ties_keep_recording_order() {
    // 3 <- 0, 2 <- 1, 1 <- 3
    let tasks = graph(&[(0, &[3]), (1, &[]), (2, &[1]), (3, &[1])]);
    let mut dag = ids(&[0, 1, 2, 3]);
    sort_partitions(&mut dag, &[], &tasks);
    assert_eq!(dag, ids(&[1, 2, 3, 0]));
}

#[test]
fn independent_tasks_are_left_alone() {
    let tasks = graph(&[(4, &[]), (2, &[]), (9, &[])]);
    let mut dag = ids(&[4, 2, 9]);
    sort_partitions(&mut dag, &[], &tasks);
    assert_eq!(dag, ids(&[4, 2, 9]));
}

#[test]
fn barriers_are_never_crossed() {
    // Task 0 depends on task 2, but a barrier (task 1) separates them.
    let tasks = graph(&[(0, &[2]), (1, &[]), (2, &[]), (3, &[2])]);
    let mut dag = ids(&[0, 1, 3, 2]);
    sort_partitions(&mut dag, &[1], &tasks);
    assert_eq!(dag, ids(&[0, 1, 2, 3]));
}

#[test]
fn out_of_span_dependencies_are_ignored() {
    let tasks = graph(&[(0, &[]), (1, &[0]), (2, &[0])]);
    let mut dag = ids(&[0, 2, 1]);
    sort_span(&mut dag[1..], &tasks);
    assert_eq!(dag, ids(&[0, 2, 1]));
}

#[test]
#[should_panic(expected = "dependency cycle")]
fn cycles_panic() {
    let tasks = graph(&[(0, &[1]), (1, &[0])]);
    let mut dag = ids(&[0, 1]);
    sort_partitions(&mut dag, &[], &tasks);
}
