use super::*;
use crate::foundation::geom::IRect;
use crate::resource::desc::Mipmapped;
use crate::task::buffer::BufferUpdateTask;
use crate::task::draw::{DrawOp, DrawTask};

fn draw(tasks: &mut HashMap<TaskId, Task>, id: u32, target: u32, group: u32) {
    let mut t = Task::new(TaskId(id), TaskKind::Draw(DrawTask::new(group)));
    t.targets.push(ResourceId(target));
    t.as_draw_mut()
        .expect("draw")
        .record(DrawOp::new(format!("d{id}"), IRect::from_size(4, 4)));
    tasks.insert(TaskId(id), t);
}

fn link(tasks: &mut HashMap<TaskId, Task>, dependent: u32, on: u32) {
    tasks
        .get_mut(&TaskId(dependent))
        .expect("dependent")
        .add_dependency_edge(TaskId(on));
    tasks
        .get_mut(&TaskId(on))
        .expect("dependency")
        .add_dependent_edge(TaskId(dependent));
}

fn ids(v: &[u32]) -> Vec<TaskId> {
    v.iter().copied().map(TaskId).collect()
}

#[test]
fn short_spans_are_copied_unchanged() {
    let mut tasks = HashMap::new();
    draw(&mut tasks, 0, 0, 0);
    draw(&mut tasks, 1, 0, 0);
    let mut out = Vec::new();
    assert!(!cluster_span(&ids(&[1, 0]), &tasks, &mut out));
    assert_eq!(out, ids(&[1, 0]));
}

#[test]
fn same_target_tasks_are_pulled_together() {
    let mut tasks = HashMap::new();
    draw(&mut tasks, 0, 0, 0);
    draw(&mut tasks, 1, 1, 0);
    draw(&mut tasks, 2, 0, 0);
    let mut out = Vec::new();
    assert!(cluster_span(&ids(&[0, 1, 2]), &tasks, &mut out));
    assert_eq!(out, ids(&[0, 2, 1]));
}

#[test]
fn a_reader_in_between_blocks_the_move() {
    let mut tasks = HashMap::new();
    draw(&mut tasks, 0, 0, 0);
    draw(&mut tasks, 1, 1, 0);
    draw(&mut tasks, 2, 0, 0);
    tasks
        .get_mut(&TaskId(1))
        .and_then(Task::as_draw_mut)
        .expect("draw")
        .record(DrawOp::new("read", IRect::from_size(1, 1)).sampling(ResourceId(0), Mipmapped::No));
    let mut out = Vec::new();
    assert!(!cluster_span(&ids(&[0, 1, 2]), &tasks, &mut out));
    assert_eq!(out, ids(&[0, 1, 2]));
}

#[test]
fn a_dependency_in_between_blocks_the_move() {
    let mut tasks = HashMap::new();
    draw(&mut tasks, 0, 0, 0);
    draw(&mut tasks, 1, 1, 0);
    draw(&mut tasks, 2, 0, 0);
    link(&mut tasks, 2, 1);
    let mut out = Vec::new();
    assert!(!cluster_span(&ids(&[0, 1, 2]), &tasks, &mut out));
    assert_eq!(out, ids(&[0, 1, 2]));
}

#[test]
fn adjacent_draws_merge_and_edges_follow() {
    let mut tasks = HashMap::new();
    draw(&mut tasks, 5, 3, 0);
    draw(&mut tasks, 0, 0, 0);
    draw(&mut tasks, 1, 0, 0);
    draw(&mut tasks, 2, 2, 0);
    link(&mut tasks, 1, 0);
    link(&mut tasks, 1, 5);
    link(&mut tasks, 2, 1);

    let mut dag = ids(&[5, 0, 1, 2]);
    assert_eq!(merge_draw_tasks(&mut dag, &mut Vec::new(), &mut tasks), 1);
    assert_eq!(dag, ids(&[5, 0, 2]));
    assert!(!tasks.contains_key(&TaskId(1)));

    let head = &tasks[&TaskId(0)];
    assert_eq!(head.as_draw().expect("draw").ops().len(), 2);
    assert!(head.depends_on(TaskId(5)));
    assert_eq!(head.dependents(), &[TaskId(2)]);
    assert!(tasks[&TaskId(2)].depends_on(TaskId(0)));
    assert!(!tasks[&TaskId(2)].depends_on(TaskId(1)));
    assert!(tasks[&TaskId(5)].dependents().contains(&TaskId(0)));
}

#[test]
fn different_groups_or_clears_do_not_merge() {
    let mut tasks = HashMap::new();
    draw(&mut tasks, 0, 0, 0);
    draw(&mut tasks, 1, 0, 1);
    let mut dag = ids(&[0, 1]);
    assert_eq!(merge_draw_tasks(&mut dag, &mut Vec::new(), &mut tasks), 0);
    assert_eq!(dag.len(), 2);

    draw(&mut tasks, 2, 0, 0);
    draw(&mut tasks, 3, 0, 0);
    tasks
        .get_mut(&TaskId(3))
        .and_then(Task::as_draw_mut)
        .expect("draw")
        .set_load_op(LoadOp::Clear([0.0; 4]), IRect::from_size(4, 4));
    let mut dag = ids(&[2, 3]);
    assert_eq!(merge_draw_tasks(&mut dag, &mut Vec::new(), &mut tasks), 0);
    assert_eq!(dag, ids(&[2, 3]));
}

#[test]
fn barrier_positions_follow_a_merge() {
    let mut tasks = HashMap::new();
    draw(&mut tasks, 0, 0, 0);
    draw(&mut tasks, 1, 0, 0);
    draw(&mut tasks, 2, 1, 0);
    let mut update = Task::new(
        TaskId(9),
        TaskKind::BufferUpdate(BufferUpdateTask::new(ResourceId(7), 0, vec![0; 4])),
    );
    update.flags.blocks_reordering = true;
    tasks.insert(TaskId(9), update);
    link(&mut tasks, 1, 0);

    let mut dag = ids(&[0, 1, 9, 2]);
    let mut barriers = vec![2];
    assert_eq!(merge_draw_tasks(&mut dag, &mut barriers, &mut tasks), 1);
    assert_eq!(dag, ids(&[0, 9, 2]));
    assert_eq!(barriers, vec![1]);
}
