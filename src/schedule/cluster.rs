use crate::device::command::LoadOp;
use crate::foundation::ids::{ResourceId, TaskId};
use crate::task::{Task, TaskKind};
use std::collections::HashMap;

/// Reorder `span` so tasks writing the same target run back to back.
///
/// Each single-target task is moved up to sit right after the previous task with the same
/// target (its cluster tail) unless one of the tasks in between reads that target or is a
/// dependency of the moved task. Multi-target and target-less tasks stay at the end.
///
/// The result is always appended to `out` as a permutation of `span`. Returns `true` when at least
/// one task moved.
pub(crate) fn cluster_span(
    span: &[TaskId],
    tasks: &HashMap<TaskId, Task>,
    out: &mut Vec<TaskId>,
) -> bool {
    if span.len() < 3 {
        out.extend_from_slice(span);
        return false;
    }

    let mut list: Vec<TaskId> = Vec::with_capacity(span.len());
    let mut cluster_tail: HashMap<ResourceId, TaskId> = HashMap::new();
    let mut moved = false;

    for &id in span {
        let task = &tasks[&id];
        let &[target] = task.targets() else {
            list.push(id);
            continue;
        };
        let tail_pos = cluster_tail
            .get(&target)
            .and_then(|tail| list.iter().position(|t| t == tail));
        let insert_at = match tail_pos {
            Some(p) if p + 1 < list.len() => {
                let blocked = list[p + 1..]
                    .iter()
                    .any(|other| task.depends_on(*other) || tasks[other].is_used(target));
                (!blocked).then_some(p + 1)
            }
            _ => None,
        };
        match insert_at {
            Some(at) => {
                list.insert(at, id);
                moved = true;
            }
            None => list.push(id),
        }
        cluster_tail.insert(target, id);
    }

    out.extend(list);
    moved
}

/// Number of draw tasks directly after `head` in `rest` that can be folded into it.
///
/// A candidate that clears its target blocks the whole merge.
fn mergeable_run(head: TaskId, rest: &[TaskId], tasks: &HashMap<TaskId, Task>) -> usize {
    let h = &tasks[&head];
    let (Some(head_draw), &[target]) = (h.as_draw(), h.targets()) else {
        return 0;
    };
    let mut n = 0;
    for id in rest {
        let t = &tasks[id];
        let (Some(draw), &[later_target]) = (t.as_draw(), t.targets()) else {
            break;
        };
        if !head_draw.can_merge(target, draw, later_target) {
            break;
        }
        if matches!(draw.load_op(), LoadOp::Clear(_)) {
            return 0;
        }
        n += 1;
    }
    n
}

/// Fold `run` into `head`: content, then edges. The folded tasks leave the arena.
fn absorb_run(head: TaskId, run: &[TaskId], tasks: &mut HashMap<TaskId, Task>) {
    for &m in run {
        let Some(removed) = tasks.remove(&m) else {
            continue;
        };
        for &d in removed.dependencies() {
            if d == head || run.contains(&d) {
                continue;
            }
            if let Some(dt) = tasks.get_mut(&d) {
                dt.dependents.retain(|x| *x != m);
                dt.add_dependent_edge(head);
            }
            if let Some(h) = tasks.get_mut(&head) {
                h.add_dependency_edge(d);
            }
        }
        for &d in removed.dependents() {
            if d == head || run.contains(&d) {
                continue;
            }
            if let Some(dt) = tasks.get_mut(&d) {
                dt.dependencies.retain(|x| *x != m);
                dt.add_dependency_edge(head);
            }
            if let Some(h) = tasks.get_mut(&head) {
                h.add_dependent_edge(d);
            }
        }
        if let (TaskKind::Draw(draw), Some(h)) = (removed.kind, tasks.get_mut(&head))
            && let Some(hd) = h.as_draw_mut()
        {
            hd.absorb(draw);
        }
    }
    if let Some(h) = tasks.get_mut(&head) {
        h.dependents.retain(|x| !run.contains(x));
    }
}

/// Merge each run of compatible adjacent draw tasks in `dag` into its first task.
///
/// Barriers are never draws, so they are never folded; `barriers` is rewritten to their new
/// positions. Returns the number of tasks folded away.
pub(crate) fn merge_draw_tasks(
    dag: &mut Vec<TaskId>,
    barriers: &mut Vec<usize>,
    tasks: &mut HashMap<TaskId, Task>,
) -> usize {
    let mut kept = Vec::with_capacity(dag.len());
    let mut moved_barriers = Vec::with_capacity(barriers.len());
    let mut merged = 0;
    let mut i = 0;
    while i < dag.len() {
        let head = dag[i];
        if barriers.contains(&i) {
            moved_barriers.push(kept.len());
        }
        let n = mergeable_run(head, &dag[i + 1..], tasks);
        if n > 0 {
            absorb_run(head, &dag[i + 1..i + 1 + n], tasks);
            tracing::trace!(%head, merged = n, "merged draw tasks");
            merged += n;
        }
        kept.push(head);
        i += 1 + n;
    }
    *dag = kept;
    *barriers = moved_barriers;
    merged
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/cluster.rs"]
mod tests;
