use crate::foundation::ids::TaskId;
use crate::task::Task;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Dependency-count sorter over one barrier-free span of the task list.
///
/// Determinism rule: when several tasks are ready, the one with the lowest position in the span
/// goes first, so independent tasks keep their recording order. Only edges between tasks of the
/// span are counted; dependencies on earlier spans are already satisfied.
pub(crate) struct SpanSorter {
    indeg: Vec<u32>,
    dependents: Vec<Vec<usize>>,
    ready: BinaryHeap<Reverse<usize>>,
}

impl SpanSorter {
    pub(crate) fn new(span: &[TaskId], tasks: &HashMap<TaskId, Task>) -> Self {
        let n = span.len();
        let pos: HashMap<TaskId, usize> = span.iter().enumerate().map(|(i, &t)| (t, i)).collect();
        let mut indeg = vec![0u32; n];
        let mut dependents = vec![Vec::<usize>::new(); n];

        for (i, id) in span.iter().enumerate() {
            for dep in tasks[id].dependencies() {
                if let Some(&di) = pos.get(dep) {
                    dependents[di].push(i);
                    indeg[i] = indeg[i].saturating_add(1);
                }
            }
        }

        let mut ready = BinaryHeap::new();
        for (i, &deg) in indeg.iter().enumerate() {
            if deg == 0 {
                ready.push(Reverse(i));
            }
        }

        Self {
            indeg,
            dependents,
            ready,
        }
    }

    fn pop_ready(&mut self) -> Option<usize> {
        let Reverse(i) = self.ready.pop()?;
        for &d in &self.dependents[i] {
            let deg = &mut self.indeg[d];
            *deg = deg.saturating_sub(1);
            if *deg == 0 {
                self.ready.push(Reverse(d));
            }
        }
        Some(i)
    }

    /// Positions in execution order.
    ///
    /// # Panics
    /// On a dependency cycle. Cycles can only come from broken graph construction.
    pub(crate) fn into_order(mut self) -> Vec<usize> {
        let n = self.indeg.len();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = self.pop_ready() {
            order.push(i);
        }
        assert!(
            order.len() == n,
            "dependency cycle among {} of {n} tasks",
            n - order.len()
        );
        order
    }
}

/// Sort `span` in place.
pub(crate) fn sort_span(span: &mut [TaskId], tasks: &HashMap<TaskId, Task>) {
    if span.len() < 2 {
        return;
    }
    let order = SpanSorter::new(span, tasks).into_order();
    let sorted: Vec<TaskId> = order.into_iter().map(|i| span[i]).collect();
    span.copy_from_slice(&sorted);
}

/// Sort every span delimited by `barriers`; barrier tasks keep their positions.
pub(crate) fn sort_partitions(
    dag: &mut [TaskId],
    barriers: &[usize],
    tasks: &HashMap<TaskId, Task>,
) {
    let mut start = 0;
    for end in barriers.iter().copied().chain(std::iter::once(dag.len())) {
        let end = end.min(dag.len());
        if start < end {
            sort_span(&mut dag[start..end], tasks);
        }
        start = end + 1;
    }
    tracing::trace!(tasks = dag.len(), spans = barriers.len() + 1, "sorted task list");
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/topo.rs"]
mod tests;
