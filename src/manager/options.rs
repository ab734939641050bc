/// Scheduling options of a [`crate::DrawingManager`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DrawingManagerOpts {
    /// Cluster tasks by target and merge adjacent draws before allocation.
    pub reduce_task_splitting: bool,
    /// Submit to the device after this many instantiated tasks to bound in-flight command memory.
    pub max_tasks_before_submit: usize,
}

impl Default for DrawingManagerOpts {
    fn default() -> Self {
        Self {
            reduce_task_splitting: false,
            max_tasks_before_submit: 100,
        }
    }
}

/// Staging buffers kept between flushes.
pub(crate) fn max_cached_staging_buffers(prefer_client_side_dynamic_buffers: bool) -> usize {
    if prefer_client_side_dynamic_buffers {
        2
    } else {
        6
    }
}
