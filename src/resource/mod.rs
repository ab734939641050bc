//! Resource handles: declared descriptors plus the per-handle state the scheduler tracks.
//!
//! The scheduler consumes these handles but never aliases memory itself; backing assignment is
//! the allocator's job.

pub(crate) mod desc;
pub(crate) mod table;
