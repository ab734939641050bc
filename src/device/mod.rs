//! The device boundary: backing memory, command encoding and submission.

pub(crate) mod backend;
pub(crate) mod command;
pub(crate) mod flush_state;
pub(crate) mod headless;
pub(crate) mod pool;
