//! Backing assignment for the resources a flush touches.

pub(crate) mod contract;
pub(crate) mod interval;
