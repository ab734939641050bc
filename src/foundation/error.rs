/// Convenience result type used across flushgraph.
pub type FlushResult<T> = Result<T, FlushError>;

/// Top-level error taxonomy used by task construction and device APIs.
///
/// `DrawingManager::flush` itself never returns these: flush-time failures degrade to a `false`
/// outcome so callers observe "nothing new was produced this flush".
#[derive(thiserror::Error, Debug)]
pub enum FlushError {
    /// Invalid caller-provided data (ranges, rectangles, resource kinds, closed tasks).
    #[error("validation error: {0}")]
    Validation(String),

    /// Backing memory could not be obtained for a resource.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// The device rejected an operation.
    #[error("device error: {0}")]
    Device(String),

    /// The device context was lost; it must be recreated.
    #[error("device abandoned")]
    Abandoned,

    /// Errors when serializing or deserializing replay scripts.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlushError {
    /// Build a [`FlushError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FlushError::Allocation`] value.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build a [`FlushError::Device`] value.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Build a [`FlushError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
