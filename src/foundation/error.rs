/// Convenience result type used at kinema's loading boundaries.
pub type KinemaResult<T> = Result<T, KinemaError>;

/// Errors surfaced while loading documents, images and configuration.
///
/// Playback, tree edits and rendering never return these; they clamp or
/// report `false` instead.
#[derive(thiserror::Error, Debug)]
pub enum KinemaError {
    /// Malformed document or configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure reading bytes from disk.
    #[error("io error: {0}")]
    Io(String),

    /// JSON or image payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A GPU backend refused to allocate a resource.
    #[error("backend error: {0}")]
    Backend(String),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KinemaError {
    /// Build a [`KinemaError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`KinemaError::Io`] value.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Build a [`KinemaError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`KinemaError::Backend`] value.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
