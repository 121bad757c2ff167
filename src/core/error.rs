//! Error types for operator attachments.
//!
//! Operators never invent errors of their own. Whatever the upstream source or
//! the transformation raises travels through the bridge untouched and reaches
//! the downstream sink exactly once.

use std::sync::Arc;

/// The error type carried on the error path of every stream in this crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The upstream source failed
    #[error("Upstream error: {0}")]
    Upstream(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// The transformation function's output stream failed
    #[error("Transform error: {0}")]
    Transform(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

// Convenience constructors
impl Error {
    /// Create an upstream error from any error type
    pub fn upstream<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Upstream(Arc::new(error))
    }

    /// Create a transform error from any error type
    pub fn transform<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Transform(Arc::new(error))
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

// A boxed error carries no origin, so it is not labelled as either side.
impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Custom(e.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for labelling foreign errors with their origin
pub trait IntoError<T> {
    fn into_upstream_error(self) -> Result<T>;
    fn into_transform_error(self) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_upstream_error(self) -> Result<T> {
        self.map_err(Error::upstream)
    }

    fn into_transform_error(self) -> Result<T> {
        self.map_err(Error::transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = Error::upstream(io);

        assert_eq!(err.to_string(), "Upstream error: pipe closed");
        assert!(err.source().is_some());
        assert!(Error::custom("Boom").source().is_none());
    }

    #[test]
    fn test_into_error_labels_origin() {
        let parsed: std::result::Result<i32, _> = "x".parse::<i32>();
        let err = parsed.into_transform_error().unwrap_err();

        assert!(matches!(err, Error::Transform(_)));
    }

    #[test]
    fn test_boxed_error_is_unlabelled() {
        let boxed: Box<dyn std::error::Error + Send + Sync> = "bad input".into();
        let err = Error::from(boxed);

        assert!(matches!(err, Error::Custom(_)));
        assert_eq!(err.to_string(), "bad input");
    }

    #[test]
    fn test_clone_shares_cause() {
        let err = Error::from("Boom");
        let cloned = err.clone();

        assert_eq!(err.to_string(), cloned.to_string());
    }
}
