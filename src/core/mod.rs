//! Core traits and types for the streamlift library.
//!
//! This module contains the sink abstraction and the error type shared by
//! every attachment.

pub mod error;
pub mod traits;

// Re-export core items
pub use error::{Error, IntoError, Result};
pub use traits::{sink_from_fn, FnSink, Notification, Sink};
