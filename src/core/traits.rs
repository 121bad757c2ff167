//! Core traits for the push side of an operator attachment.
//!
//! A sink receives events as they happen. Every method must return promptly:
//! sinks hand values on, they never wait for downstream progress.

use std::marker::PhantomData;

use crate::core::error::Error;

/// A push-style consumer of stream events.
///
/// A well-behaved producer calls `on_next` zero or more times followed by at
/// most one of `on_error` or `on_complete`.
///
/// # Examples
///
/// ```rust
/// use streamlift::core::{Error, Sink};
///
/// #[derive(Default)]
/// struct SumSink {
///     total: i64,
///     done: bool,
/// }
///
/// impl Sink for SumSink {
///     type Item = i64;
///
///     fn on_next(&mut self, item: Self::Item) {
///         self.total += item;
///     }
///
///     fn on_error(&mut self, _error: Error) {
///         self.done = true;
///     }
///
///     fn on_complete(&mut self) {
///         self.done = true;
///     }
/// }
///
/// let mut sink = SumSink::default();
/// sink.on_next(2);
/// sink.on_next(3);
/// sink.on_complete();
/// assert_eq!(sink.total, 5);
/// ```
pub trait Sink {
    /// The type of items this sink accepts
    type Item: Send + 'static;

    /// Receive the next item.
    fn on_next(&mut self, item: Self::Item);

    /// Receive the terminal error.
    fn on_error(&mut self, error: Error);

    /// Receive the terminal completion signal.
    fn on_complete(&mut self);

    /// Dispatch a [`Notification`] to the matching method.
    fn notify(&mut self, notification: Notification<Self::Item>) {
        match notification {
            Notification::Next(item) => self.on_next(item),
            Notification::Error(error) => self.on_error(error),
            Notification::Complete => self.on_complete(),
        }
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    type Item = S::Item;

    fn on_next(&mut self, item: Self::Item) {
        (**self).on_next(item)
    }

    fn on_error(&mut self, error: Error) {
        (**self).on_error(error)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }
}

/// A single stream event, reified.
#[derive(Debug, Clone)]
pub enum Notification<T> {
    Next(T),
    Error(Error),
    Complete,
}

impl<T> Notification<T> {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }
}

/// Helper function to create a sink from a closure over notifications
pub fn sink_from_fn<F, T>(f: F) -> FnSink<F, T>
where
    F: FnMut(Notification<T>) + Send,
    T: Send + 'static,
{
    FnSink {
        f,
        _phantom: PhantomData,
    }
}

/// A sink created from a function
pub struct FnSink<F, T> {
    f: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> Sink for FnSink<F, T>
where
    F: FnMut(Notification<T>) + Send,
    T: Send + 'static,
{
    type Item = T;

    fn on_next(&mut self, item: Self::Item) {
        (self.f)(Notification::Next(item))
    }

    fn on_error(&mut self, error: Error) {
        (self.f)(Notification::Error(error))
    }

    fn on_complete(&mut self) {
        (self.f)(Notification::Complete)
    }
}
