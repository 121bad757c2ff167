//! Downstream subscribers and their cancellation scope.
//!
//! A [`Subscriber`] pairs a downstream [`Sink`] with a [`CancellationToken`].
//! Anything registered with the subscriber receives a child token, so a single
//! `unsubscribe` tears down every stage hanging off that attachment.

use tokio_util::sync::CancellationToken;

use crate::core::{Error, Sink};
use crate::tracing_support::trace_event;

/// A downstream sink together with the scope that can cancel it.
pub struct Subscriber<S> {
    sink: S,
    token: CancellationToken,
    terminated: bool,
}

impl<S: Sink> Subscriber<S> {
    /// Wrap a sink in a fresh cancellation scope
    pub fn new(sink: S) -> Self {
        Self::with_token(sink, CancellationToken::new())
    }

    /// Wrap a sink in an existing cancellation scope
    pub fn with_token(sink: S, token: CancellationToken) -> Self {
        Self {
            sink,
            token,
            terminated: false,
        }
    }

    /// The token that cancels this subscriber
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Register a dependent resource.
    ///
    /// The returned token is cancelled whenever this subscriber is
    /// unsubscribed, but cancelling it does not unsubscribe the subscriber.
    pub fn register(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Cancel this subscriber and everything registered with it
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    /// Whether the subscriber was cancelled
    pub fn is_unsubscribed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether a terminal signal has been delivered
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Get a reference to the wrapped sink
    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    /// Consume the subscriber and return the wrapped sink
    pub fn into_inner(self) -> S {
        self.sink
    }

    fn accepts(&self) -> bool {
        !self.terminated && !self.token.is_cancelled()
    }
}

impl<S: Sink> Sink for Subscriber<S> {
    type Item = S::Item;

    fn on_next(&mut self, item: Self::Item) {
        if self.accepts() {
            self.sink.on_next(item);
        } else {
            trace_event!("dropping item after subscriber terminated");
        }
    }

    fn on_error(&mut self, error: Error) {
        if self.accepts() {
            self.terminated = true;
            self.sink.on_error(error);
        } else {
            trace_event!(%error, "dropping error after subscriber terminated");
        }
    }

    fn on_complete(&mut self) {
        if self.accepts() {
            self.terminated = true;
            self.sink.on_complete();
        } else {
            trace_event!("dropping completion after subscriber terminated");
        }
    }
}
