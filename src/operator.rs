//! Turning stream transformations into reusable operators.
//!
//! A transformation is any function from an input stream to an output
//! stream. [`to_operator`] wraps one into an [`Operator`]: a value that can be
//! attached to a downstream [`Subscriber`] any number of times, each time
//! yielding a fresh [`UpstreamSink`] that the upstream source pushes into.
//!
//! Every attachment gets its own [`Bridge`]. Items pushed into the upstream
//! sink are emitted on the bridge, the transformation reads the bridge as its
//! input stream, and whatever the transformation's output yields is delivered
//! to the downstream subscriber.
//!
//! # Example
//!
//! ```rust
//! use futures::TryStreamExt;
//! use streamlift::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let double = to_operator(|input: BridgeStream<i64>| input.map_ok(|x| x * 2));
//!
//!     let collector = CollectSink::new();
//!     let mut upstream = double.attach(Subscriber::new(collector.clone()));
//!     for i in 1..=3 {
//!         upstream.on_next(i);
//!     }
//!     upstream.on_complete();
//!
//!     collector.wait_for_termination().await;
//!     assert_eq!(collector.items(), vec![2, 4, 6]);
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

use crate::bridge::{Bridge, BridgeStream};
use crate::core::{Error, Result, Sink};
use crate::subscriber::Subscriber;
use crate::tracing_support::{debug_event, trace_event};

type Transform<T, R> = dyn Fn(BridgeStream<T>) -> BoxStream<'static, Result<R>> + Send + Sync;

/// Lifecycle of a single attachment.
///
/// An attachment is unattached until [`Operator::bind`] or
/// [`Operator::attach`] creates its upstream sink, after which it is `Active`
/// until the first terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentState {
    Active,
    Completed,
    Errored,
    Cancelled,
}

impl AttachmentState {
    /// Whether no further events will be forwarded
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttachmentState::Active)
    }

    /// Lowercase name, used for logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentState::Active => "active",
            AttachmentState::Completed => "completed",
            AttachmentState::Errored => "errored",
            AttachmentState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrap a stream transformation into a reusable [`Operator`].
///
/// The transformation is not invoked until the operator is attached, and it
/// is invoked once per attachment.
pub fn to_operator<T, R, F, S>(transform: F) -> Operator<T, R>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(BridgeStream<T>) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<R>> + Send + 'static,
{
    Operator::new(transform)
}

/// A reusable stream-pipeline stage built from a transformation function.
///
/// Operators are immutable; cloning one shares the transformation.
pub struct Operator<T, R> {
    transform: Arc<Transform<T, R>>,
    name: Arc<str>,
}

impl<T, R> Clone for Operator<T, R> {
    fn clone(&self) -> Self {
        Self {
            transform: self.transform.clone(),
            name: self.name.clone(),
        }
    }
}

impl<T, R> fmt::Debug for Operator<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T, R> Operator<T, R>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
{
    /// Create an operator from a transformation function
    pub fn new<F, S>(transform: F) -> Self
    where
        F: Fn(BridgeStream<T>) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<R>> + Send + 'static,
    {
        Self {
            transform: Arc::new(move |input| transform(input).boxed()),
            name: Arc::from("operator"),
        }
    }

    /// Label this operator in logs and metrics
    pub fn named<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Arc::from(name.into());
        self
    }

    /// The operator's label
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire this operator in front of `downstream` without scheduling anything.
    ///
    /// Returns the sink the upstream source pushes into, and the [`Delivery`]
    /// future that moves the transformation's output into `downstream`. The
    /// caller decides where the delivery runs; until it is polled nothing
    /// reaches the downstream sink, though pushes are already queued on the
    /// bridge in order.
    pub fn bind<D>(&self, downstream: Subscriber<D>) -> (UpstreamSink<T>, Delivery)
    where
        D: Sink<Item = R> + Send + 'static,
    {
        let bridge = Bridge::new();
        let outcome = Arc::new(OnceLock::new());
        // Subscribe before handing the upstream sink out, so nothing emitted
        // can be missed.
        let input = bridge.subscribe();
        let upstream = UpstreamSink {
            bridge,
            token: downstream.register(),
            outcome: outcome.clone(),
            state: AttachmentState::Active,
            name: self.name.clone(),
        };

        let output = (self.transform)(input);
        let delivery = deliver(output, downstream, outcome, self.name.clone()).boxed();

        debug_event!(operator = %self.name, "attachment created");
        #[cfg(feature = "metrics")]
        crate::metrics::record_attachment(&self.name);

        (upstream, Delivery { inner: delivery })
    }

    /// Attach this operator in front of `downstream`.
    ///
    /// The delivery of the transformation's output runs as a task on the
    /// current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn attach<D>(&self, downstream: Subscriber<D>) -> UpstreamSink<T>
    where
        D: Sink<Item = R> + Send + 'static,
    {
        let (upstream, delivery) = self.bind(downstream);
        tokio::spawn(delivery);
        upstream
    }
}

#[cfg_attr(
    not(any(feature = "tracing", feature = "metrics")),
    allow(unused_variables)
)]
async fn deliver<R, D>(
    mut output: BoxStream<'static, Result<R>>,
    mut downstream: Subscriber<D>,
    outcome: Arc<OnceLock<AttachmentState>>,
    name: Arc<str>,
) -> AttachmentState
where
    D: Sink<Item = R>,
{
    let token = downstream.token().clone();
    let state = loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break AttachmentState::Cancelled,
            next = output.next() => match next {
                Some(Ok(item)) => {
                    #[cfg(feature = "metrics")]
                    crate::metrics::record_forwarded(&name);
                    downstream.on_next(item);
                }
                Some(Err(error)) => {
                    debug_event!(operator = %name, %error, "attachment errored");
                    // Upstream learns of the end before downstream does.
                    let _ = outcome.set(AttachmentState::Errored);
                    downstream.on_error(error);
                    break AttachmentState::Errored;
                }
                None => {
                    let _ = outcome.set(AttachmentState::Completed);
                    downstream.on_complete();
                    break AttachmentState::Completed;
                }
            },
        }
    };
    let _ = outcome.set(state);

    debug_event!(operator = %name, state = %state, "attachment terminated");
    #[cfg(feature = "metrics")]
    crate::metrics::record_outcome(&name, state);
    state
}

/// Drives an attachment's output into its downstream subscriber.
///
/// Resolves to the terminal state of the attachment once the output errors,
/// completes, or the downstream subscriber is cancelled. Dropping the
/// delivery abandons the output stream without signalling downstream.
#[must_use = "a delivery does nothing unless polled or spawned"]
pub struct Delivery {
    inner: BoxFuture<'static, AttachmentState>,
}

impl Future for Delivery {
    type Output = AttachmentState;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

/// The sink an upstream source pushes into.
///
/// Forwards every signal verbatim onto the attachment's bridge. Once
/// [`state`](UpstreamSink::state) reports a terminal state, every further
/// signal is ignored. The attachment ends when upstream completes or errors,
/// when the transformation's output completes or errors, or when downstream
/// cancels.
///
/// A signal racing with a cancellation from another thread may still reach
/// the bridge; the delivery checks cancellation first and never forwards it.
///
/// Dropping the sink without a terminal signal ends the transformation's
/// input as if upstream had completed.
pub struct UpstreamSink<T> {
    bridge: Bridge<T>,
    token: CancellationToken,
    outcome: Arc<OnceLock<AttachmentState>>,
    state: AttachmentState,
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    name: Arc<str>,
}

impl<T> UpstreamSink<T> {
    /// Current state of the attachment as seen from upstream
    pub fn state(&self) -> AttachmentState {
        if self.state.is_terminal() {
            self.state
        } else if let Some(state) = self.outcome.get() {
            *state
        } else if self.token.is_cancelled() {
            AttachmentState::Cancelled
        } else {
            AttachmentState::Active
        }
    }

    /// Whether upstream should stop pushing into this attachment
    pub fn is_unsubscribed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Checks for an open attachment, latching cancellation into the state
    fn accepts(&mut self) -> bool {
        self.state = self.state();
        if self.state.is_terminal() {
            trace_event!(operator = %self.name, state = %self.state, "ignoring signal");
            return false;
        }
        true
    }
}

impl<T: Clone + Send + 'static> Sink for UpstreamSink<T> {
    type Item = T;

    fn on_next(&mut self, item: Self::Item) {
        if self.accepts() {
            self.bridge.emit(item);
        }
    }

    fn on_error(&mut self, error: Error) {
        if self.accepts() {
            self.state = AttachmentState::Errored;
            self.bridge.error(error);
        }
    }

    fn on_complete(&mut self) {
        if self.accepts() {
            self.state = AttachmentState::Completed;
            self.bridge.complete();
        }
    }
}
