//! The bridge channel: a push-driven, replay-less multicast conduit.
//!
//! A [`Bridge`] lets a transformation that expects a *stream* be driven by
//! discrete pushes. The publish side (`emit`, `error`, `complete`) never
//! blocks; every subscriber owns an unbounded queue and sees events from the
//! moment it subscribed, in emission order.
//!
//! Subscriptions only hold a weak reference to the channel. Once the last
//! [`Bridge`] handle is dropped, every subscriber's stream ends as if the
//! bridge had completed.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::core::{Error, Result};

/// How a bridge ended
#[derive(Debug, Clone)]
enum Terminal {
    Completed,
    Errored(Error),
}

struct Shared<T> {
    subscribers: Vec<mpsc::UnboundedSender<Result<T>>>,
    terminal: Option<Terminal>,
}

/// The publish side of a bridge channel.
///
/// Cloning a `Bridge` yields another handle to the same channel. The channel
/// stays open while at least one handle is alive.
pub struct Bridge<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for Bridge<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Default for Bridge<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Bridge<T> {
    /// Create a bridge with no subscribers
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                subscribers: Vec::new(),
                terminal: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to events emitted from now on.
    ///
    /// Subscribing after termination yields a stream that replays only the
    /// terminal signal.
    pub fn subscribe(&self) -> BridgeStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = self.lock();
        match &shared.terminal {
            None => shared.subscribers.push(tx),
            Some(Terminal::Errored(error)) => {
                let _ = tx.send(Err(error.clone()));
            }
            Some(Terminal::Completed) => {}
        }
        drop(shared);

        BridgeStream {
            inner: UnboundedReceiverStream::new(rx),
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Signal an error to every subscriber and close the bridge
    pub fn error(&self, error: Error) {
        let mut shared = self.lock();
        if shared.terminal.is_some() {
            return;
        }
        for tx in shared.subscribers.drain(..) {
            let _ = tx.send(Err(error.clone()));
        }
        shared.terminal = Some(Terminal::Errored(error));
    }

    /// Signal completion to every subscriber and close the bridge
    pub fn complete(&self) {
        let mut shared = self.lock();
        if shared.terminal.is_some() {
            return;
        }
        // Dropping the senders ends each subscriber's stream.
        shared.subscribers.clear();
        shared.terminal = Some(Terminal::Completed);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut shared = self.lock();
        shared.subscribers.retain(|tx| !tx.is_closed());
        shared.subscribers.len()
    }

    /// Whether `error` or `complete` has been called
    pub fn is_terminated(&self) -> bool {
        self.lock().terminal.is_some()
    }
}

impl<T: Clone> Bridge<T> {
    /// Push an item to every current subscriber.
    ///
    /// Items emitted while nobody is subscribed, or after termination, are
    /// discarded.
    pub fn emit(&self, item: T) {
        let mut shared = self.lock();
        if shared.terminal.is_some() {
            return;
        }
        shared.subscribers.retain(|tx| !tx.is_closed());
        if let Some((last, rest)) = shared.subscribers.split_last() {
            for tx in rest {
                let _ = tx.send(Ok(item.clone()));
            }
            let _ = last.send(Ok(item));
        }
    }
}

/// The subscribe side of a bridge channel.
///
/// Yields `Ok` for every emitted item, then either ends (completion) or yields
/// a single `Err` and ends.
pub struct BridgeStream<T> {
    inner: UnboundedReceiverStream<Result<T>>,
    shared: Weak<Mutex<Shared<T>>>,
}

impl<T> BridgeStream<T> {
    /// Take an independent subscription on the same bridge.
    ///
    /// The new stream sees events emitted after this call only. If every
    /// [`Bridge`] handle is already gone, the new stream is empty.
    pub fn resubscribe(&self) -> Self {
        match self.shared.upgrade() {
            Some(shared) => Bridge { shared }.subscribe(),
            None => {
                let (_, rx) = mpsc::unbounded_channel();
                BridgeStream {
                    inner: UnboundedReceiverStream::new(rx),
                    shared: Weak::new(),
                }
            }
        }
    }
}

impl<T> Stream for BridgeStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
