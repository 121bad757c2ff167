//! Sink implementations for the streamlift library.
//!
//! This module provides ready-made downstream sinks for operator
//! attachments: collecting, counting, printing and channel forwarding.

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::core::{Error, Result, Sink};

/// How a stream ended
#[derive(Debug, Clone)]
pub enum Termination {
    Completed,
    Errored(Error),
}

struct Collected<T> {
    items: Vec<T>,
    termination: Option<Termination>,
}

/// A sink that collects items and the terminal signal.
///
/// Clones share the same storage, so a clone kept by the caller observes what
/// the attached clone receives.
pub struct CollectSink<T> {
    state: Arc<watch::Sender<Collected<T>>>,
}

impl<T: Send + 'static + Clone> CollectSink<T> {
    /// Create a new collect sink
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Collected {
            items: Vec::new(),
            termination: None,
        });
        Self {
            state: Arc::new(tx),
        }
    }

    /// Get a copy of the collected items
    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    /// Get the terminal signal, if one was received
    pub fn termination(&self) -> Option<Termination> {
        self.state.borrow().termination.clone()
    }

    /// Wait until at least `count` items have been collected
    pub async fn wait_for_items(&self, count: usize) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|c| c.items.len() >= count).await;
    }

    /// Wait until the stream completed or errored
    pub async fn wait_for_termination(&self) -> Termination {
        let mut rx = self.state.subscribe();
        loop {
            let termination = rx.borrow_and_update().termination.clone();
            if let Some(termination) = termination {
                return termination;
            }
            // The sender lives in `self`, so this cannot observe a closed channel.
            if rx.changed().await.is_err() {
                return Termination::Errored(Error::custom("collect sink dropped"));
            }
        }
    }
}

impl<T: Send + 'static + Clone> Sink for CollectSink<T> {
    type Item = T;

    fn on_next(&mut self, item: Self::Item) {
        self.state.send_modify(|c| c.items.push(item));
    }

    fn on_error(&mut self, error: Error) {
        self.state
            .send_modify(|c| c.termination = Some(Termination::Errored(error)));
    }

    fn on_complete(&mut self) {
        self.state
            .send_modify(|c| c.termination = Some(Termination::Completed));
    }
}

impl<T: Send + 'static + Clone> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectSink<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

/// A sink that counts items
pub struct CountSink<T> {
    count: Arc<AtomicUsize>,
    _phantom: PhantomData<fn(T)>,
}

impl<T> CountSink<T> {
    /// Create a new count sink
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            _phantom: PhantomData,
        }
    }

    /// Get the current count
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

impl<T: Send + 'static> Sink for CountSink<T> {
    type Item = T;

    fn on_next(&mut self, _item: Self::Item) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn on_error(&mut self, _error: Error) {}

    fn on_complete(&mut self) {}
}

impl<T> Default for CountSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CountSink<T> {
    fn clone(&self) -> Self {
        Self {
            count: self.count.clone(),
            _phantom: PhantomData,
        }
    }
}

/// A sink that forwards events into an unbounded channel.
///
/// Errors travel as `Err` items; completion closes the channel.
pub struct ChannelSink<T> {
    sender: Option<mpsc::UnboundedSender<Result<T>>>,
}

impl<T> ChannelSink<T> {
    /// Create a new channel sink
    pub fn new(sender: mpsc::UnboundedSender<Result<T>>) -> Self {
        Self {
            sender: Some(sender),
        }
    }
}

impl<T: Send + 'static> Sink for ChannelSink<T> {
    type Item = T;

    fn on_next(&mut self, item: Self::Item) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Ok(item));
        }
    }

    fn on_error(&mut self, error: Error) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Err(error));
        }
    }

    fn on_complete(&mut self) {
        self.sender = None;
    }
}

/// A sink that prints items to stdout
pub struct PrintSink<T> {
    /// The prefix to print before each item
    prefix: Option<String>,
    _phantom: PhantomData<fn(T)>,
}

impl<T> PrintSink<T> {
    /// Create a new print sink
    pub fn new() -> Self {
        Self {
            prefix: None,
            _phantom: PhantomData,
        }
    }

    /// Create a new print sink with a prefix
    pub fn with_prefix(prefix: String) -> Self {
        Self {
            prefix: Some(prefix),
            _phantom: PhantomData,
        }
    }

    fn print(&self, line: &dyn Display) {
        match &self.prefix {
            Some(prefix) => println!("{}: {}", prefix, line),
            None => println!("{}", line),
        }
    }
}

impl<T: Send + 'static + Display> Sink for PrintSink<T> {
    type Item = T;

    fn on_next(&mut self, item: Self::Item) {
        self.print(&item);
    }

    fn on_error(&mut self, error: Error) {
        self.print(&format_args!("error: {}", error));
    }

    fn on_complete(&mut self) {
        self.print(&"completed");
    }
}

impl<T> Default for PrintSink<T> {
    fn default() -> Self {
        Self::new()
    }
}
