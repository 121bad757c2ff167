//! Attaching operators to ordinary streams.
//!
//! [`LiftExt::lift`] places an [`Operator`] after any stream of
//! `Result<T>`: the source is fed into the operator's upstream sink, and the
//! returned [`Lifted`] stream yields what reaches the downstream side.
//! Lifts chain, so several operators compose into one pipeline.
//!
//! ```rust
//! use futures::{stream, TryStreamExt};
//! use streamlift::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let double = to_operator(|input: BridgeStream<i64>| input.map_ok(|x| x * 2));
//!     let evens = to_operator(|input: BridgeStream<i64>| {
//!         input.try_filter(|x| futures::future::ready(x % 4 == 0))
//!     });
//!
//!     let out: Vec<i64> = stream::iter((1..=4).map(Ok))
//!         .lift(&double)
//!         .lift(&evens)
//!         .try_collect()
//!         .await?;
//!     assert_eq!(out, vec![4, 8]);
//!     Ok(())
//! }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::StreamExt;
use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::core::{Result, Sink};
use crate::operator::{Operator, UpstreamSink};
use crate::sinks::ChannelSink;
use crate::subscriber::Subscriber;
use crate::tracing_support::debug_event;

/// Extension trait for attaching operators to streams
pub trait LiftExt<T>: Stream<Item = Result<T>> + Sized {
    /// Run this stream through `operator`.
    ///
    /// The attachment runs as a task on the current Tokio runtime. Dropping
    /// the returned stream cancels the attachment and stops pulling `self`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    fn lift<R>(self, operator: &Operator<T, R>) -> Lifted<R>
    where
        Self: Send + 'static,
        T: Clone + Send + 'static,
        R: Send + 'static;
}

impl<S, T> LiftExt<T> for S
where
    S: Stream<Item = Result<T>>,
{
    fn lift<R>(self, operator: &Operator<T, R>) -> Lifted<R>
    where
        Self: Send + 'static,
        T: Clone + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let downstream = Subscriber::new(ChannelSink::new(tx));
        let token = downstream.token().clone();
        let (upstream, delivery) = operator.bind(downstream);

        let feed_token = token.clone();
        let done_token = token.clone();
        #[cfg(feature = "tracing")]
        let name = operator.name().to_owned();
        tokio::spawn(async move {
            let delivered = async move {
                let state = delivery.await;
                // Downstream is finished; stop pulling the source.
                done_token.cancel();
                state
            };
            let (_, _state) =
                futures::future::join(feed(self, upstream, feed_token), delivered).await;
            debug_event!(operator = %name, state = %_state, "lifted stream finished");
        });

        Lifted {
            inner: UnboundedReceiverStream::new(rx),
            _guard: token.drop_guard(),
        }
    }
}

async fn feed<S, T>(source: S, mut upstream: UpstreamSink<T>, token: CancellationToken)
where
    S: Stream<Item = Result<T>>,
    T: Clone + Send + 'static,
{
    tokio::pin!(source);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = source.next() => match next {
                Some(Ok(item)) => upstream.on_next(item),
                Some(Err(error)) => {
                    upstream.on_error(error);
                    break;
                }
                None => {
                    upstream.on_complete();
                    break;
                }
            },
        }
        // Let the delivery side run between pulls.
        tokio::task::yield_now().await;
    }
}

/// The output of [`LiftExt::lift`].
///
/// Yields `Ok` items, then ends on completion or after a single `Err`.
pub struct Lifted<R> {
    inner: UnboundedReceiverStream<Result<R>>,
    _guard: DropGuard,
}

impl<R> Stream for Lifted<R> {
    type Item = Result<R>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
