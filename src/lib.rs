//! # Reusable stream operators from stream transformations
//!
//! This crate turns a *stream transformation* (a function from one stream to
//! another) into an [`Operator`](operator::Operator): a reusable stage that can
//! be attached in front of any downstream sink, as many times as needed,
//! without wiring the transformation into each subscription by hand.
//!
//! ## Core Concepts
//!
//! - **Sink**: Push-style consumer with `on_next`, `on_error` and `on_complete`
//! - **Subscriber**: A downstream sink plus the token that cancels it
//! - **Bridge**: Per-attachment multicast channel feeding the transformation
//! - **Operator**: Given a downstream subscriber, returns the upstream sink
//! - **Lift**: Attaching an operator after an ordinary `Stream`
//!
//! ## Example
//!
//! ```rust
//! use futures::{stream, TryStreamExt};
//! use streamlift::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let double = to_operator(|input: BridgeStream<i64>| input.map_ok(|x| x * 2));
//!
//!     let doubled: Vec<i64> = stream::iter((1..=3).map(Ok))
//!         .lift(&double)
//!         .try_collect()
//!         .await?;
//!     assert_eq!(doubled, vec![2, 4, 6]);
//!     Ok(())
//! }
//! ```

mod tracing_support;

pub mod bridge;
pub mod core;
pub mod operator;
pub mod pipeline;
pub mod sinks;
pub mod subscriber;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bridge::{Bridge, BridgeStream};
    pub use crate::core::{sink_from_fn, Error, Notification, Result, Sink};
    pub use crate::operator::{to_operator, AttachmentState, Delivery, Operator, UpstreamSink};
    pub use crate::pipeline::{LiftExt, Lifted};
    pub use crate::sinks::{ChannelSink, CollectSink, CountSink, PrintSink, Termination};
    pub use crate::subscriber::Subscriber;
}

// Re-export main items
pub use crate::core::{Error, Result};
pub use crate::operator::{to_operator, Operator};

#[cfg(feature = "metrics")]
mod metrics;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
