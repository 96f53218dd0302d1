//! Status feed client for music relay servers.
//!
//! A `Feed` runs one transport (HTTP polling or a WebSocket stream), folds each
//! payload into a `MetricsSnapshot`, tracks the `ConnectionState` and tells
//! subscribers about every change.

pub mod config;
pub mod error;
pub mod feed;
mod hub;
pub mod normalize;
pub mod transport;
pub mod types;

pub use config::{FeedConfig, FeedMode};
pub use error::{ConfigError, FailureReason, FeedError, ReconnectExhausted};
pub use feed::{Feed, PollPolicy, StreamPolicy};
pub use hub::{Listener, SubscriptionId};
pub use normalize::Normalizer;
pub use types::{ConnectionState, MetricsSnapshot, PingGrade};
