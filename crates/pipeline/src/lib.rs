//! Sysrelay - Pipeline
//!
//! The dispatcher that connects listeners to the sink.
//!
//! ```text
//! [UDP/TCP listeners] --Received--+
//!                                 +--> mpsc --> [Dispatcher] --send--> [Sink]
//! [Sink] --DestinationReady-------+               |
//!                                           RoutingTable (gate)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (tx, rx) = mpsc::channel(10_000);
//! let dispatcher = Dispatcher::new(routing_table, sink.clone());
//! let task = tokio::spawn(dispatcher.run(rx, cancel.clone()));
//! ```

mod dispatcher;
mod format;
mod metrics;

pub use dispatcher::{DEFAULT_DISCONNECT_REASON, Dispatcher};
pub use format::format_message;
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
