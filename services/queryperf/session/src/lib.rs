//! Windowed query dispatch, exchange slots and the UDP/timer engine for queryperf.
//!
//! This crate keeps a fixed number of queries in flight against one server
//! for a fixed time. Every answered or timed-out query is replaced by a new
//! one from the same slot until the session timer fires; after that, the
//! in-flight queries are drained and the run ends.
//!
//! ## Features
//!
//! - **Closed-loop dispatch**: Window of W outstanding queries, refilled on completion
//! - **Per-query timeouts**: Each slot owns a timer tagged with its current message id
//! - **Event-driven engine**: Datagrams and timer expiries arrive on one channel
//! - **Graceful drain**: In-flight queries finish after the session timer fires
//!
//! ## Example
//!
//! ```rust,no_run
//! use qperf_session::Dispatcher;
//! use qperf_wire::QueryOptions;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut dispatcher = Dispatcher::from_data_file("queries.txt", true, QueryOptions::default())?;
//! dispatcher.set_server_address("127.0.0.1")?;
//! dispatcher.set_window(50)?;
//! dispatcher.set_test_duration(30)?;
//! dispatcher.set_query_timeout(Duration::from_secs(2))?;
//!
//! dispatcher.run().await?;
//!
//! let stats = dispatcher.stats();
//! println!("sent {} completed {}", stats.queries_sent, stats.queries_completed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatcher;
pub mod engine;
pub mod outstanding;
pub mod slot;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

// Re-export main types
pub use dispatcher::{
    DispatchError, DispatchStats, Dispatcher, DispatcherConfig, Phase, DEFAULT_DURATION,
    DEFAULT_PORT, DEFAULT_QUERY_TIMEOUT, DEFAULT_SERVER, DEFAULT_WINDOW, MAX_WINDOW,
};
pub use engine::{
    EngineError, EngineEvent, MessageManager, MessageSocket, MessageTimer, Protocol, TimerTag,
};
pub use outstanding::Outstanding;
pub use slot::ExchangeSlot;
pub use transport::{resolve, TokioTimer, UdpMessageManager, UdpMessageSocket, MAX_DATAGRAM_SIZE};
