//! Simulated real-time stock price feed.
//!
//! The server keeps prices for a fixed set of instruments, moves them on a fixed cadence
//! and pushes the full snapshot to every connected WebSocket client. It is built from:
//!
//! - `PriceRegistry`: the authoritative, mutex-guarded price store with a global revision
//!   counter.
//! - `PriceMutator`: applies a bounded random move to every instrument per tick.
//! - `BroadcastHub`: the set of subscribers; encodes each snapshot once and fans it out,
//!   pruning subscribers whose send fails.
//! - `TickLoop`: the single background driver: mutate, snapshot, broadcast, sleep.
//! - `PushEndpoint`: accepts WebSocket connections and bridges them to the hub.
//!
//! Concurrency:
//! - The tick loop runs on its own thread and is stopped through `TickLoopHandle::stop`,
//!   which joins it.
//! - Each connection has its own thread that only writes hub payloads and discards
//!   whatever the client sends.
//! - Registry and subscriber set are the only shared mutable state, each behind a `Mutex`.
#![warn(missing_docs)]

pub mod args;
pub mod config;
pub mod connection;
pub mod hub;
pub mod mutator;
pub mod registry;
pub mod tick_loop;

pub use config::{FeedConfig, InstrumentSeed};
pub use connection::PushEndpoint;
pub use hub::{BroadcastHub, BroadcastStats, SubscriberHandle, Subscription};
pub use mutator::PriceMutator;
pub use registry::{InstrumentSnapshot, PriceRegistry};
pub use tick_loop::{TickLoop, TickLoopHandle};
