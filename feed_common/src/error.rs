//! Error types shared between the feed server and the console client.
//!
//! The `FeedError` enum unifies startup configuration problems, registry lookups,
//! per-subscriber delivery failures and the usual I/O, serialization, channel and
//! lock failures, allowing crates to propagate a single error type.
use std::io;
use std::sync::PoisonError;

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type shared by server and client.
#[derive(Error, Debug)]
pub enum FeedError {
    /// I/O error originating from sockets, files or thread spawning.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid startup configuration or seed data (duplicate symbols, bad numbers, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal logic error where a symbol is not present in the price registry.
    #[error("Internal Logic Error: unknown instrument: {0}")]
    UnknownInstrument(String),

    /// The registry refused a price that is not strictly positive.
    #[error("Invalid price {price} for instrument {symbol}")]
    InvalidPrice {
        /// Symbol the price was meant for.
        symbol: String,
        /// The rejected price.
        price: Decimal,
    },

    /// Delivery to a single subscriber failed; the subscriber is pruned.
    #[error("Send to subscriber failed: {0}")]
    Send(String),

    /// A tick of the feed loop failed; the loop keeps running.
    #[error("Tick failed: {0}")]
    Tick(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// WebSocket handshake, framing or transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Crossbeam/channel receive failed (e.g., sender closed); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),

    /// A worker thread panicked before it could be joined.
    #[error("Worker thread panicked: {0}")]
    Thread(String),
}

impl<T> From<PoisonError<T>> for FeedError {
    fn from(err: PoisonError<T>) -> Self {
        FeedError::MutexLock(err.to_string())
    }
}
