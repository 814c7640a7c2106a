//!
//! Common types and utilities shared by the price feed server and client.
//!
//! This crate aggregates:
//! - `error`: unified error type `FeedError` used across the workspace.
//! - `result`: handy `Result<T, FeedError>` alias.
//! - `message`: the JSON envelope pushed to subscribers on every tick.
//! - `net`: networking constants and small helpers.
#![warn(missing_docs)]
pub mod error;
pub mod message;
pub mod net;
pub mod result;

pub use error::FeedError;
pub use message::{InstrumentView, MESSAGE_TYPE, PriceUpdate};
pub use result::Result;
