//! Command-line arguments for the price feed server.
//!
//! This module defines the CLI interface using `clap`; `config::FeedConfig` validates the
//! parsed values.
use crate::config::{DEFAULT_INTERVAL_SECS, DEFAULT_MAX_CHANGE_PCT, DEFAULT_SUBSCRIBER_BUFFER};
use clap::Parser;
use feed_common::net::{FEED_PORT, addr};
use std::path::PathBuf;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Address the WebSocket endpoint listens on.
    #[arg(long, default_value_t = addr("0.0.0.0", FEED_PORT))]
    pub bind: String,

    /// Seconds between two price ticks.
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS)]
    pub interval_secs: f64,

    /// Maximum relative price change per tick, as a fraction (0.005 = 0.5%).
    #[arg(long, default_value_t = DEFAULT_MAX_CHANGE_PCT)]
    pub max_change_pct: f64,

    /// Number of messages that may queue up for a slow subscriber before it is dropped.
    #[arg(long, default_value_t = DEFAULT_SUBSCRIBER_BUFFER)]
    pub subscriber_buffer: usize,

    /// Optional seed file with one `SYMBOL,Name,Price,Currency` entry per line.
    #[arg(long)]
    pub seeds: Option<PathBuf>,
}
