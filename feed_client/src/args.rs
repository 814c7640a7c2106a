//! Command-line arguments for the feed client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use feed_common::net::{FEED_PORT, prices_url};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// WebSocket URL of the price stream.
    #[arg(long, default_value_t = prices_url("127.0.0.1", FEED_PORT))]
    pub url: String,
}
