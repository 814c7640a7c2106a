//! Stock price feed server.
//!
//! This binary wires the streaming core together and runs until Ctrl+C:
//!
//! - parse `Args` and validate them into a `FeedConfig`;
//! - seed the `PriceRegistry`;
//! - start the `TickLoop` thread that mutates prices and broadcasts snapshots through the
//!   `BroadcastHub`;
//! - bind the `PushEndpoint` and run its accept loop on a background thread;
//! - on Ctrl+C, stop the tick loop, wait for it, and exit. Open connections are closed by
//!   process exit.
//!
//! Only configuration and bind errors end the process early; everything that goes wrong
//! during a tick or on a single connection is logged and the feed keeps running.
#![warn(missing_docs)]
use clap::Parser;
use crossbeam_channel::bounded;
use feed_common::{FeedError, Result};
use feed_server::args::Args;
use feed_server::{BroadcastHub, FeedConfig, PriceMutator, PriceRegistry, PushEndpoint, TickLoop};
use log::{error, info};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

fn main() -> Result<(), FeedError> {
    init_logger();
    let args = Args::parse();
    let config = FeedConfig::from_args(&args)?;

    let registry = Arc::new(PriceRegistry::initialize(&config.seeds)?);
    info!("Registry seeded with {} instrument(s)", registry.len()?);
    let hub = Arc::new(BroadcastHub::with_capacity(config.subscriber_buffer));
    let mutator = PriceMutator::new(config.max_change_pct)?;

    let listener = TcpListener::bind(&config.bind_addr)?;
    let endpoint = PushEndpoint::new(listener, Arc::clone(&hub));
    info!("Listening on {}", endpoint.local_addr()?);

    let tick_loop =
        TickLoop::new(Arc::clone(&registry), mutator, Arc::clone(&hub)).spawn(config.interval)?;

    thread::Builder::new().name("feed-accept".to_string()).spawn(move || {
        if let Err(e) = endpoint.accept_loop() {
            error!("Accept loop failed: {}", e);
        }
    })?;

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .map_err(std::io::Error::other)?;

    info!("Feed is running. Press Ctrl+C to exit.");
    shutdown_rx
        .recv()
        .map_err(|e| FeedError::ChannelRecv(e.to_string()))?;

    info!("Ctrl+C received. Shutting down feed...");
    tick_loop.stop()?;
    info!("Feed stopped with {} subscriber(s) connected", hub.subscriber_count()?);
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
