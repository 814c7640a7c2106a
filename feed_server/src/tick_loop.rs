//! The background driver of the feed.
//!
//! `TickLoop` runs on its own thread: mutate prices, snapshot the registry, hand the
//! snapshot to the hub, then wait for the next interval. The wait multiplexes a
//! `crossbeam_channel::tick` timer with a stop channel, so a stop request ends the loop at
//! the next suspension point and never in the middle of a tick. A failing tick is logged
//! and the loop carries on.

use crate::hub::{BroadcastHub, BroadcastStats};
use crate::mutator::PriceMutator;
use crate::registry::PriceRegistry;
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use feed_common::{FeedError, Result};
use log::{debug, error, info};
use rand::Rng;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Mutate-then-broadcast driver.
pub struct TickLoop<R> {
    registry: Arc<PriceRegistry>,
    mutator: PriceMutator<R>,
    hub: Arc<BroadcastHub>,
}

impl<R: Rng + Send + 'static> TickLoop<R> {
    /// Wire a loop over shared registry and hub.
    pub fn new(
        registry: Arc<PriceRegistry>,
        mutator: PriceMutator<R>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self { registry, mutator, hub }
    }

    /// One tick: move prices, then broadcast the resulting snapshot.
    pub fn run_tick(&mut self) -> Result<BroadcastStats> {
        self.mutator.tick(&self.registry)?;
        let snapshot = self.registry.snapshot()?;
        self.hub.broadcast(&snapshot, Utc::now())
    }

    /// Tick every `interval` until a message arrives on (or the sender side of) `stop_rx`.
    ///
    /// The first tick happens immediately.
    pub fn run(&mut self, interval: Duration, stop_rx: Receiver<()>) {
        info!("Tick loop started (interval {:?}, thread {:?})", interval, thread::current().id());
        let ticker = tick(interval);
        let mut ticks: u64 = 0;

        loop {
            ticks += 1;
            match self.run_tick() {
                Ok(stats) => debug!("Tick {}: {:?}", ticks, stats),
                Err(e) => error!("{}", FeedError::Tick(format!("tick {}: {}", ticks, e))),
            }

            select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {},
            }
        }
        info!("Tick loop stopped after {} tick(s)", ticks);
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn(mut self, interval: Duration) -> Result<TickLoopHandle> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let join = thread::Builder::new()
            .name("tick-loop".to_string())
            .spawn(move || self.run(interval, stop_rx))?;
        Ok(TickLoopHandle { stop_tx, join })
    }
}

/// Owner of a running tick loop thread.
pub struct TickLoopHandle {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

impl TickLoopHandle {
    /// Signal the loop to stop and wait for its thread to exit.
    pub fn stop(self) -> Result<()> {
        // A full or closed channel means the loop is already stopping.
        let _ = self.stop_tx.try_send(());
        self.join
            .join()
            .map_err(|_| FeedError::Thread("tick loop panicked".to_string()))
    }

    /// Whether the loop thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
