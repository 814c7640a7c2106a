//! Subscriber registry and per-tick fan-out.
//!
//! Every subscriber is a bounded `crossbeam_channel` queue. The hub keeps the sending
//! half; the receiving half goes to whoever serves the connection (see
//! `connection::PushEndpoint`). A broadcast encodes the snapshot once and pushes the same
//! `Arc<str>` payload into every queue with `try_send`, so a slow subscriber can never
//! stall the tick loop. A queue that is full or whose receiver is gone counts as a failed
//! send: that subscriber is pruned after the fan-out pass and its sender dropped. The hub
//! never touches the transport itself; the connection worker notices the closed queue and
//! tears the connection down.
//!
//! Each queue is FIFO and only the tick loop broadcasts, so every surviving subscriber
//! sees every tick in order.

use crate::registry::InstrumentSnapshot;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use feed_common::{FeedError, PriceUpdate, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Encoded message shared by all subscribers of one tick.
pub type Payload = Arc<str>;

/// Opaque identifier of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(u64);

impl fmt::Display for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// A registered subscriber: its handle plus the queue the hub writes into.
pub struct Subscription {
    /// Handle to pass to [`BroadcastHub::unsubscribe`].
    pub handle: SubscriberHandle,
    /// Payloads in tick order. Disconnects once the hub drops the subscriber.
    pub receiver: Receiver<Payload>,
}

/// Outcome of one [`BroadcastHub::broadcast`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Subscribers that received the payload.
    pub delivered: usize,
    /// Subscribers removed because their send failed.
    pub pruned: usize,
    /// Size of the encoded payload; zero when nothing was encoded.
    pub payload_len: usize,
}

/// Tracks connected subscribers and pushes snapshots to them.
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberHandle, Sender<Payload>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl BroadcastHub {
    /// Hub whose subscriber queues hold up to `capacity` undelivered payloads (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Result<Subscription> {
        let handle = SubscriberHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = bounded(self.capacity);
        let total = {
            let mut subscribers = self.subscribers.lock()?;
            subscribers.insert(handle, sender);
            subscribers.len()
        };
        info!("{} subscribed. Total subscribers: {}", handle, total);
        Ok(Subscription { handle, receiver })
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: SubscriberHandle) -> Result<bool> {
        let removed = self.subscribers.lock()?.remove(&handle).is_some();
        if removed {
            info!("{} unsubscribed", handle);
        }
        Ok(removed)
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> Result<usize> {
        Ok(self.subscribers.lock()?.len())
    }

    /// Encode `snapshot` once and push it to every subscriber.
    ///
    /// Does nothing, not even encoding, when there are no subscribers. A failed send is
    /// isolated to its subscriber, which is removed once all others have been served;
    /// only an encoding or lock failure is returned as an error.
    pub fn broadcast(
        &self,
        snapshot: &[InstrumentSnapshot],
        timestamp: DateTime<Utc>,
    ) -> Result<BroadcastStats> {
        let targets: Vec<(SubscriberHandle, Sender<Payload>)> = {
            let subscribers = self.subscribers.lock()?;
            subscribers.iter().map(|(handle, sender)| (*handle, sender.clone())).collect()
        };
        if targets.is_empty() {
            return Ok(BroadcastStats::default());
        }

        let views = snapshot.iter().map(InstrumentSnapshot::to_view).collect();
        let update = PriceUpdate::new(timestamp, views);
        let payload: Payload = Arc::from(update.to_json()?);

        let mut stats = BroadcastStats {
            payload_len: payload.len(),
            ..BroadcastStats::default()
        };
        let mut failed = Vec::new();
        for (handle, sender) in &targets {
            match deliver(sender, &payload) {
                Ok(()) => stats.delivered += 1,
                Err(e) => {
                    warn!("{}: {}", handle, e);
                    failed.push(*handle);
                }
            }
        }
        drop(targets);

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.lock()?;
            for handle in &failed {
                if subscribers.remove(handle).is_some() {
                    stats.pruned += 1;
                }
            }
            info!(
                "Pruned {} subscriber(s). Total subscribers: {}",
                stats.pruned,
                subscribers.len()
            );
        }
        debug!("Broadcast {} bytes to {} subscriber(s)", stats.payload_len, stats.delivered);
        Ok(stats)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::with_capacity(crate::config::DEFAULT_SUBSCRIBER_BUFFER)
    }
}

fn deliver(sender: &Sender<Payload>, payload: &Payload) -> Result<()> {
    sender.try_send(Arc::clone(payload)).map_err(|e| match e {
        TrySendError::Full(_) => FeedError::Send("queue full, subscriber too slow".to_string()),
        TrySendError::Disconnected(_) => FeedError::Send("subscriber disconnected".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_seeds;
    use crate::registry::PriceRegistry;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::thread;

    fn snapshot() -> Vec<InstrumentSnapshot> {
        PriceRegistry::initialize(&default_seeds()).unwrap().snapshot().unwrap()
    }

    #[test]
    fn test_broadcast_without_subscribers_encodes_nothing() {
        let hub = BroadcastHub::default();
        let stats = hub.broadcast(&snapshot(), Utc::now()).unwrap();
        assert_eq!(stats, BroadcastStats::default());
    }

    #[test]
    fn test_every_subscriber_gets_one_identical_copy() {
        let hub = BroadcastHub::default();
        let subs: Vec<Subscription> = (0..3).map(|_| hub.subscribe().unwrap()).collect();

        let stats = hub.broadcast(&snapshot(), Utc::now()).unwrap();
        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.pruned, 0);

        let payloads: Vec<Payload> = subs.iter().map(|s| s.receiver.try_recv().unwrap()).collect();
        assert!(payloads.iter().all(|p| Arc::ptr_eq(p, &payloads[0])));
        assert_eq!(stats.payload_len, payloads[0].len());
        assert!(subs.iter().all(|s| s.receiver.try_recv().is_err()));
    }

    #[test]
    fn test_failed_subscriber_is_pruned_others_served() {
        let hub = BroadcastHub::default();
        let mut subs: Vec<Subscription> = (0..4).map(|_| hub.subscribe().unwrap()).collect();
        let gone = subs.remove(1);
        drop(gone.receiver);

        let stats = hub.broadcast(&snapshot(), Utc::now()).unwrap();

        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.pruned, 1);
        assert_eq!(hub.subscriber_count().unwrap(), 3);
        for sub in &subs {
            assert!(sub.receiver.try_recv().is_ok());
            assert!(sub.receiver.try_recv().is_err());
        }
        assert!(!hub.unsubscribe(gone.handle).unwrap());
    }

    #[test]
    fn test_slow_subscriber_is_dropped_after_backlog() {
        let hub = BroadcastHub::with_capacity(2);
        let slow = hub.subscribe().unwrap();
        let fast = hub.subscribe().unwrap();
        let snap = snapshot();

        for _ in 0..3 {
            hub.broadcast(&snap, Utc::now()).unwrap();
            fast.receiver.recv().unwrap();
        }

        assert_eq!(hub.subscriber_count().unwrap(), 1);
        // The backlog is still readable, then the queue reports disconnection.
        assert!(slow.receiver.recv().is_ok());
        assert!(slow.receiver.recv().is_ok());
        assert!(slow.receiver.recv().is_err());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let hub = BroadcastHub::default();
        let a = hub.subscribe().unwrap();
        let _b = hub.subscribe().unwrap();

        assert!(hub.unsubscribe(a.handle).unwrap());
        assert!(!hub.unsubscribe(a.handle).unwrap());
        assert_eq!(hub.subscriber_count().unwrap(), 1);
        assert!(a.receiver.recv().is_err());
    }

    #[test]
    fn test_payload_carries_derived_changes() {
        let registry = PriceRegistry::initialize(&default_seeds()).unwrap();
        registry.apply_price("AAPL", dec!(191.75)).unwrap();
        let hub = BroadcastHub::default();
        let sub = hub.subscribe().unwrap();

        hub.broadcast(&registry.snapshot().unwrap(), Utc::now()).unwrap();
        let update = PriceUpdate::from_json(&sub.receiver.recv().unwrap()).unwrap();

        assert!(update.is_price_update());
        assert_eq!(update.data.len(), 5);
        let aapl = &update.data[0];
        assert_eq!(aapl.symbol, "AAPL");
        assert_eq!(aapl.price, dec!(191.75));
        assert_eq!(aapl.abs_change, dec!(4.75));
        assert_eq!(aapl.pct_change.round_dp(2), dec!(2.54));
        assert_eq!(aapl.sequence_id, 6);
        assert_eq!(update.data[1].abs_change, Decimal::ZERO);
    }

    #[test]
    fn test_zero_previous_close_reports_zero_pct_change() {
        let instrument = InstrumentSnapshot {
            symbol: "TEST".to_string(),
            name: "Test".to_string(),
            price: dec!(5.00),
            previous_close: Decimal::ZERO,
            currency: "USD".to_string(),
            updated_at: Utc::now(),
            revision: 1,
        };
        let hub = BroadcastHub::default();
        let sub = hub.subscribe().unwrap();

        hub.broadcast(&[instrument], Utc::now()).unwrap();
        let text = sub.receiver.recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["data"][0]["pct_change"].as_f64(), Some(0.0));
        assert_eq!(value["data"][0]["abs_change"].as_f64(), Some(5.0));
    }

    #[test]
    fn test_subscribe_concurrently_with_broadcast() {
        let hub = Arc::new(BroadcastHub::with_capacity(1000));
        let snap = snapshot();

        let churn = {
            let hub = Arc::clone(&hub);
            thread::spawn(move || {
                for _ in 0..200 {
                    let sub = hub.subscribe().unwrap();
                    hub.unsubscribe(sub.handle).unwrap();
                    hub.unsubscribe(sub.handle).unwrap();
                }
            })
        };
        let steady = hub.subscribe().unwrap();
        for _ in 0..100 {
            hub.broadcast(&snap, Utc::now()).unwrap();
        }
        churn.join().unwrap();

        assert_eq!(steady.receiver.len(), 100);
        assert_eq!(hub.subscriber_count().unwrap(), 1);
    }
}
