//! Synthetic price movement.
//!
//! On each tick `PriceMutator` moves every instrument by a uniformly drawn relative change
//! in `[-max_change_pct, +max_change_pct]`, rounds the result to cents (round half to
//! even) and writes it back through the registry. A move that would leave the price at or
//! below zero is skipped for that tick.
//!
//! The random source is a type parameter so tests can drive it from a seeded `StdRng`.

use crate::config::validate_max_change;
use crate::registry::PriceRegistry;
use feed_common::{FeedError, Result};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits kept on every price.
pub const PRICE_SCALE: u32 = 2;

/// Applies bounded random moves to all instruments of a registry.
pub struct PriceMutator<R = StdRng> {
    max_change_pct: f64,
    rng: R,
}

impl PriceMutator<StdRng> {
    /// Mutator seeded from the operating system.
    pub fn new(max_change_pct: f64) -> Result<Self> {
        Self::with_rng(max_change_pct, StdRng::from_os_rng())
    }

    /// Mutator with a fixed seed, for reproducible runs.
    pub fn seeded(max_change_pct: f64, seed: u64) -> Result<Self> {
        Self::with_rng(max_change_pct, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> PriceMutator<R> {
    /// Mutator drawing from `rng`. `max_change_pct` must be a fraction in `[0, 1)`.
    pub fn with_rng(max_change_pct: f64, rng: R) -> Result<Self> {
        validate_max_change(max_change_pct)?;
        Ok(Self { max_change_pct, rng })
    }

    /// Move every instrument once. Returns how many prices were written.
    pub fn tick(&mut self, registry: &PriceRegistry) -> Result<usize> {
        let mut applied = 0;
        for instrument in registry.snapshot()? {
            let delta = self.draw_delta()?;
            let Some(new_price) = next_price(instrument.price, delta) else {
                debug!(
                    "{}: move of {} skipped, price would leave the valid range",
                    instrument.symbol, delta
                );
                continue;
            };
            registry.apply_price(&instrument.symbol, new_price)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn draw_delta(&mut self) -> Result<Decimal> {
        let delta: f64 = self
            .rng
            .random_range(-self.max_change_pct..=self.max_change_pct);
        Decimal::from_f64(delta)
            .ok_or_else(|| FeedError::Tick(format!("price delta {} is not representable", delta)))
    }
}

/// `price * (1 + delta)` rounded half-to-even to cents.
///
/// `None` if the result is not positive or does not fit in a `Decimal`.
pub fn next_price(price: Decimal, delta: Decimal) -> Option<Decimal> {
    let moved = price
        .checked_mul(Decimal::ONE.checked_add(delta)?)?
        .round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointNearestEven);
    (moved > Decimal::ZERO).then_some(moved)
}
