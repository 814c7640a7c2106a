//! Authoritative in-memory store of the current instrument prices.
//!
//! The registry holds one `InstrumentSnapshot` per instrument, in seed order, plus a
//! global revision counter shared by all instruments. All state lives behind a single
//! `Mutex`, so an `apply_price` call updates the instrument's price, timestamp and
//! revision together with the counter as one unit, and `snapshot` copies everything out
//! under the same lock. Readers therefore never see a half-updated instrument.
//!
//! The symbol set is fixed at construction; there is no way to add or remove an
//! instrument afterwards.

use crate::config::{InstrumentSeed, MAX_SEED_PRICE};
use chrono::{DateTime, Utc};
use feed_common::{FeedError, InstrumentView, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

/// Point-in-time copy of one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSnapshot {
    /// Unique ticker symbol.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Current price, two fractional digits.
    pub price: Decimal,
    /// Reference price fixed at initialization.
    pub previous_close: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Time of the last price change.
    pub updated_at: DateTime<Utc>,
    /// Global revision id assigned at the last price change.
    pub revision: u64,
}

impl InstrumentSnapshot {
    /// `price - previous_close`.
    pub fn abs_change(&self) -> Decimal {
        self.price - self.previous_close
    }

    /// Percentage change against the previous close; zero when the previous close is zero.
    ///
    /// A change too large to represent saturates at `Decimal::MAX` or `Decimal::MIN`.
    pub fn pct_change(&self) -> Decimal {
        if self.previous_close.is_zero() {
            return Decimal::ZERO;
        }
        let abs_change = self.abs_change();
        abs_change
            .checked_div(self.previous_close)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(if abs_change.is_sign_negative() { Decimal::MIN } else { Decimal::MAX })
    }

    /// Wire representation with the derived change metrics filled in.
    pub fn to_view(&self) -> InstrumentView {
        InstrumentView {
            sequence_id: self.revision,
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            price: self.price,
            abs_change: self.abs_change(),
            pct_change: self.pct_change(),
            currency: self.currency.clone(),
            updated_at: self.updated_at,
        }
    }
}

struct RegistryState {
    instruments: Vec<InstrumentSnapshot>,
    index: HashMap<String, usize>,
    revision: u64,
}

/// Thread-safe registry of instrument prices.
pub struct PriceRegistry {
    state: Mutex<RegistryState>,
}

impl PriceRegistry {
    /// Build the registry from `seeds`, in order.
    ///
    /// Every instrument starts with `previous_close == price`, the current time as its
    /// timestamp, and a revision assigned sequentially from 1. Duplicate symbols, empty
    /// symbols and seed prices outside `(0, MAX_SEED_PRICE]` are rejected with
    /// `FeedError::Config`.
    pub fn initialize(seeds: &[InstrumentSeed]) -> Result<Self> {
        let now = Utc::now();
        let mut instruments = Vec::with_capacity(seeds.len());
        let mut index = HashMap::with_capacity(seeds.len());
        let mut revision = 0;

        for seed in seeds {
            if seed.symbol.is_empty() {
                return Err(FeedError::Config("instrument symbol must not be empty".to_string()));
            }
            if seed.price <= Decimal::ZERO {
                return Err(FeedError::Config(format!(
                    "seed price for {} must be positive, got {}",
                    seed.symbol, seed.price
                )));
            }
            if seed.price > MAX_SEED_PRICE {
                return Err(FeedError::Config(format!(
                    "seed price for {} must not exceed {}, got {}",
                    seed.symbol, MAX_SEED_PRICE, seed.price
                )));
            }
            if index.insert(seed.symbol.clone(), instruments.len()).is_some() {
                return Err(FeedError::Config(format!(
                    "duplicate instrument symbol: {}",
                    seed.symbol
                )));
            }

            revision += 1;
            instruments.push(InstrumentSnapshot {
                symbol: seed.symbol.clone(),
                name: seed.name.clone(),
                price: seed.price,
                previous_close: seed.price,
                currency: seed.currency.clone(),
                updated_at: now,
                revision,
            });
        }

        Ok(Self {
            state: Mutex::new(RegistryState {
                instruments,
                index,
                revision,
            }),
        })
    }

    /// Consistent copy of all instruments, in insertion order.
    pub fn snapshot(&self) -> Result<Vec<InstrumentSnapshot>> {
        let state = self.state.lock()?;
        Ok(state.instruments.clone())
    }

    /// Set the price of `symbol` and stamp it with the next global revision.
    ///
    /// Returns the new revision. Fails with `FeedError::UnknownInstrument` if the symbol
    /// is not registered, and with `FeedError::InvalidPrice` if `new_price` is not
    /// strictly positive; in both cases nothing changes.
    pub fn apply_price(&self, symbol: &str, new_price: Decimal) -> Result<u64> {
        let mut state = self.state.lock()?;
        let position = *state
            .index
            .get(symbol)
            .ok_or_else(|| FeedError::UnknownInstrument(symbol.to_string()))?;
        if new_price <= Decimal::ZERO {
            return Err(FeedError::InvalidPrice {
                symbol: symbol.to_string(),
                price: new_price,
            });
        }

        state.revision += 1;
        let revision = state.revision;
        let instrument = &mut state.instruments[position];
        instrument.price = new_price;
        instrument.updated_at = Utc::now();
        instrument.revision = revision;
        Ok(revision)
    }

    /// Latest revision handed out.
    pub fn revision(&self) -> Result<u64> {
        Ok(self.state.lock()?.revision)
    }

    /// Number of instruments.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.lock()?.instruments.len())
    }

    /// Whether the registry tracks no instruments at all.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    #[cfg(test)]
    pub(crate) fn poison_lock(&self) {
        let _guard = self.state.lock();
        panic!("poisoning registry lock");
    }
}
