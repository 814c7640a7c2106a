//! Wire message pushed to every subscriber once per tick.
//!
//! A `PriceUpdate` is the envelope `{type, timestamp, data}` where `data` holds one
//! `InstrumentView` per instrument, in registry order. Prices are encoded as JSON
//! numbers and timestamps as RFC 3339 UTC strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::result::Result;

/// Value of the envelope's `type` field.
pub const MESSAGE_TYPE: &str = "stock_price_update";

/// Full snapshot of the feed at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Message kind, always [`MESSAGE_TYPE`] for messages produced by the server.
    #[serde(rename = "type")]
    pub kind: String,
    /// Time the snapshot was broadcast.
    pub timestamp: DateTime<Utc>,
    /// One entry per instrument.
    pub data: Vec<InstrumentView>,
}

impl PriceUpdate {
    /// Build a `stock_price_update` envelope.
    pub fn new(timestamp: DateTime<Utc>, data: Vec<InstrumentView>) -> Self {
        Self {
            kind: MESSAGE_TYPE.to_string(),
            timestamp,
            data,
        }
    }

    /// Whether this envelope carries a price snapshot.
    pub fn is_price_update(&self) -> bool {
        self.kind == MESSAGE_TYPE
    }

    /// Encode the envelope as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode an envelope from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Per-instrument entry of a [`PriceUpdate`], including the derived change metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentView {
    /// Global revision id of the instrument's last price change.
    pub sequence_id: u64,
    /// Ticker symbol (e.g., `AAPL`).
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Current price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// `price - previous_close`.
    #[serde(with = "rust_decimal::serde::float")]
    pub abs_change: Decimal,
    /// `abs_change / previous_close * 100`, or zero when the previous close is zero.
    #[serde(with = "rust_decimal::serde::float")]
    pub pct_change: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Time of the last price change.
    pub updated_at: DateTime<Utc>,
}
