//! Validated server configuration and instrument seed parsing.
//!
//! `FeedConfig` is built from the command-line `Args`; every field is checked up front
//! so that configuration problems surface as `FeedError::Config` at startup rather than
//! in the middle of the tick loop.

use crate::args::Args;
use feed_common::net::{FEED_PORT, addr};
use feed_common::{FeedError, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::Duration;

/// Default tick interval.
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;
/// Default bound on the per-tick relative price change (0.5%).
pub const DEFAULT_MAX_CHANGE_PCT: f64 = 0.005;
/// Default depth of each subscriber's outbound queue.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;
/// Largest accepted seed price.
pub const MAX_SEED_PRICE: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0); // 1_000_000_000_000

/// Initial data for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSeed {
    /// Unique ticker symbol.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Seed price, also used as the previous close.
    pub price: Decimal,
    /// ISO currency code.
    pub currency: String,
}

impl InstrumentSeed {
    /// Create a seed entry.
    pub fn new(symbol: &str, name: &str, price: Decimal, currency: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price,
            currency: currency.to_string(),
        }
    }
}

/// The built-in instrument set.
pub fn default_seeds() -> Vec<InstrumentSeed> {
    vec![
        InstrumentSeed::new("AAPL", "Apple", Decimal::new(18700, 2), "USD"),
        InstrumentSeed::new("GOOG", "Google", Decimal::new(13400, 2), "USD"),
        InstrumentSeed::new("MSFT", "Microsoft", Decimal::new(41200, 2), "USD"),
        InstrumentSeed::new("AMZN", "Amazon", Decimal::new(9800, 2), "USD"),
        InstrumentSeed::new("TSLA", "Tesla", Decimal::new(25600, 2), "USD"),
    ]
}

/// Trait providing file parsing for instrument seeds.
pub trait SeedParser {
    /// Parses seeds from a buffered reader.
    ///
    /// Each non-empty line that does not start with `#` must look like
    /// `SYMBOL,Name,Price,Currency`. Symbols and currencies are upper-cased.
    /// Returns an error naming the first line that cannot be parsed.
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Vec<InstrumentSeed>>;
}

impl SeedParser for InstrumentSeed {
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Vec<Self>> {
        let mut seeds = Vec::new();

        for (number, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed_line.split(',').map(str::trim).collect();
            let [symbol, name, price, currency] = fields.as_slice() else {
                return Err(FeedError::Config(format!(
                    "line {}: expected SYMBOL,Name,Price,Currency, got {:?}",
                    number + 1,
                    trimmed_line
                )));
            };
            let price: Decimal = price.parse().map_err(|e| {
                FeedError::Config(format!("line {}: invalid price {:?}: {}", number + 1, price, e))
            })?;

            seeds.push(InstrumentSeed::new(
                &symbol.to_ascii_uppercase(),
                name,
                price,
                &currency.to_ascii_uppercase(),
            ));
        }
        Ok(seeds)
    }
}

/// Validated runtime configuration of the feed server.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Address the push endpoint binds to.
    pub bind_addr: String,
    /// Time between ticks.
    pub interval: Duration,
    /// Bound on the per-tick relative price change, as a fraction.
    pub max_change_pct: f64,
    /// Outbound queue depth per subscriber.
    pub subscriber_buffer: usize,
    /// Instruments to track.
    pub seeds: Vec<InstrumentSeed>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            bind_addr: addr("0.0.0.0", FEED_PORT),
            interval: Duration::from_secs_f64(DEFAULT_INTERVAL_SECS),
            max_change_pct: DEFAULT_MAX_CHANGE_PCT,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            seeds: default_seeds(),
        }
    }
}

impl FeedConfig {
    /// Build and validate a configuration from parsed command-line arguments.
    pub fn from_args(args: &Args) -> Result<Self> {
        let seeds = match &args.seeds {
            Some(path) => {
                let file = File::open(path).map_err(|e| {
                    FeedError::Config(format!("cannot open seed file {}: {}", path.display(), e))
                })?;
                InstrumentSeed::parse_from_reader(BufReader::new(file))?
            }
            None => default_seeds(),
        };

        let config = Self {
            bind_addr: args.bind.clone(),
            interval: interval_from_secs(args.interval_secs)?,
            max_change_pct: args.max_change_pct,
            subscriber_buffer: args.subscriber_buffer,
            seeds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the numeric bounds of every field.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(FeedError::Config("tick interval must be positive".to_string()));
        }
        validate_max_change(self.max_change_pct)?;
        if self.subscriber_buffer == 0 {
            return Err(FeedError::Config(
                "subscriber buffer must hold at least one message".to_string(),
            ));
        }
        Ok(())
    }
}

/// Accepts finite fractions in `[0, 1)`.
pub fn validate_max_change(max_change_pct: f64) -> Result<()> {
    if !max_change_pct.is_finite() || !(0.0..1.0).contains(&max_change_pct) {
        return Err(FeedError::Config(format!(
            "max change must be a fraction in [0, 1), got {}",
            max_change_pct
        )));
    }
    Ok(())
}

fn interval_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| FeedError::Config(format!("invalid tick interval {}: {}", secs, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    #[test]
    fn test_parse_seed_lines() {
        let input = "# symbol,name,price,currency\n\nnvda, NVIDIA, 880.10, usd\nIBM,IBM,170,USD\n";
        let seeds = InstrumentSeed::parse_from_reader(Cursor::new(input)).unwrap();

        assert_eq!(
            seeds,
            vec![
                InstrumentSeed::new("NVDA", "NVIDIA", dec!(880.10), "USD"),
                InstrumentSeed::new("IBM", "IBM", dec!(170), "USD"),
            ]
        );
    }

    #[test]
    fn test_parse_seed_reports_line_number() {
        let input = "AAPL,Apple,187.00,USD\nMSFT,Microsoft\n";
        let err = InstrumentSeed::parse_from_reader(Cursor::new(input)).err().unwrap();
        assert!(matches!(err, FeedError::Config(msg) if msg.starts_with("line 2")));
    }

    #[test]
    fn test_parse_seed_rejects_bad_price() {
        let input = "AAPL,Apple,abc,USD\n";
        let err = InstrumentSeed::parse_from_reader(Cursor::new(input)).err().unwrap();
        assert!(matches!(err, FeedError::Config(msg) if msg.contains("invalid price")));
    }

    #[test]
    fn test_defaults_from_args() {
        let args = Args::parse_from(["feed_server"]);
        let config = FeedConfig::from_args(&args).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.max_change_pct, 0.005);
        assert_eq!(config.subscriber_buffer, 64);
        assert_eq!(config.seeds, default_seeds());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = FeedConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.seeds.len(), 5);
        assert_eq!(config.seeds[0], InstrumentSeed::new("AAPL", "Apple", dec!(187.00), "USD"));
    }

    #[test]
    fn test_rejects_invalid_numbers() {
        let args = Args::parse_from(["feed_server", "--interval-secs", "0"]);
        assert!(matches!(FeedConfig::from_args(&args), Err(FeedError::Config(_))));

        let args = Args::parse_from(["feed_server", "--interval-secs=-1"]);
        assert!(matches!(FeedConfig::from_args(&args), Err(FeedError::Config(_))));

        let args = Args::parse_from(["feed_server", "--max-change-pct", "1.5"]);
        assert!(matches!(FeedConfig::from_args(&args), Err(FeedError::Config(_))));

        let args = Args::parse_from(["feed_server", "--subscriber-buffer", "0"]);
        assert!(matches!(FeedConfig::from_args(&args), Err(FeedError::Config(_))));
    }

    #[test]
    fn test_missing_seed_file() {
        let args = Args::parse_from(["feed_server", "--seeds", "/nonexistent/seeds.csv"]);
        assert!(matches!(FeedConfig::from_args(&args), Err(FeedError::Config(_))));
    }
}
