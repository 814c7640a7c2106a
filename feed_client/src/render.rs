//! Console table for a price snapshot.
use feed_common::PriceUpdate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::fmt::Write;

const RULE_WIDTH: usize = 60;
/// ANSI sequence that clears the terminal and moves the cursor home.
pub const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Render `update` as a fixed-width table.
pub fn render_snapshot(update: &PriceUpdate) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Stock Prices @ {}",
        update.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{:<8} {:<15} {:>10} {:>10} {:>8}",
        "Symbol", "Name", "Price", "Δ", "Δ%"
    );
    let _ = writeln!(out, "{}", rule);
    for stock in &update.data {
        let _ = writeln!(
            out,
            "{:<8} {:<15} {:>10.2} {:>+10.2} {:>+7.2}%",
            stock.symbol,
            stock.name,
            as_float(stock.price),
            as_float(stock.abs_change),
            as_float(stock.pct_change)
        );
    }
    out
}

fn as_float(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
