//! Shared networking constants and helpers used by server and client.

/// TCP port the push endpoint listens on by default.
pub const FEED_PORT: u16 = 8000;
/// Request path of the WebSocket price stream.
pub const PRICES_PATH: &str = "/ws/prices";

/// Helper to format an address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}

/// WebSocket URL of the price stream served at `ip:port`.
pub fn prices_url(ip: &str, port: u16) -> String {
    format!("ws://{}{}", addr(ip, port), PRICES_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prices_url() {
        assert_eq!(prices_url("127.0.0.1", FEED_PORT), "ws://127.0.0.1:8000/ws/prices");
    }
}
