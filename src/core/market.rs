//! Orderbook snapshot handed to the controller by market collaborators

use serde::{Deserialize, Serialize};

/// A single level in the orderbook (price + quantity)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderbookLevel {
    pub price: f64,
    pub quantity: f64,
}

impl OrderbookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Orderbook snapshot for one symbol on one platform
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Orderbook {
    /// Platform identifier (e.g., "binance_swap")
    pub platform: String,
    /// Exchange symbol (e.g., "BTC-USDT-SWAP")
    pub symbol: String,
    /// Bid levels sorted descending by price (best bid first)
    pub bids: Vec<OrderbookLevel>,
    /// Ask levels sorted ascending by price (best ask first)
    pub asks: Vec<OrderbookLevel>,
    /// Timestamp in Unix milliseconds
    pub timestamp: u64,
}

impl Orderbook {
    pub fn new(platform: &str, symbol: &str) -> Self {
        Self {
            platform: platform.to_string(),
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_prices() {
        let mut ob = Orderbook::new("binance_swap", "BTC-USDT-SWAP");
        assert_eq!(ob.best_bid(), None);

        ob.bids.push(OrderbookLevel::new(42000.0, 1.0));
        ob.asks.push(OrderbookLevel::new(42001.5, 0.5));
        assert_eq!(ob.best_bid(), Some(42000.0));
        assert_eq!(ob.best_ask(), Some(42001.5));
    }

    #[test]
    fn test_orderbook_deserialize() {
        let json = r#"{
            "platform": "okex_swap",
            "symbol": "ETH-USDT-SWAP",
            "bids": [{"price": 2500.0, "quantity": 3.0}],
            "asks": [],
            "timestamp": 1700000000000
        }"#;
        let ob: Orderbook = serde_json::from_str(json).unwrap();
        assert_eq!(ob.symbol, "ETH-USDT-SWAP");
        assert_eq!(ob.best_bid(), Some(2500.0));
        assert_eq!(ob.best_ask(), None);
    }
}
