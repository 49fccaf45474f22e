use serde::{Deserialize, Serialize};

use super::Side;

/// An open position as reported by the position-tracking collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub asset: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub current_price: f64,
}

impl Position {
    pub fn new(
        asset: impl Into<String>,
        side: Side,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Self {
        Self {
            asset: asset.into(),
            side,
            entry_price,
            stop_loss,
            take_profit,
            current_price: entry_price,
        }
    }

    /// Mark the position at a new price.
    pub fn update_mark(&mut self, price: f64) {
        self.current_price = price;
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Buy
    }

    /// Distance between entry and stop.
    pub fn risk_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    /// Favourable price movement since entry (negative when under water).
    pub fn favorable_move(&self) -> f64 {
        match self.side {
            Side::Buy => self.current_price - self.entry_price,
            Side::Sell => self.entry_price - self.current_price,
        }
    }

    /// Current reward in units of initial risk.
    ///
    /// `None` when the risk distance is zero or any price is not finite.
    pub fn risk_reward(&self) -> Option<f64> {
        let risk = self.risk_distance();
        if !risk.is_finite() || risk <= 0.0 || !self.current_price.is_finite() {
            return None;
        }
        Some(self.favorable_move() / risk)
    }
}
