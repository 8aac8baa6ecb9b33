use std::collections::HashMap;

use venue_api::Position;

/// Per-instrument net positions, mutated only by the broker's
/// reconciliation path. Updates are local and synchronous; no lock is ever
/// held across network I/O because none is taken here at all.
#[derive(Debug, Default)]
pub struct PositionLedger {
    positions: HashMap<String, Position>,
    realized_pnl: HashMap<String, f64>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position for one instrument (flat if never traded).
    pub fn position(&self, symbol: &str) -> Position {
        self.positions.get(symbol).copied().unwrap_or_default()
    }

    /// Applies an executed fill (`qty` signed by side) and returns the
    /// realized P&L of the closed portion, if any.
    pub fn apply_fill(&mut self, symbol: &str, qty: f64, price: f64) -> f64 {
        let position = self.positions.entry(symbol.to_string()).or_default();
        let realized = position.apply_fill(qty, price);
        if realized != 0.0 {
            *self.realized_pnl.entry(symbol.to_string()).or_default() += realized;
        }
        realized
    }

    pub fn realized_pnl(&self, symbol: &str) -> f64 {
        self.realized_pnl.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn total_realized_pnl(&self) -> f64 {
        self.realized_pnl.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Position)> {
        self.positions.iter()
    }
}
