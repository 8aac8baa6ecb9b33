use serde::{Deserialize, Serialize};

/// Net exposure in one instrument: signed size and volume-weighted entry
/// price. Recomputed only from executed fills, never from pending orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    size: f64,
    avg_price: f64,
}

impl Position {
    pub fn new(size: f64, avg_price: f64) -> Self {
        Self { size, avg_price }
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn avg_price(&self) -> f64 {
        self.avg_price
    }

    pub fn is_flat(&self) -> bool {
        self.size == 0.0
    }

    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    /// Applies an executed fill (`qty` signed by side) and returns the
    /// realized P&L of the closed portion, if any.
    ///
    /// Extending or opening keeps a weighted-average entry price. Reducing
    /// realizes `(price - avg) * closed` (sign-adjusted for shorts) and
    /// leaves the average untouched. Flipping realizes the whole old side
    /// and restarts the position at `price` with the residual.
    pub fn apply_fill(&mut self, qty: f64, price: f64) -> f64 {
        if qty == 0.0 {
            return 0.0;
        }

        if self.size == 0.0 || self.size.signum() == qty.signum() {
            let total = self.size + qty;
            self.avg_price = (self.avg_price * self.size + price * qty) / total;
            self.size = total;
            return 0.0;
        }

        let closed = qty.abs().min(self.size.abs());
        let realized = (price - self.avg_price) * closed * self.size.signum();
        let remaining = self.size + qty;

        if remaining == 0.0 {
            self.size = 0.0;
            self.avg_price = 0.0;
        } else if remaining.signum() == self.size.signum() {
            // Partial reduction: entry price unchanged.
            self.size = remaining;
        } else {
            // Flip: residual opens fresh at the fill price.
            self.size = remaining;
            self.avg_price = price;
        }
        realized
    }
}
