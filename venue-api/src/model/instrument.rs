use serde::{Deserialize, Serialize};

/// A tradable symbol and its venue-imposed rounding rules.
///
/// Built from the venue's exchange-info filters (`LOT_SIZE`, `PRICE_FILTER`,
/// `NOTIONAL`) and cached for the process lifetime. Read-only after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    symbol: String,
    step_size: f64,
    tick_size: f64,
    min_qty: f64,
    min_notional: f64,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        step_size: f64,
        tick_size: f64,
        min_qty: f64,
        min_notional: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            step_size,
            tick_size,
            min_qty,
            min_notional,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    pub fn min_qty(&self) -> f64 {
        self.min_qty
    }

    pub fn min_notional(&self) -> f64 {
        self.min_notional
    }

    /// Floors `qty` to the lot step.
    pub fn round_quantity(&self, qty: f64) -> f64 {
        floor_to_step(qty, self.step_size)
    }

    /// Floors `price` to the price tick.
    pub fn round_price(&self, price: f64) -> f64 {
        floor_to_step(price, self.tick_size)
    }

    /// Renders a quantity in the exact decimal form the venue accepts.
    pub fn format_quantity(&self, qty: f64) -> String {
        format_step(self.round_quantity(qty), self.step_size)
    }

    /// Renders a price in the exact decimal form the venue accepts.
    pub fn format_price(&self, price: f64) -> String {
        format_step(self.round_price(price), self.tick_size)
    }

    /// True if an order of `qty` at `price` clears the venue minimums.
    pub fn meets_minimums(&self, qty: f64, price: f64) -> bool {
        qty >= self.min_qty && qty * price >= self.min_notional
    }
}

fn floor_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step + 1e-9).floor() * step
}

/// Number of decimal places implied by a step like 0.001 (-> 3).
fn step_decimals(step: f64) -> usize {
    let mut decimals = 0;
    let mut scaled = step;
    while decimals < 8 && scaled.fract().abs() > 1e-9 && (1.0 - scaled.fract()).abs() > 1e-9 {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals
}

fn format_step(value: f64, step: f64) -> String {
    format!("{:.*}", step_decimals(step), value)
}
