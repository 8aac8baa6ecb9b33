use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use venue_api::Instrument;

/// Process-wide cache of instrument rounding filters.
///
/// Populated lazily, at most once per symbol; entries are never evicted.
/// Writers fetch outside the lock and insert afterwards, so no lock is held
/// across network I/O.
#[derive(Clone, Default)]
pub struct FilterCache {
    inner: Arc<Mutex<HashMap<String, Instrument>>>,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<Instrument> {
        self.inner
            .lock()
            .expect("filter cache mutex poisoned")
            .get(symbol)
            .cloned()
    }

    pub fn insert(&self, instrument: Instrument) {
        self.inner
            .lock()
            .expect("filter cache mutex poisoned")
            .insert(instrument.symbol().to_string(), instrument);
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.inner
            .lock()
            .expect("filter cache mutex poisoned")
            .contains_key(symbol)
    }

    /// Drops one entry so the next lookup refetches. Escape hatch for
    /// filter-shaped venue rejections; the default path never invalidates.
    pub fn evict(&self, symbol: &str) {
        self.inner
            .lock()
            .expect("filter cache mutex poisoned")
            .remove(symbol);
    }
}
