//! Signal-only execution: a broker that never talks to the venue. Orders
//! fill locally at the last observed price and a directional signal is
//! forwarded, fire-and-forget, to an external automation endpoint.

pub mod broker;
pub mod config;
pub mod forward;

pub use broker::SignalBroker;
pub use config::{InvalidSignalConfig, SignalConfig};
pub use forward::{HttpTransport, SignalAction, SignalForwarder, SignalPayload, SignalTransport};

#[cfg(test)]
mod tests;
