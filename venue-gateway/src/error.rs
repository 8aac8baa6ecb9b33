use thiserror::Error;

/// Venue business error code for a rejected request timestamp (clock skew).
const CODE_CLOCK_SKEW: i64 = -1021;
/// Venue business error code for canceling an order that is already gone.
const CODE_ORDER_GONE: i64 = -2011;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network-level failure: timeout, reset, DNS, TLS. Retryable where the
    /// operation allows it.
    #[error("transport error: {0}")]
    Transport(String),

    /// Business rejection reported by the venue. Never retried.
    #[error("venue rejected request (code {code}): {msg}")]
    Venue { code: i64, msg: String },

    /// Response arrived but could not be decoded.
    #[error("invalid venue response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }

    /// Timestamp/signature validation failure: fixed by resyncing the local
    /// clock offset and resending once.
    pub fn is_clock_skew(&self) -> bool {
        matches!(self, GatewayError::Venue { code, .. } if *code == CODE_CLOCK_SKEW)
    }

    /// "Order already filled or does not exist" on cancel: treated as a
    /// successful no-op by callers.
    pub fn is_order_gone(&self) -> bool {
        matches!(self, GatewayError::Venue { code, .. } if *code == CODE_ORDER_GONE)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_skew_detection() {
        let err = GatewayError::Venue {
            code: -1021,
            msg: "Timestamp for this request is outside of the recvWindow.".into(),
        };
        assert!(err.is_clock_skew());
        assert!(!err.is_order_gone());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_order_gone_detection() {
        let err = GatewayError::Venue {
            code: -2011,
            msg: "Unknown order sent.".into(),
        };
        assert!(err.is_order_gone());
        assert!(!err.is_clock_skew());
    }
}
