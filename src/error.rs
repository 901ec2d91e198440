//! Error types for the predictive multi-tier cache

use thiserror::Error;

use crate::tier::TierLevel;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cache
#[derive(Error, Debug)]
pub enum Error {
    /// A distributed or persistent backend could not be reached.
    ///
    /// Recovered locally at the tier boundary: a `get` becomes a miss, a
    /// `set` returns `false`. Never propagates out of a tier.
    #[error("{tier} unavailable: {reason}")]
    TierUnavailable { tier: TierLevel, reason: String },

    /// A single entry is larger than a tier's maximum size.
    ///
    /// Permanent rejection, surfaced to the caller of `set`.
    #[error("entry of {size} bytes exceeds {tier} capacity of {max_size} bytes")]
    CapacityExceeded {
        tier: TierLevel,
        size: u64,
        max_size: u64,
    },

    /// The size of a value could not be determined
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_exceeded_display() {
        let err = Error::CapacityExceeded {
            tier: TierLevel::L1,
            size: 2048,
            max_size: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("L1"));
    }

    #[test]
    fn test_tier_unavailable_display() {
        let err = Error::TierUnavailable {
            tier: TierLevel::L2,
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));
    }
}
