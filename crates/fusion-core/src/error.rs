use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalError {
    /// External source returned empty or unparseable data.
    /// Callers yield a neutral factor and proceed.
    #[error("no data: {0}")]
    NoData(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Transient network failure; retried by the source implementation,
    /// then demoted to NoData.
    #[error("network error: {0}")]
    Network(String),

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// Corrupted state that must never be silently swallowed.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
