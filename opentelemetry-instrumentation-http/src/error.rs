use thiserror::Error;

/// Errors raised while assembling instrumentation configuration.
///
/// The instrumentation itself never fails a request: once the filters are
/// built, malformed carriers, double finishes and mismatched scope closes all
/// degrade to no-ops. Only configuration can be rejected, and only up front.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request skip pattern is not a valid regular expression.
    #[error("invalid skip pattern: {0}")]
    InvalidSkipPattern(#[from] regex::Error),

    /// A propagator was requested under a name this crate does not know.
    #[error("unsupported propagator: {0}")]
    UnknownPropagator(String),
}
