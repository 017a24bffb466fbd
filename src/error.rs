use thiserror::Error;

/// Errors `reconcile` can return. The matching core otherwise never fails:
/// malformed cells are normalized down to empty strings / zero quantities
/// upstream of the matcher (see `normalize` and `numparse`).
#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    #[error("invalid options: threshold must be finite and within [0, 1], got {threshold}")]
    InvalidOptions { threshold: f64 },

    #[error("reconcile cancelled")]
    Cancelled,
}
