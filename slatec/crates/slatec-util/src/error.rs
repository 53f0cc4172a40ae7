//! Fatal-error type shared across the pipeline.

use thiserror::Error;

/// A condition that aborts elaboration of the current translation unit.
///
/// Only two diagnostic kinds are fatal: generic instantiation cycles and
/// internal invariant violations. Everything else is recorded on the
/// handler and elaboration continues with poisoned values. `FatalError`
/// propagates with `?` through every elaboration function; the
/// corresponding diagnostic has already been emitted when it is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("translation unit aborted: {reason}")]
pub struct FatalError {
    /// Short machine-oriented cause, e.g. `"generic instantiation cycle"`.
    pub reason: &'static str,
}

impl FatalError {
    /// Create a fatal error with the given cause.
    pub fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_reason() {
        let err = FatalError::new("generic instantiation cycle");
        assert_eq!(
            err.to_string(),
            "translation unit aborted: generic instantiation cycle"
        );
    }
}
