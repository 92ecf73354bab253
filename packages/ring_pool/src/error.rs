use thiserror::Error;

/// Errors that can occur when configuring or operating a [`RingPool`][crate::RingPool].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller asked for a pool configuration that cannot be satisfied, such as a buffer
    /// larger than the capacity of the pool.
    ///
    /// The pool is left exactly as it was before the call.
    #[error("invalid ring pool configuration: {problem}")]
    InvalidConfiguration {
        /// A human-readable description of the problem.
        problem: String,
    },

    /// The pool has been torn down via [`RingPool::destroy()`][crate::RingPool::destroy]
    /// and can no longer be used.
    #[error("the ring pool has already been destroyed")]
    AlreadyDestroyed,
}

/// A specialized `Result` type for ring pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn buffer_exceeds_capacity(buffer: usize, capacity: usize) -> Error {
    Error::InvalidConfiguration {
        problem: format!("buffer of {buffer} exceeds the capacity of {capacity}"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn buffer_exceeds_capacity_names_both_values() {
        let error = buffer_exceeds_capacity(5, 3);

        assert!(matches!(error, Error::InvalidConfiguration { .. }));
        assert_eq!(
            error.to_string(),
            "invalid ring pool configuration: buffer of 5 exceeds the capacity of 3"
        );
    }

    #[test]
    fn already_destroyed_is_error() {
        let result: Result<()> = Err(Error::AlreadyDestroyed);

        assert!(matches!(result, Err(Error::AlreadyDestroyed)));
    }
}
