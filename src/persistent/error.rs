//! Error types for persistent collections.
//!
//! Indexed access is the only fallible operation on a
//! [`PersistentVector`](super::PersistentVector): every other operation is
//! total over its input domain.

use thiserror::Error;

/// Represents an attempt to read or strictly update a position that does not
/// exist in the vector.
///
/// # Examples
///
/// ```rust
/// use relaxed_vector::persistent::{IndexOutOfRangeError, PersistentVector};
///
/// let vector: PersistentVector<i32> = (0..3).collect();
/// let error = vector.get(5).unwrap_err();
///
/// assert_eq!(error, IndexOutOfRangeError { index: 5, length: 3 });
/// assert_eq!(
///     error.to_string(),
///     "index 5 is out of range for a vector of length 3"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("index {index} is out of range for a vector of length {length}")]
pub struct IndexOutOfRangeError {
    /// The index that was requested.
    pub index: usize,
    /// The length of the vector at the time of the request.
    pub length: usize,
}

impl IndexOutOfRangeError {
    /// Creates a new error for `index` against a vector of `length` elements.
    #[inline]
    #[must_use]
    pub const fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, "index 0 is out of range for a vector of length 0")]
    #[case(32, 32, "index 32 is out of range for a vector of length 32")]
    #[case(1000, 7, "index 1000 is out of range for a vector of length 7")]
    fn test_display_names_index_and_length(
        #[case] index: usize,
        #[case] length: usize,
        #[case] expected: &str,
    ) {
        assert_eq!(IndexOutOfRangeError::new(index, length).to_string(), expected);
    }

    #[rstest]
    fn test_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&IndexOutOfRangeError::new(1, 0));
    }
}
