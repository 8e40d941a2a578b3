//! Persistent (immutable) data structures.
//!
//! - [`PersistentVector`]: persistent vector (Relaxed Radix Balanced tree)
//!   with logarithmic indexing, slicing and concatenation
//!
//! # Structural Sharing
//!
//! Operations never modify an existing value. They return a new version
//! that reuses every node the operation did not have to change, so keeping
//! old versions around is cheap.
//!
//! # Examples
//!
//! ```rust
//! use relaxed_vector::persistent::PersistentVector;
//!
//! let vector: PersistentVector<i32> = (0..100).collect();
//! assert_eq!(vector.get(50), Ok(&50));
//!
//! // Structural sharing: the original vector is preserved
//! let updated = vector.set(50, 999);
//! assert_eq!(vector.get(50), Ok(&50));     // Original unchanged
//! assert_eq!(updated.get(50), Ok(&999));   // New version
//!
//! // Slices and concatenations are new versions as well
//! let tail = vector.slice(90, 100);
//! let rotated = tail.append(&vector.slice(0, 90));
//! assert_eq!(rotated.first(), Some(&90));
//! assert_eq!(rotated.len(), 100);
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer used for tree nodes.
///
/// With the `arc` feature (enabled by default) this is `std::sync::Arc`, so
/// vectors can be shared across threads. Without it, this is `std::rc::Rc`,
/// which is cheaper but confines vectors to one thread.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod error;
mod vector;

pub use error::IndexOutOfRangeError;
pub use vector::PersistentVector;
pub use vector::PersistentVectorIntoIterator;
pub use vector::PersistentVectorIterator;

// =============================================================================
// Tests
// =============================================================================
