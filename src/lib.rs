//! # relaxed-vector
//!
//! A persistent (immutable) vector for Rust, backed by a Relaxed Radix
//! Balanced (RRB) tree.
//!
//! ## Overview
//!
//! [`PersistentVector`](persistent::PersistentVector) keeps every old
//! version valid while sharing structure with new ones. On top of the
//! logarithmic indexing and updates of a plain radix trie, the relaxed tree
//! supports:
//!
//! - **Slicing** in O(log N), returning a new vector that shares the
//!   untouched parts of the original
//! - **Concatenation** in O(log N), rebuilding only the nodes along the
//!   seam between the two inputs
//! - **Shape-preserving traversals** (`map`, `indexed_map`) and folds in
//!   both directions
//!
//! ## Feature Flags
//!
//! - `arc` (default): share nodes through `Arc`, making vectors `Send + Sync`
//! - `serde`: serialize vectors as sequences
//!
//! ## Example
//!
//! ```rust
//! use relaxed_vector::prelude::*;
//!
//! let vector: PersistentVector<i32> = (0..1000).collect();
//! let (front, back) = vector.split_at(500);
//! let swapped = back.append(&front);
//!
//! assert_eq!(swapped.get(0), Ok(&500));
//! assert_eq!(swapped.get(500), Ok(&0));
//! assert_eq!(vector.get(0), Ok(&0));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// ```rust
/// use relaxed_vector::prelude::*;
///
/// let vector = PersistentVector::singleton(1);
/// assert_eq!(vector.len(), 1);
/// ```
pub mod prelude {
    pub use crate::persistent::*;
}

pub mod persistent;
