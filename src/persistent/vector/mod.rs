//! Persistent (immutable) vector based on a Relaxed Radix Balanced tree.
//!
//! This module provides [`PersistentVector`], an immutable indexed sequence
//! that shares structure between versions.
//!
//! # Overview
//!
//! The vector is a 32-way tree in which every branch carries a size table
//! (the cumulative element count of its children). Dense trees are indexed
//! exactly like a plain radix trie; the size table additionally lets
//! concatenation and slicing leave a few under-full nodes behind, so both
//! run in logarithmic time instead of copying one side element by element.
//!
//! - O(log32 N) `get` and `set`
//! - O(log32 N) `push_back`, amortized O(1) node allocations
//! - O(log32 N) `slice`, `take`, `drop_first`
//! - O(log N) `append` of two vectors
//! - O(N) traversals that preserve the tree shape (`map`, `indexed_map`)
//!
//! # Internal Structure
//!
//! - Leaves hold up to 32 elements.
//! - Branches hold up to 32 children of uniform height plus their
//!   cumulative lengths.
//! - After a concatenation, no branch on the merged boundary uses more than
//!   two slots above the minimum its contents require, which bounds the
//!   extra scanning an index lookup does.
//!
//! # Examples
//!
//! ```rust
//! use relaxed_vector::persistent::PersistentVector;
//!
//! let left: PersistentVector<i32> = (0..40).collect();
//! let right: PersistentVector<i32> = (40..80).collect();
//! let joined = left.append(&right);
//!
//! assert_eq!(joined.len(), 80);
//! assert_eq!(joined.get(45), Ok(&45));
//!
//! // Structural sharing: the inputs are untouched
//! assert_eq!(left.len(), 40);
//! assert_eq!(joined.slice(35, 45).to_vec(), (35..45).collect::<Vec<_>>());
//! ```

mod build;
mod concat;
mod iter;
mod node;
mod slice;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

use super::ReferenceCounter;
use super::error::IndexOutOfRangeError;
use build::{TreeBuilder, build_balanced};
use node::{Link, Node};

pub use iter::{PersistentVectorIntoIterator, PersistentVectorIterator};

// =============================================================================
// PersistentVector Definition
// =============================================================================

/// A persistent (immutable) vector based on a Relaxed Radix Balanced tree.
///
/// Every operation returns a new vector; the receiver is never modified and
/// the two versions share every node the operation did not touch.
///
/// # Time Complexity
///
/// | Operation     | Complexity      |
/// |---------------|-----------------|
/// | `new`         | O(1)            |
/// | `len`         | O(1)            |
/// | `get`         | O(log32 N)      |
/// | `set`         | O(log32 N)      |
/// | `push_back`   | O(log32 N)      |
/// | `slice`       | O(log32 N)      |
/// | `append`      | O(log N)        |
/// | `push_front`  | O(log N)        |
/// | `map`         | O(N)            |
/// | `iter`        | O(1) to create, O(N) to iterate |
///
/// # Examples
///
/// ```rust
/// use relaxed_vector::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (0..100).collect();
/// assert_eq!(vector.len(), 100);
/// assert_eq!(vector.get(50), Ok(&50));
/// ```
pub struct PersistentVector<T> {
    root: Link<T>,
}

impl<T> Clone for PersistentVector<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentVector<i32>: Send, Sync);

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentVector<i32>: Send, Sync);

impl<T> PersistentVector<T> {
    const fn from_root(root: Link<T>) -> Self {
        Self { root }
    }

    /// Creates a new empty vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = PersistentVector::new();
    /// assert!(vector.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::from_root(ReferenceCounter::new(Node::empty_leaf()))
    }

    /// Creates a vector containing a single element.
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::from_root(ReferenceCounter::new(Node::create(element, 0)))
    }

    /// Builds a densely packed vector that takes ownership of `elements`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::from_vec(vec!["a", "b", "c"]);
    /// assert_eq!(vector.get(1), Ok(&"b"));
    /// ```
    #[must_use]
    pub fn from_vec(elements: Vec<T>) -> Self {
        let length = elements.len();
        Self::from_root(build_balanced(&mut elements.into_iter(), length))
    }

    /// Creates a vector of `length` elements where the element at index `i`
    /// is `generator(i)`. The generator is called once per index, in order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let squares = PersistentVector::initialize(5, |index| index * index);
    /// assert_eq!(squares.to_vec(), vec![0, 1, 4, 9, 16]);
    /// ```
    #[must_use]
    pub fn initialize<F>(length: usize, generator: F) -> Self
    where
        F: FnMut(usize) -> T,
    {
        Self::from_root(build_balanced(&mut (0..length).map(generator), length))
    }

    /// Returns the number of elements in the vector.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Returns `true` if the vector contains no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the height of the underlying tree; `0` while all elements fit
    /// in a single leaf.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let small: PersistentVector<i32> = (0..32).collect();
    /// let large: PersistentVector<i32> = (0..33).collect();
    /// assert_eq!(small.height(), 0);
    /// assert_eq!(large.height(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.root.height()
    }

    /// Returns a reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexOutOfRangeError`] if `index >= self.len()`.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::{IndexOutOfRangeError, PersistentVector};
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.get(0), Ok(&1));
    /// assert_eq!(vector.get(4), Ok(&5));
    /// assert_eq!(vector.get(10), Err(IndexOutOfRangeError::new(10, 5)));
    /// ```
    pub fn get(&self, index: usize) -> Result<&T, IndexOutOfRangeError> {
        let length = self.len();
        if index >= length {
            return Err(IndexOutOfRangeError::new(index, length));
        }
        self.root
            .lookup(index)
            .ok_or(IndexOutOfRangeError::new(index, length))
    }

    /// Returns the first element, or `None` if the vector is empty.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.get(0).ok()
    }

    /// Returns the last element, or `None` if the vector is empty.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|index| self.get(index).ok())
    }

    /// Returns the index of the first element satisfying `predicate`.
    pub fn find_index<P>(&self, mut predicate: P) -> Option<usize>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().position(|element| predicate(element))
    }

    /// Returns an iterator over references to the elements, in index order.
    #[inline]
    pub fn iter(&self) -> PersistentVectorIterator<'_, T> {
        PersistentVectorIterator::new(&self.root)
    }

    /// Applies `function` to every element, producing a vector with the same
    /// tree shape.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=3).collect();
    /// let labels = vector.map(|number| format!("#{number}"));
    /// assert_eq!(labels.to_vec(), vec!["#1", "#2", "#3"]);
    /// ```
    #[must_use]
    pub fn map<U, F>(&self, mut function: F) -> PersistentVector<U>
    where
        F: FnMut(&T) -> U,
    {
        PersistentVector::from_root(ReferenceCounter::new(self.root.map(&mut function)))
    }

    /// Like [`map`](Self::map), also passing each element's index.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::from_vec(vec![10, 20, 30]);
    /// let offsets = vector.indexed_map(|index, element| element + index);
    /// assert_eq!(offsets.to_vec(), vec![10, 21, 32]);
    /// ```
    #[must_use]
    pub fn indexed_map<U, F>(&self, mut function: F) -> PersistentVector<U>
    where
        F: FnMut(usize, &T) -> U,
    {
        PersistentVector::from_root(ReferenceCounter::new(
            self.root.indexed_map(0, &mut function),
        ))
    }

    /// Folds the elements from first to last.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=4).collect();
    /// let digits = vector.fold_left(String::new(), |mut text, digit| {
    ///     text.push_str(&digit.to_string());
    ///     text
    /// });
    /// assert_eq!(digits, "1234");
    /// ```
    pub fn fold_left<B, F>(&self, initial: B, function: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        self.iter().fold(initial, function)
    }

    /// Folds the elements from last to first.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=4).collect();
    /// let digits = vector.fold_right(String::new(), |digit, mut text| {
    ///     text.push_str(&digit.to_string());
    ///     text
    /// });
    /// assert_eq!(digits, "4321");
    /// ```
    pub fn fold_right<B, F>(&self, initial: B, mut function: F) -> B
    where
        F: FnMut(&T, B) -> B,
    {
        self.root.fold_right(initial, &mut function)
    }
}

impl<T: Clone> PersistentVector<T> {
    /// Creates a vector by cloning the elements of `slice`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::from_slice(&[1, 2, 3]);
    /// assert_eq!(vector.len(), 3);
    /// ```
    #[must_use]
    pub fn from_slice(slice: &[T]) -> Self {
        Self::from_root(build_balanced(&mut slice.iter().cloned(), slice.len()))
    }

    /// Creates a vector of `length` copies of `element`.
    #[must_use]
    pub fn repeat(length: usize, element: T) -> Self {
        Self::initialize(length, |_| element.clone())
    }

    /// Copies the elements into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Copies the elements into a `Vec` of `(index, element)` pairs.
    #[must_use]
    pub fn to_indexed_vec(&self) -> Vec<(usize, T)> {
        self.iter().cloned().enumerate().collect()
    }

    /// Returns a new vector with the elements that satisfy `predicate`.
    #[must_use]
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&T) -> bool,
    {
        self.iter()
            .filter(|element| predicate(element))
            .cloned()
            .collect()
    }

    /// Returns a new vector with the element at `index` replaced.
    ///
    /// An out-of-range `index` leaves the vector unchanged; use
    /// [`try_set`](Self::try_set) to detect that case.
    ///
    /// # Complexity
    ///
    /// O(log32 N): only the nodes on the path to `index` are copied.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..5).collect();
    /// let updated = vector.set(2, 100);
    /// assert_eq!(updated.to_vec(), vec![0, 1, 100, 3, 4]);
    /// assert_eq!(vector.get(2), Ok(&2));
    ///
    /// assert_eq!(vector.set(9, 100), vector);
    /// ```
    #[must_use]
    pub fn set(&self, index: usize, element: T) -> Self {
        self.try_set(index, element).unwrap_or_else(|_| self.clone())
    }

    /// Returns a new vector with the element at `index` replaced.
    ///
    /// # Errors
    ///
    /// Returns [`IndexOutOfRangeError`] if `index >= self.len()`.
    pub fn try_set(&self, index: usize, element: T) -> Result<Self, IndexOutOfRangeError> {
        let length = self.len();
        if index >= length {
            return Err(IndexOutOfRangeError::new(index, length));
        }
        Ok(Self::from_root(ReferenceCounter::new(
            self.root.assoc(index, element),
        )))
    }

    /// Returns a new vector with `element` added at the end.
    ///
    /// The element goes into the rightmost leaf when any node on the right
    /// spine has room; otherwise the tree grows one level.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::new().push_back(1).push_back(2);
    /// assert_eq!(vector.to_vec(), vec![1, 2]);
    /// ```
    #[must_use]
    pub fn push_back(&self, element: T) -> Self {
        match self.root.push_within(element) {
            Ok(root) => Self::from_root(ReferenceCounter::new(root)),
            Err(element) => {
                let spine = ReferenceCounter::new(Node::create(element, self.height()));
                Self::from_root(ReferenceCounter::new(Node::siblise(
                    self.root.clone(),
                    spine,
                )))
            }
        }
    }

    /// Returns a new vector with `element` added at the front.
    #[must_use]
    pub fn push_front(&self, element: T) -> Self {
        Self::singleton(element).append(self)
    }

    /// Removes the last element, returning the remaining vector and the
    /// element, or `None` if the vector is empty.
    #[must_use]
    pub fn pop_back(&self) -> Option<(Self, T)> {
        let last = self.last()?.clone();
        Some((self.range(0, self.len() - 1), last))
    }

    /// Removes the first element, returning the remaining vector and the
    /// element, or `None` if the vector is empty.
    #[must_use]
    pub fn pop_front(&self) -> Option<(Self, T)> {
        let first = self.first()?.clone();
        Some((self.range(1, self.len()), first))
    }

    /// Returns the elements in `from..to`.
    ///
    /// A negative index counts from the end (`-1` is the last element).
    /// Indices past either end are clamped, and an empty range yields an
    /// empty vector.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..10).collect();
    /// assert_eq!(vector.slice(2, 5).to_vec(), vec![2, 3, 4]);
    /// assert_eq!(vector.slice(-3, 10).to_vec(), vec![7, 8, 9]);
    /// assert_eq!(vector.slice(0, -8).to_vec(), vec![0, 1]);
    /// assert!(vector.slice(6, 4).is_empty());
    /// ```
    #[must_use]
    pub fn slice(&self, from: isize, to: isize) -> Self {
        let length = self.len();
        self.range(normalize_index(from, length), normalize_index(to, length))
    }

    /// Slices with already normalized bounds: right trim, then left trim,
    /// then collapse of the single-child chain left above the result.
    fn range(&self, from: usize, to: usize) -> Self {
        if from >= to {
            return Self::new();
        }
        let trimmed = slice::slice_right(&self.root, to);
        let trimmed = slice::slice_left(&trimmed, from);
        Self::from_root(Node::collapse(trimmed))
    }

    /// Returns a new vector containing the first `count` elements.
    ///
    /// If `count` exceeds the vector's length, the whole vector is returned.
    #[must_use]
    pub fn take(&self, count: usize) -> Self {
        self.range(0, count.min(self.len()))
    }

    /// Returns a new vector with the first `count` elements removed.
    #[must_use]
    pub fn drop_first(&self, count: usize) -> Self {
        self.range(count, self.len())
    }

    /// Splits the vector at `index` into `(take(index), drop_first(index))`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// let (left, right) = vector.split_at(2);
    /// assert_eq!(left.to_vec(), vec![1, 2]);
    /// assert_eq!(right.to_vec(), vec![3, 4, 5]);
    /// ```
    #[must_use]
    pub fn split_at(&self, index: usize) -> (Self, Self) {
        (self.take(index), self.drop_first(index))
    }

    /// Concatenates two vectors.
    ///
    /// Only the nodes along the boundary between the two trees are rebuilt;
    /// everything else is shared with the inputs.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relaxed_vector::persistent::PersistentVector;
    ///
    /// let vector1: PersistentVector<i32> = (1..=3).collect();
    /// let vector2: PersistentVector<i32> = (4..=6).collect();
    /// let combined = vector1.append(&vector2);
    ///
    /// assert_eq!(combined.to_vec(), vec![1, 2, 3, 4, 5, 6]);
    /// ```
    #[must_use]
    pub fn append(&self, other: &Self) -> Self {
        Self::from_root(concat::append(&self.root, &other.root))
    }
}

/// Resolves a possibly negative index against `length`, clamped to `[0, length]`.
fn normalize_index(index: isize, length: usize) -> usize {
    if index < 0 {
        length.saturating_sub(index.unsigned_abs())
    } else {
        index.unsigned_abs().min(length)
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for PersistentVector<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for PersistentVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut builder = TreeBuilder::new();
        builder.extend(iter);
        Self::from_root(builder.finish())
    }
}

impl<T: Clone> Extend<T> for PersistentVector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let suffix: Self = iter.into_iter().collect();
        *self = self.append(&suffix);
    }
}

impl<T> From<Vec<T>> for PersistentVector<T> {
    #[inline]
    fn from(elements: Vec<T>) -> Self {
        Self::from_vec(elements)
    }
}

impl<T: Clone> From<&[T]> for PersistentVector<T> {
    #[inline]
    fn from(slice: &[T]) -> Self {
        Self::from_slice(slice)
    }
}

impl<T: Clone> IntoIterator for PersistentVector<T> {
    type Item = T;
    type IntoIter = PersistentVectorIntoIterator<T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        PersistentVectorIntoIterator::new(self.root)
    }
}

impl<'a, T> IntoIterator for &'a PersistentVector<T> {
    type Item = &'a T;
    type IntoIter = PersistentVectorIterator<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> Index<usize> for PersistentVector<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Ok(element) => element,
            Err(error) => panic!("{error}"),
        }
    }
}

impl<T: PartialEq> PartialEq for PersistentVector<T> {
    fn eq(&self, other: &Self) -> bool {
        if ReferenceCounter::ptr_eq(&self.root, &other.root) {
            return true;
        }
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for PersistentVector<T> {}

impl<T: PartialOrd> PartialOrd for PersistentVector<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord> Ord for PersistentVector<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

/// Hashes the length followed by every element in order, consistent with
/// [`PartialEq`].
impl<T: Hash> Hash for PersistentVector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for element in self {
            element.hash(state);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[")?;
        for (position, element) in self.iter().enumerate() {
            if position > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "]")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for PersistentVector<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut sequence = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            sequence.serialize_element(element)?;
        }
        sequence.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentVectorVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentVectorVisitor<T>
where
    T: serde::Deserialize<'de>,
{
    type Value = PersistentVector<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut sequence: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut builder = TreeBuilder::new();
        while let Some(element) = sequence.next_element()? {
            builder.push(element);
        }
        Ok(PersistentVector::from_root(builder.finish()))
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentVector<T>
where
    T: serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentVectorVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::node::{BRANCHING_FACTOR, SEARCH_STEP_SLACK};
    use super::*;
    use rstest::rstest;

    fn assert_valid<T>(vector: &PersistentVector<T>) {
        if let Err(message) = vector.root.check_invariants() {
            panic!("invalid tree: {message}");
        }
    }

    /// Largest number of slots any branch uses beyond the minimum needed to
    /// hold its grandchildren.
    fn worst_excess<T>(node: &Node<T>) -> usize {
        if node.height() < 2 {
            let Node::Branch(branch) = node else {
                return 0;
            };
            let needed = branch.len().div_ceil(BRANCHING_FACTOR);
            return branch.children.len().saturating_sub(needed);
        }
        let grandchildren: usize = node.children().iter().map(|child| child.slot_count()).sum();
        let own = node
            .slot_count()
            .saturating_sub(grandchildren.div_ceil(BRANCHING_FACTOR));
        node.children()
            .iter()
            .map(|child| worst_excess(child))
            .fold(own, usize::max)
    }

    // =========================================================================
    // Display Tests
    // =========================================================================

    #[rstest]
    fn test_display_empty_vector() {
        let vector: PersistentVector<i32> = PersistentVector::new();
        assert_eq!(format!("{vector}"), "[]");
    }

    #[rstest]
    fn test_display_multiple_elements_vector() {
        let vector: PersistentVector<i32> = (1..=3).collect();
        assert_eq!(format!("{vector}"), "[1, 2, 3]");
        assert_eq!(format!("{vector:?}"), "[1, 2, 3]");
    }

    // =========================================================================
    // Structure Tests
    // =========================================================================

    #[rstest]
    fn test_push_back_grows_height_at_leaf_capacity() {
        let mut vector = PersistentVector::new();
        for element in 0..32 {
            vector = vector.push_back(element);
        }
        assert_eq!(vector.height(), 0);

        vector = vector.push_back(32);
        assert_eq!(vector.height(), 1);
        assert_eq!(vector.root.slot_count(), 2);
        assert_valid(&vector);
    }

    #[rstest]
    fn test_push_back_fills_full_tree_then_siblises() {
        let vector: PersistentVector<usize> = (0..1024).collect();
        assert_eq!(vector.height(), 1);
        let grown = vector.push_back(1024);
        assert_eq!(grown.height(), 2);
        assert_eq!(grown.get(1024), Ok(&1024));
        assert!(ReferenceCounter::ptr_eq(&grown.root.children()[0], &vector.root));
        assert_valid(&grown);
    }

    #[rstest]
    fn test_set_shares_untouched_subtrees() {
        let vector: PersistentVector<usize> = (0..100).collect();
        let updated = vector.set(70, 0);
        let before = vector.root.children();
        let after = updated.root.children();
        assert!(ReferenceCounter::ptr_eq(&before[0], &after[0]));
        assert!(ReferenceCounter::ptr_eq(&before[1], &after[1]));
        assert!(!ReferenceCounter::ptr_eq(&before[2], &after[2]));
        assert!(ReferenceCounter::ptr_eq(&before[3], &after[3]));
    }

    #[rstest]
    fn test_set_out_of_range_returns_same_tree() {
        let vector: PersistentVector<usize> = (0..10).collect();
        let unchanged = vector.set(10, 99);
        assert!(ReferenceCounter::ptr_eq(&vector.root, &unchanged.root));
    }

    #[rstest]
    fn test_slice_collapses_single_child_roots() {
        let vector: PersistentVector<usize> = (0..5000).collect();
        assert_eq!(vector.height(), 2);
        let sliced = vector.slice(1030, 1040);
        assert_eq!(sliced.height(), 0);
        assert_eq!(sliced.to_vec(), (1030..1040).collect::<Vec<_>>());
        assert_valid(&sliced);
    }

    #[rstest]
    fn test_full_slice_shares_root() {
        let vector: PersistentVector<usize> = (0..100).collect();
        let sliced = vector.slice(0, 100);
        assert!(ReferenceCounter::ptr_eq(&vector.root, &sliced.root));
    }

    #[rstest]
    #[case(0, 0)]
    #[case(-1, 9)]
    #[case(-10, 0)]
    #[case(-11, 0)]
    #[case(3, 3)]
    #[case(10, 10)]
    #[case(11, 10)]
    #[case(isize::MIN, 0)]
    #[case(isize::MAX, 10)]
    fn test_normalize_index(#[case] index: isize, #[case] expected: usize) {
        assert_eq!(normalize_index(index, 10), expected);
    }

    #[rstest]
    fn test_append_shares_both_inputs() {
        let left: PersistentVector<usize> = (0..1024).collect();
        let right: PersistentVector<usize> = (1024..2048).collect();
        let joined = left.append(&right);
        assert_eq!(joined.height(), 2);
        assert!(ReferenceCounter::ptr_eq(&joined.root.children()[0], &left.root));
        assert!(ReferenceCounter::ptr_eq(&joined.root.children()[1], &right.root));
    }

    #[rstest]
    fn test_map_preserves_shape() {
        let left: PersistentVector<usize> = (0..40).collect();
        let joined = left.append(&(40..45).collect()).append(&(45..300).collect());
        let mapped = joined.map(|element| element * 2);
        assert_eq!(mapped.height(), joined.height());
        assert_eq!(mapped.root.slot_count(), joined.root.slot_count());
        assert_valid(&mapped);
        assert_eq!(mapped.get(299), Ok(&598));
    }

    #[rstest]
    fn test_repeated_small_appends_keep_search_steps_bounded() {
        let mut vector = PersistentVector::new();
        for chunk in 0..200 {
            let start = chunk * 7;
            vector = vector.append(&(start..start + 7).collect());
        }
        assert_valid(&vector);
        assert!(worst_excess(&vector.root) <= SEARCH_STEP_SLACK + 1);
        assert_eq!(vector.to_vec(), (0..1400).collect::<Vec<_>>());
    }

    // =========================================================================
    // Property Tests
    // =========================================================================

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn chunks() -> impl Strategy<Value = Vec<usize>> {
            prop::collection::vec(0_usize..200, 1..12)
        }

        fn assemble(sizes: &[usize]) -> (PersistentVector<usize>, Vec<usize>) {
            let mut vector = PersistentVector::new();
            let mut expected = Vec::new();
            for size in sizes {
                let start = expected.len();
                let piece: PersistentVector<usize> = (start..start + size).collect();
                vector = vector.append(&piece);
                expected.extend(start..start + size);
            }
            (vector, expected)
        }

        proptest! {
            #[test]
            fn prop_appends_produce_valid_trees(sizes in chunks()) {
                let (vector, expected) = assemble(&sizes);
                prop_assert!(vector.root.check_invariants().is_ok());
                prop_assert_eq!(vector.len(), expected.len());
                prop_assert_eq!(vector.to_vec(), expected);
            }

            #[test]
            fn prop_slices_of_relaxed_trees_are_valid(
                sizes in chunks(),
                from in 0_usize..2400,
                to in 0_usize..2400,
            ) {
                let (vector, expected) = assemble(&sizes);
                let from = from.min(expected.len());
                let to = to.min(expected.len());
                let sliced = vector.range(from, to);
                prop_assert!(sliced.root.check_invariants().is_ok());
                let wanted: Vec<usize> = if from < to { expected[from..to].to_vec() } else { Vec::new() };
                prop_assert_eq!(sliced.to_vec(), wanted);
            }

            #[test]
            fn prop_pushes_after_appends_are_valid(sizes in chunks(), extra in 0_usize..100) {
                let (mut vector, mut expected) = assemble(&sizes);
                for element in 0..extra {
                    vector = vector.push_back(element);
                    expected.push(element);
                }
                prop_assert!(vector.root.check_invariants().is_ok());
                prop_assert_eq!(vector.to_vec(), expected);
            }
        }
    }
}
