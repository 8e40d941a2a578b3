//! Iterators over [`PersistentVector`](super::PersistentVector).
//!
//! Both iterators walk the tree depth-first with an explicit stack of
//! partially visited branches and a cursor into the current leaf, so a full
//! pass costs O(N) instead of one O(log N) descent per element.

use std::iter::FusedIterator;
use std::slice;

use smallvec::SmallVec;

use super::node::{Link, Node};

/// Depth of stack kept inline; a tree of height 8 already holds `32^9` elements.
const INLINE_DEPTH: usize = 8;

// =============================================================================
// Borrowing Iterator
// =============================================================================

/// An iterator over references to the elements of a
/// [`PersistentVector`](super::PersistentVector), in index order.
///
/// # Examples
///
/// ```rust
/// use relaxed_vector::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (1..=3).collect();
/// let doubled: Vec<i32> = vector.iter().map(|element| element * 2).collect();
/// assert_eq!(doubled, vec![2, 4, 6]);
/// ```
pub struct PersistentVectorIterator<'a, T> {
    /// Unvisited children of every branch on the current path.
    stack: SmallVec<[slice::Iter<'a, Link<T>>; INLINE_DEPTH]>,
    /// Unvisited elements of the current leaf.
    leaf: slice::Iter<'a, T>,
    remaining: usize,
}

impl<'a, T> PersistentVectorIterator<'a, T> {
    pub(super) fn new(root: &'a Node<T>) -> Self {
        let mut iterator = Self {
            stack: SmallVec::new(),
            leaf: slice::Iter::default(),
            remaining: root.len(),
        };
        match root {
            Node::Leaf(elements) => iterator.leaf = elements.iter(),
            Node::Branch(branch) => iterator.stack.push(branch.children.iter()),
        }
        iterator
    }

    /// Moves the leaf cursor to the next leaf, returning `false` once the
    /// tree is exhausted.
    fn advance_to_next_leaf(&mut self) -> bool {
        while let Some(children) = self.stack.last_mut() {
            match children.next().map(|child| &**child) {
                Some(Node::Leaf(elements)) => {
                    self.leaf = elements.iter();
                    return true;
                }
                Some(Node::Branch(branch)) => self.stack.push(branch.children.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
        false
    }
}

impl<'a, T> Iterator for PersistentVectorIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(element) = self.leaf.next() {
                self.remaining -= 1;
                return Some(element);
            }
            if !self.advance_to_next_leaf() {
                return None;
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for PersistentVectorIterator<'_, T> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<T> FusedIterator for PersistentVectorIterator<'_, T> {}

// =============================================================================
// Owning Iterator
// =============================================================================

/// An owning iterator over the elements of a
/// [`PersistentVector`](super::PersistentVector).
///
/// Nodes may be shared with other vectors, so elements are cloned out of the
/// tree as they are yielded. The iterator keeps the nodes it still needs
/// alive on its own.
pub struct PersistentVectorIntoIterator<T> {
    /// Branches on the current path and the next child slot to visit in each.
    stack: SmallVec<[(Link<T>, usize); INLINE_DEPTH]>,
    /// The current leaf and the next element position in it.
    leaf: Option<(Link<T>, usize)>,
    remaining: usize,
}

impl<T> PersistentVectorIntoIterator<T> {
    pub(super) fn new(root: Link<T>) -> Self {
        let remaining = root.len();
        let mut iterator = Self {
            stack: SmallVec::new(),
            leaf: None,
            remaining,
        };
        if root.height() == 0 {
            iterator.leaf = Some((root, 0));
        } else {
            iterator.stack.push((root, 0));
        }
        iterator
    }

    fn advance_to_next_leaf(&mut self) -> bool {
        while let Some((node, slot)) = self.stack.last_mut() {
            let Some(child) = node.children().get(*slot).cloned() else {
                self.stack.pop();
                continue;
            };
            *slot += 1;
            if child.height() == 0 {
                self.leaf = Some((child, 0));
                return true;
            }
            self.stack.push((child, 0));
        }
        false
    }
}

impl<T: Clone> Iterator for PersistentVectorIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((leaf, position)) = &mut self.leaf
                && let Node::Leaf(elements) = leaf.as_ref()
                && let Some(element) = elements.get(*position)
            {
                *position += 1;
                self.remaining -= 1;
                return Some(element.clone());
            }
            self.leaf = None;
            if !self.advance_to_next_leaf() {
                return None;
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Clone> ExactSizeIterator for PersistentVectorIntoIterator<T> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<T: Clone> FusedIterator for PersistentVectorIntoIterator<T> {}

// =============================================================================
// Tests
// =============================================================================
