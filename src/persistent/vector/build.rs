//! Bulk construction of trees.
//!
//! Two strategies are provided:
//!
//! - [`build_balanced`] partitions a sequence of known length top-down into
//!   perfectly packed subtrees (used for `Vec`s, slices and `initialize`).
//! - [`TreeBuilder`] streams elements of unknown count into leaf buffers and
//!   promotes full nodes upward, one pending node per height.
//!
//! Both run in O(N) and never path-copy.

use std::mem;

use super::super::ReferenceCounter;
use super::node::{BRANCHING_FACTOR, Branch, Elements, Link, Node};

/// Smallest height whose fully packed tree holds `length` elements.
pub(super) fn height_for(length: usize) -> usize {
    let mut height = 0;
    let mut capacity = BRANCHING_FACTOR;
    while capacity < length {
        capacity = capacity.saturating_mul(BRANCHING_FACTOR);
        height += 1;
    }
    height
}

/// Number of elements a fully packed node of `height` holds, i.e. `M^(height + 1)`.
fn capacity_of(height: usize) -> usize {
    (0..=height).fold(1_usize, |capacity, _| capacity.saturating_mul(BRANCHING_FACTOR))
}

/// Builds a densely packed tree from the first `length` elements of `source`.
pub(super) fn build_balanced<T, I>(source: &mut I, length: usize) -> Link<T>
where
    I: Iterator<Item = T>,
{
    if length == 0 {
        return ReferenceCounter::new(Node::empty_leaf());
    }
    ReferenceCounter::new(partition(source, height_for(length), length))
}

fn partition<T, I>(source: &mut I, height: usize, length: usize) -> Node<T>
where
    I: Iterator<Item = T>,
{
    if height == 0 {
        return Node::Leaf(source.by_ref().take(length).collect());
    }

    let step = capacity_of(height - 1);
    let mut branch = Branch::empty(height);
    let mut remaining = length;
    while remaining > 0 {
        let count = remaining.min(step);
        let child = partition(source, height - 1, count);
        if child.is_empty() {
            break;
        }
        branch.push_child(ReferenceCounter::new(child));
        remaining -= count;
    }
    Node::Branch(branch)
}

// =============================================================================
// Streaming Builder
// =============================================================================

/// Incremental tree construction for iterators of unknown length.
///
/// `pending[h]` is the partially filled branch of height `h + 1` that
/// collects completed nodes of height `h`.
pub(super) struct TreeBuilder<T> {
    leaf: Elements<T>,
    pending: Vec<Branch<T>>,
}

impl<T> TreeBuilder<T> {
    pub(super) const fn new() -> Self {
        Self {
            leaf: Elements::new_const(),
            pending: Vec::new(),
        }
    }

    pub(super) fn push(&mut self, element: T) {
        self.leaf.push(element);
        if self.leaf.is_full() {
            let leaf = mem::take(&mut self.leaf);
            self.push_node(Node::Leaf(leaf));
        }
    }

    fn push_node(&mut self, node: Node<T>) {
        let height = node.height();
        if self.pending.len() == height {
            self.pending.push(Branch::empty(height + 1));
        }

        let parent = &mut self.pending[height];
        parent.push_child(ReferenceCounter::new(node));
        if parent.children.is_full() {
            let full = mem::replace(parent, Branch::empty(height + 1));
            self.push_node(Node::Branch(full));
        }
    }

    /// Flushes the partial leaf, folds the pending chain into a single root
    /// and strips a single-child top.
    pub(super) fn finish(mut self) -> Link<T> {
        if !self.leaf.is_empty() {
            let leaf = mem::take(&mut self.leaf);
            self.push_node(Node::Leaf(leaf));
        }

        let mut height = 0;
        while height + 1 < self.pending.len() {
            if !self.pending[height].children.is_empty() {
                let node = mem::replace(&mut self.pending[height], Branch::empty(height + 1));
                self.push_node(Node::Branch(node));
            }
            height += 1;
        }

        match self.pending.pop() {
            Some(top) => Node::collapse(ReferenceCounter::new(Node::Branch(top))),
            None => ReferenceCounter::new(Node::empty_leaf()),
        }
    }
}

impl<T> Extend<T> for TreeBuilder<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for element in iter {
            self.push(element);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
