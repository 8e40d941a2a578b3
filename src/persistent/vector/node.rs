//! Tree nodes of the relaxed radix balanced tree.
//!
//! A node is either a leaf holding up to [`BRANCHING_FACTOR`] elements or a
//! branch holding up to [`BRANCHING_FACTOR`] children together with the
//! cumulative element count of its children (the size table). The size
//! table is what lets concatenation leave under-full nodes in the middle of
//! the tree while indexing stays logarithmic.
//!
//! Nodes are never written once they are wrapped in a [`ReferenceCounter`].
//! Every "update" below clones the node it changes and hands back a fresh,
//! unshared value.

use std::ops::Range;

use arrayvec::ArrayVec;

use super::super::ReferenceCounter;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of children per branch and elements per leaf.
pub(super) const BRANCHING_FACTOR: usize = 32;

/// Bits consumed per tree level by the radix guess (`2^5 = 32`).
pub(super) const BITS_PER_LEVEL: usize = 5;

/// Extra slots tolerated after concatenation before a rebalance is forced.
pub(super) const SEARCH_STEP_SLACK: usize = 2;

static_assertions::const_assert_eq!(1 << BITS_PER_LEVEL, BRANCHING_FACTOR);
static_assertions::const_assert!(SEARCH_STEP_SLACK < BRANCHING_FACTOR);

pub(super) type Link<T> = ReferenceCounter<Node<T>>;
pub(super) type Elements<T> = ArrayVec<T, BRANCHING_FACTOR>;
pub(super) type Children<T> = ArrayVec<Link<T>, BRANCHING_FACTOR>;

// =============================================================================
// Node Definition
// =============================================================================

pub(super) enum Node<T> {
    /// Height 0: elements stored directly.
    Leaf(Elements<T>),
    /// Height > 0: child subtrees plus their cumulative lengths.
    Branch(Branch<T>),
}

pub(super) struct Branch<T> {
    pub(super) height: usize,
    pub(super) children: Children<T>,
    /// `lengths[i]` is the number of elements in `children[..=i]`.
    pub(super) lengths: ArrayVec<usize, BRANCHING_FACTOR>,
}

impl<T> Clone for Branch<T> {
    fn clone(&self) -> Self {
        Self {
            height: self.height,
            children: self.children.clone(),
            lengths: self.lengths.clone(),
        }
    }
}

impl<T: Clone> Clone for Node<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Leaf(elements) => Self::Leaf(elements.clone()),
            Self::Branch(branch) => Self::Branch(branch.clone()),
        }
    }
}

// =============================================================================
// Branch
// =============================================================================

impl<T> Branch<T> {
    pub(super) const fn empty(height: usize) -> Self {
        Self {
            height,
            children: ArrayVec::new_const(),
            lengths: ArrayVec::new_const(),
        }
    }

    /// Builds a branch from children of height `height - 1`, deriving the
    /// size table from scratch.
    pub(super) fn from_children<I>(height: usize, children: I) -> Self
    where
        I: IntoIterator<Item = Link<T>>,
    {
        let mut branch = Self::empty(height);
        for child in children {
            branch.push_child(child);
        }
        branch
    }

    /// Appends a child and its cumulative length. The branch must not be full.
    pub(super) fn push_child(&mut self, child: Link<T>) {
        debug_assert_eq!(child.height() + 1, self.height);
        let total = self.len() + child.len();
        self.children.push(child);
        self.lengths.push(total);
    }

    #[inline]
    pub(super) fn len(&self) -> usize {
        self.lengths.last().copied().unwrap_or(0)
    }

    /// Number of elements held by the children before `slot`.
    #[inline]
    pub(super) fn offset_of(&self, slot: usize) -> usize {
        slot.checked_sub(1)
            .and_then(|previous| self.lengths.get(previous))
            .copied()
            .unwrap_or(0)
    }

    /// Finds the child holding the element at `index`.
    ///
    /// The radix guess `index >> (5 * height)` is exact for a densely packed
    /// node and never overshoots a relaxed one, so a short forward scan over
    /// the size table corrects it.
    pub(super) fn slot_for(&self, index: usize) -> usize {
        let last = self.lengths.len().saturating_sub(1);
        let shift = u32::try_from(BITS_PER_LEVEL * self.height).unwrap_or(u32::MAX);
        let mut slot = index.checked_shr(shift).unwrap_or(0).min(last);
        while slot < last && self.lengths[slot] <= index {
            slot += 1;
        }
        slot
    }
}

// =============================================================================
// Navigation
// =============================================================================

impl<T> Node<T> {
    pub(super) const fn empty_leaf() -> Self {
        Self::Leaf(ArrayVec::new_const())
    }

    /// An empty node of the given height (an empty leaf at height 0).
    pub(super) const fn empty(height: usize) -> Self {
        if height == 0 {
            Self::empty_leaf()
        } else {
            Self::Branch(Branch::empty(height))
        }
    }

    #[inline]
    pub(super) const fn height(&self) -> usize {
        match self {
            Self::Leaf(_) => 0,
            Self::Branch(branch) => branch.height,
        }
    }

    /// Number of elements in this subtree.
    #[inline]
    pub(super) fn len(&self) -> usize {
        match self {
            Self::Leaf(elements) => elements.len(),
            Self::Branch(branch) => branch.len(),
        }
    }

    /// Number of occupied slots in this node's own table.
    #[inline]
    pub(super) fn slot_count(&self) -> usize {
        match self {
            Self::Leaf(elements) => elements.len(),
            Self::Branch(branch) => branch.children.len(),
        }
    }

    #[inline]
    pub(super) fn is_empty(&self) -> bool {
        self.slot_count() == 0
    }

    /// Child links of a branch; a leaf has none.
    #[inline]
    pub(super) fn children(&self) -> &[Link<T>] {
        match self {
            Self::Leaf(_) => &[],
            Self::Branch(branch) => &branch.children,
        }
    }

    pub(super) fn first_child(&self) -> Option<&Link<T>> {
        self.children().first()
    }

    pub(super) fn last_child(&self) -> Option<&Link<T>> {
        self.children().last()
    }

    /// Walks down to the element at `index` without a bounds check against
    /// the vector length; an invalid index yields `None`.
    pub(super) fn lookup(&self, index: usize) -> Option<&T> {
        let mut node = self;
        let mut index = index;
        loop {
            match node {
                Self::Leaf(elements) => return elements.get(index),
                Self::Branch(branch) => {
                    let slot = branch.slot_for(index);
                    index = index.checked_sub(branch.offset_of(slot))?;
                    node = branch.children.get(slot)?.as_ref();
                }
            }
        }
    }

    /// A minimal chain of single-child nodes of `height` ending in a leaf
    /// that holds just `element`.
    pub(super) fn create(element: T, height: usize) -> Self {
        let mut elements = ArrayVec::new();
        elements.push(element);
        let mut node = Self::Leaf(elements);
        for level in 1..=height {
            node = Self::Branch(Branch::from_children(
                level,
                [ReferenceCounter::new(node)],
            ));
        }
        node
    }

    /// Wraps `node` in single-child parents until it reaches `height`.
    pub(super) fn parentise(node: Link<T>, height: usize) -> Link<T> {
        let mut node = node;
        while node.height() < height {
            let level = node.height() + 1;
            node = ReferenceCounter::new(Self::Branch(Branch::from_children(level, [node])));
        }
        node
    }

    /// Joins two same-height nodes under a new parent one level taller.
    pub(super) fn siblise(left: Link<T>, right: Link<T>) -> Self {
        debug_assert_eq!(left.height(), right.height());
        let height = left.height() + 1;
        Self::Branch(Branch::from_children(height, [left, right]))
    }

    /// Strips single-child branches off the top of a tree.
    pub(super) fn collapse(root: Link<T>) -> Link<T> {
        let mut root = root;
        loop {
            let next = match root.as_ref() {
                Self::Branch(branch) if branch.children.is_empty() => {
                    return ReferenceCounter::new(Self::empty_leaf());
                }
                Self::Branch(branch) if branch.children.len() == 1 => branch.children[0].clone(),
                _ => return root,
            };
            root = next;
        }
    }

    // =========================================================================
    // Traversals
    // =========================================================================

    pub(super) fn map<U, F>(&self, function: &mut F) -> Node<U>
    where
        F: FnMut(&T) -> U,
    {
        match self {
            Self::Leaf(elements) => Node::Leaf(elements.iter().map(&mut *function).collect()),
            Self::Branch(branch) => Node::Branch(Branch {
                height: branch.height,
                children: branch
                    .children
                    .iter()
                    .map(|child| ReferenceCounter::new(child.map(&mut *function)))
                    .collect(),
                lengths: branch.lengths.clone(),
            }),
        }
    }

    /// Like [`Node::map`], passing each element's global index. `offset` is
    /// the global index of this subtree's first element.
    pub(super) fn indexed_map<U, F>(&self, offset: usize, function: &mut F) -> Node<U>
    where
        F: FnMut(usize, &T) -> U,
    {
        match self {
            Self::Leaf(elements) => Node::Leaf(
                elements
                    .iter()
                    .enumerate()
                    .map(|(position, element)| function(offset + position, element))
                    .collect(),
            ),
            Self::Branch(branch) => Node::Branch(Branch {
                height: branch.height,
                children: branch
                    .children
                    .iter()
                    .enumerate()
                    .map(|(slot, child)| {
                        ReferenceCounter::new(
                            child.indexed_map(offset + branch.offset_of(slot), &mut *function),
                        )
                    })
                    .collect(),
                lengths: branch.lengths.clone(),
            }),
        }
    }

    pub(super) fn fold_right<B, F>(&self, accumulator: B, function: &mut F) -> B
    where
        F: FnMut(&T, B) -> B,
    {
        match self {
            Self::Leaf(elements) => elements
                .iter()
                .rev()
                .fold(accumulator, |accumulator, element| function(element, accumulator)),
            Self::Branch(branch) => branch
                .children
                .iter()
                .rev()
                .fold(accumulator, |accumulator, child| {
                    child.fold_right(accumulator, &mut *function)
                }),
        }
    }
}

// =============================================================================
// Point Updates
// =============================================================================

impl<T: Clone> Node<T> {
    /// Returns a copy of this subtree with the element at `index` replaced.
    /// Only the nodes on the path to that element are copied.
    pub(super) fn assoc(&self, index: usize, element: T) -> Self {
        match self {
            Self::Leaf(elements) => {
                let mut elements = elements.clone();
                if let Some(slot) = elements.get_mut(index) {
                    *slot = element;
                }
                Self::Leaf(elements)
            }
            Self::Branch(branch) => {
                let slot = branch.slot_for(index);
                let mut copy = branch.clone();
                if let Some(child) = branch.children.get(slot) {
                    let local = index - branch.offset_of(slot);
                    copy.children[slot] = ReferenceCounter::new(child.assoc(local, element));
                }
                Self::Branch(copy)
            }
        }
    }

    /// Pushes `element` onto the right spine of this subtree.
    ///
    /// Returns the element back when every node on the spine is full, so the
    /// caller can grow a level instead.
    pub(super) fn push_within(&self, element: T) -> Result<Self, T> {
        match self {
            Self::Leaf(elements) => {
                if elements.is_full() {
                    return Err(element);
                }
                let mut elements = elements.clone();
                elements.push(element);
                Ok(Self::Leaf(elements))
            }
            Self::Branch(branch) => {
                let element = match branch.children.last() {
                    Some(last) => match last.push_within(element) {
                        Ok(pushed) => {
                            let mut copy = branch.clone();
                            let slot = copy.children.len() - 1;
                            copy.children[slot] = ReferenceCounter::new(pushed);
                            copy.lengths[slot] += 1;
                            return Ok(Self::Branch(copy));
                        }
                        Err(element) => element,
                    },
                    None => element,
                };

                if branch.children.is_full() {
                    return Err(element);
                }
                let mut copy = branch.clone();
                copy.push_child(ReferenceCounter::new(Self::create(
                    element,
                    branch.height - 1,
                )));
                Ok(Self::Branch(copy))
            }
        }
    }

    /// Copies the slots `range` of `source` onto the end of this node.
    ///
    /// Both nodes must have the same height and `self` must be a fresh,
    /// unshared node with room for the copied slots.
    pub(super) fn extend_slots(&mut self, source: &Self, range: Range<usize>) {
        debug_assert_eq!(self.height(), source.height());
        match (self, source) {
            (Self::Leaf(target), Self::Leaf(source)) => {
                target.extend(source[range].iter().cloned());
            }
            (Self::Branch(target), Self::Branch(source)) => {
                for child in &source.children[range] {
                    target.push_child(child.clone());
                }
            }
            _ => {}
        }
    }
}

// =============================================================================
// Invariant Checks
// =============================================================================

#[cfg(test)]
impl<T> Node<T> {
    /// Verifies uniform height, non-empty children and a consistent size
    /// table for the whole subtree.
    pub(super) fn check_invariants(&self) -> Result<(), String> {
        let Self::Branch(branch) = self else {
            return Ok(());
        };
        if branch.height == 0 {
            return Err("branch with height 0".to_string());
        }
        if branch.children.len() != branch.lengths.len() {
            return Err(format!(
                "{} children but {} lengths at height {}",
                branch.children.len(),
                branch.lengths.len(),
                branch.height
            ));
        }
        let mut total = 0;
        for (slot, child) in branch.children.iter().enumerate() {
            if child.height() + 1 != branch.height {
                return Err(format!(
                    "child of height {} under a branch of height {}",
                    child.height(),
                    branch.height
                ));
            }
            if child.is_empty() {
                return Err(format!("empty child at slot {slot}, height {}", branch.height));
            }
            total += child.len();
            if branch.lengths[slot] != total {
                return Err(format!(
                    "lengths[{slot}] = {} but children hold {total}",
                    branch.lengths[slot]
                ));
            }
            child.check_invariants()?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
