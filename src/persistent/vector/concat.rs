//! Concatenation with bounded rebalancing.
//!
//! Two trees are merged along their boundary: the right spine of the left
//! tree and the left spine of the right tree. At each level the two boundary
//! nodes may end up with too many under-full children, which would make the
//! forward scan in [`Branch::slot_for`](super::node::Branch::slot_for) long.
//! When the number of surplus slots exceeds [`SEARCH_STEP_SLACK`], the
//! children are repacked by [`shuffle`].

use std::cmp::Ordering;
use std::mem;

use smallvec::SmallVec;
use tracing::trace;

use super::super::ReferenceCounter;
use super::node::{BRANCHING_FACTOR, Branch, Link, Node, SEARCH_STEP_SLACK};

/// The children of two sibling nodes, addressed as one sequence.
type SlotSequence<'a, T> = SmallVec<[&'a Link<T>; 2 * BRANCHING_FACTOR]>;

/// Concatenates two trees.
pub(super) fn append<T: Clone>(left: &Link<T>, right: &Link<T>) -> Link<T> {
    if left.len() == 0 {
        return right.clone();
    }
    if right.len() == 0 {
        return left.clone();
    }

    let (mut left, mut right) = append_pair(left.clone(), right.clone());

    if left.slot_count() + right.slot_count() <= BRANCHING_FACTOR {
        if left.is_empty() {
            return right;
        }
        if right.is_empty() {
            return left;
        }
        return ReferenceCounter::new(join(&left, &right));
    }

    let height = left.height();
    if height > 0 {
        let excess = excess_slots(&left, &right);
        if excess > SEARCH_STEP_SLACK {
            (left, right) = shuffle(&left, &right, excess);
        }
    }
    if right.is_empty() {
        return left;
    }

    trace!(height = height + 1, "concatenation grew the tree by one level");
    ReferenceCounter::new(Node::siblise(left, right))
}

/// Merges the boundary of two trees, returning two roots of equal height
/// whose concatenated contents equal `left ++ right`. Either root may come
/// back empty when all of its contents moved to the other side.
fn append_pair<T: Clone>(left: Link<T>, right: Link<T>) -> (Link<T>, Link<T>) {
    let left_height = left.height();
    let right_height = right.height();
    if left_height == 0 && right_height == 0 {
        return (left, right);
    }

    let (left, right) = match left_height.cmp(&right_height) {
        Ordering::Equal if left_height == 1 => (left, right),
        Ordering::Equal => {
            let (Some(left_edge), Some(right_edge)) =
                (left.last_child().cloned(), right.first_child().cloned())
            else {
                return (left, right);
            };
            let (merged_left, merged_right) = append_pair(left_edge, right_edge);
            (
                insert_right(&left, merged_left),
                insert_left(&right, merged_right),
            )
        }
        Ordering::Greater => {
            let Some(left_edge) = left.last_child().cloned() else {
                return (left, right);
            };
            let (merged_left, merged_right) = append_pair(left_edge, right);
            (
                insert_right(&left, merged_left),
                lift(merged_right, left_height),
            )
        }
        Ordering::Less => {
            let Some(right_edge) = right.first_child().cloned() else {
                return (left, right);
            };
            let (merged_left, merged_right) = append_pair(left, right_edge);
            (
                lift(merged_left, right_height),
                insert_left(&right, merged_right),
            )
        }
    };

    if left.is_empty() || right.is_empty() {
        return (left, right);
    }
    let excess = excess_slots(&left, &right);
    if excess <= SEARCH_STEP_SLACK {
        (left, right)
    } else {
        shuffle(&left, &right, excess)
    }
}

/// Raises a boundary result to `height`; an empty result stays empty.
fn lift<T>(node: Link<T>, height: usize) -> Link<T> {
    if node.is_empty() {
        ReferenceCounter::new(Node::empty(height))
    } else {
        Node::parentise(node, height)
    }
}

/// How many slots of `left` and `right` could be eliminated by packing
/// their children densely.
pub(super) fn excess_slots<T>(left: &Node<T>, right: &Node<T>) -> usize {
    let grandchildren: usize = left
        .children()
        .iter()
        .chain(right.children())
        .map(|child| child.slot_count())
        .sum();
    let minimum = grandchildren.div_ceil(BRANCHING_FACTOR);
    (left.slot_count() + right.slot_count()).saturating_sub(minimum)
}

/// Repacks the children of two same-height branches so that at least
/// `to_remove` slots disappear.
///
/// Leading full children are shared untouched. Subsequent children are
/// poured into fresh nodes of capacity [`BRANCHING_FACTOR`] until enough
/// slots have been eliminated, and the remaining children are shared again.
/// The first [`BRANCHING_FACTOR`] resulting children form the new left
/// node; the rest (possibly none) form the new right node.
pub(super) fn shuffle<T: Clone>(
    left: &Node<T>,
    right: &Node<T>,
    to_remove: usize,
) -> (Link<T>, Link<T>) {
    let height = left.height();
    debug_assert!(height > 0);
    debug_assert_eq!(height, right.height());
    trace!(height, excess = to_remove, "rebalancing concatenated nodes");

    let sources: SlotSequence<'_, T> = left.children().iter().chain(right.children()).collect();
    let total = sources.len();
    let mut slots: SmallVec<[Link<T>; 2 * BRANCHING_FACTOR]> = SmallVec::with_capacity(total);

    let mut read = 0;
    while read < total && sources[read].slot_count() == BRANCHING_FACTOR {
        slots.push(ReferenceCounter::clone(sources[read]));
        read += 1;
    }

    let mut buffer = Node::empty(height - 1);
    let mut offset = 0;
    while read < total && eliminated(read, slots.len(), &buffer) < to_remove {
        let source = sources[read];
        let take = (source.slot_count() - offset).min(BRANCHING_FACTOR - buffer.slot_count());
        buffer.extend_slots(source, offset..offset + take);
        offset += take;
        if offset == source.slot_count() {
            read += 1;
            offset = 0;
        }
        if buffer.slot_count() == BRANCHING_FACTOR {
            let full = mem::replace(&mut buffer, Node::empty(height - 1));
            slots.push(ReferenceCounter::new(full));
        }
    }

    // A child split by the last flush still owes its tail.
    if offset > 0 {
        let source = sources[read];
        buffer.extend_slots(source, offset..source.slot_count());
        read += 1;
    }
    if !buffer.is_empty() {
        slots.push(ReferenceCounter::new(buffer));
    }
    slots.extend(sources[read..].iter().map(|source| ReferenceCounter::clone(source)));

    let split = slots.len().min(BRANCHING_FACTOR);
    let right_children: SmallVec<[Link<T>; BRANCHING_FACTOR]> = slots.drain(split..).collect();
    (
        ReferenceCounter::new(Node::Branch(Branch::from_children(height, slots))),
        ReferenceCounter::new(Node::Branch(Branch::from_children(height, right_children))),
    )
}

/// Slots saved so far: children consumed minus nodes produced, counting a
/// partially filled buffer as one produced node.
fn eliminated<T>(read: usize, written: usize, buffer: &Node<T>) -> usize {
    read.saturating_sub(written + usize::from(!buffer.is_empty()))
}

/// Replaces the last child of `parent`, dropping the slot when `child` is empty.
fn insert_right<T>(parent: &Link<T>, child: Link<T>) -> Link<T> {
    let Node::Branch(branch) = parent.as_ref() else {
        return parent.clone();
    };
    let mut copy = branch.clone();
    copy.children.pop();
    copy.lengths.pop();
    if !child.is_empty() {
        copy.push_child(child);
    }
    ReferenceCounter::new(Node::Branch(copy))
}

/// Replaces the first child of `parent`, dropping the slot when `child` is
/// empty. The size table is rebuilt since every cumulative length shifts.
fn insert_left<T>(parent: &Link<T>, child: Link<T>) -> Link<T> {
    let Node::Branch(branch) = parent.as_ref() else {
        return parent.clone();
    };
    let head = (!child.is_empty()).then_some(child);
    let tail = branch.children.iter().skip(1).cloned();
    ReferenceCounter::new(Node::Branch(Branch::from_children(
        branch.height,
        head.into_iter().chain(tail),
    )))
}

/// Merges two same-height nodes whose slots fit in one node.
fn join<T: Clone>(left: &Node<T>, right: &Node<T>) -> Node<T> {
    let mut merged = left.clone();
    merged.extend_slots(right, 0..right.slot_count());
    merged
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::build::build_balanced;
    use super::*;
    use rstest::rstest;

    fn leaf(range: std::ops::Range<usize>) -> Link<usize> {
        ReferenceCounter::new(Node::Leaf(range.collect()))
    }

    fn tree(range: std::ops::Range<usize>) -> Link<usize> {
        let length = range.len();
        build_balanced(&mut range.into_iter(), length)
    }

    fn contents(node: &Node<usize>) -> Vec<usize> {
        (0..node.len()).filter_map(|index| node.lookup(index).copied()).collect()
    }

    /// A height-1 branch whose leaves hold the given numbers of elements,
    /// numbered consecutively from `start`.
    fn branch_of(start: usize, sizes: &[usize]) -> Link<usize> {
        let mut next = start;
        let leaves = sizes.iter().map(|size| {
            let node = leaf(next..next + size);
            next += size;
            node
        });
        ReferenceCounter::new(Node::Branch(Branch::from_children(1, leaves.collect::<Vec<_>>())))
    }

    #[rstest]
    fn test_excess_slots_counts_surplus() {
        let left = branch_of(0, &[32, 1, 1]);
        let right = branch_of(34, &[1, 1]);
        // 36 elements need 2 leaves; 5 are in use.
        assert_eq!(excess_slots(&left, &right), 3);
    }

    #[rstest]
    fn test_excess_slots_zero_when_dense() {
        let left = branch_of(0, &[32, 32]);
        let right = branch_of(64, &[32, 5]);
        assert_eq!(excess_slots(&left, &right), 0);
    }

    #[rstest]
    fn test_shuffle_packs_and_shares_full_prefix() {
        let left = branch_of(0, &[32, 1, 1]);
        let right = branch_of(34, &[1, 1]);
        let (packed_left, packed_right) = shuffle(&left, &right, 3);

        assert_eq!(packed_left.slot_count(), 2);
        assert!(packed_right.is_empty());
        assert!(ReferenceCounter::ptr_eq(&packed_left.children()[0], &left.children()[0]));
        assert!(packed_left.check_invariants().is_ok());
        assert_eq!(contents(&packed_left), (0..36).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_shuffle_splits_a_child_across_buffers() {
        let left = branch_of(0, &[20, 20, 20]);
        let right = branch_of(60, &[20, 20]);
        let excess = excess_slots(&left, &right);
        assert_eq!(excess, 1);

        let (packed_left, packed_right) = shuffle(&left, &right, excess);
        assert!(packed_left.check_invariants().is_ok());
        assert!(packed_right.check_invariants().is_ok());
        assert_eq!(packed_left.slot_count() + packed_right.slot_count(), 4);

        let mut combined = contents(&packed_left);
        combined.extend(contents(&packed_right));
        assert_eq!(combined, (0..100).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_shuffle_overflows_into_right_node() {
        let sizes = [31; 24];
        let left = branch_of(0, &sizes);
        let right = branch_of(31 * 24, &sizes);
        let excess = excess_slots(&left, &right);
        let (packed_left, packed_right) = shuffle(&left, &right, excess);

        assert_eq!(packed_left.slot_count(), BRANCHING_FACTOR);
        assert!(!packed_right.is_empty());
        assert!(
            packed_left.slot_count() + packed_right.slot_count() <= 48 - excess,
            "at least {excess} slots must be eliminated"
        );
        let mut combined = contents(&packed_left);
        combined.extend(contents(&packed_right));
        assert_eq!(combined, (0..31 * 48).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_insert_left_drops_empty_child() {
        let parent = branch_of(0, &[3, 4, 5]);
        let updated = insert_left(&parent, ReferenceCounter::new(Node::empty_leaf()));
        assert_eq!(updated.slot_count(), 2);
        assert_eq!(updated.len(), 9);
        assert!(updated.check_invariants().is_ok());
    }

    #[rstest]
    fn test_insert_right_replaces_last_child() {
        let parent = branch_of(0, &[3, 4]);
        let updated = insert_right(&parent, leaf(100..110));
        assert_eq!(updated.len(), 13);
        assert_eq!(updated.lookup(3), Some(&100));
        assert!(updated.check_invariants().is_ok());
    }

    #[rstest]
    #[case(40, 40)]
    #[case(1, 2000)]
    #[case(2000, 1)]
    #[case(33, 33)]
    #[case(1500, 40_000)]
    #[case(32, 32)]
    fn test_append_preserves_contents(#[case] left_length: usize, #[case] right_length: usize) {
        let left = tree(0..left_length);
        let right = tree(left_length..left_length + right_length);
        let joined = append(&left, &right);

        assert_eq!(joined.len(), left_length + right_length);
        assert!(joined.check_invariants().is_ok());
        assert_eq!(contents(&joined), (0..left_length + right_length).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_append_pair_returns_balanced_pair() {
        let left = branch_of(0, &[32, 1, 1, 1]);
        let right = branch_of(35, &[1, 1, 1, 32]);
        let (merged_left, merged_right) = append_pair(left, right);
        assert_eq!(merged_left.height(), merged_right.height());
        assert!(excess_slots(&merged_left, &merged_right) <= SEARCH_STEP_SLACK);
    }

    #[rstest]
    fn test_repeated_append_triggers_rebalance() {
        // Each piece is one full leaf plus a single-element leaf; gluing them
        // together accumulates under-full leaves until a shuffle is forced.
        let mut joined = tree(0..0);
        for piece in 0..8 {
            let start = piece * 33;
            joined = append(&joined, &tree(start..start + 33));
            assert!(joined.check_invariants().is_ok());
        }
        assert_eq!(contents(&joined), (0..8 * 33).collect::<Vec<_>>());
        assert!(joined.slot_count() < 16, "shuffle should have packed the single-element leaves");
    }
}
