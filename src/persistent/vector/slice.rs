//! Left and right trimming of trees.
//!
//! Both trims keep the height of the node they are given so the result can
//! be stored back into a parent. Height reduction happens once, at the root,
//! after both trims (see [`Node::collapse`]).

use std::iter;

use super::super::ReferenceCounter;
use super::node::{Branch, Link, Node};

/// Keeps the first `to` elements of `node`.
pub(super) fn slice_right<T: Clone>(node: &Link<T>, to: usize) -> Link<T> {
    if to >= node.len() {
        return node.clone();
    }

    match node.as_ref() {
        Node::Leaf(elements) => {
            ReferenceCounter::new(Node::Leaf(elements[..to].iter().cloned().collect()))
        }
        Node::Branch(branch) => {
            let slot = branch.slot_for(to);
            let mut trimmed = Branch {
                height: branch.height,
                children: branch.children[..slot].iter().cloned().collect(),
                lengths: branch.lengths[..slot].iter().copied().collect(),
            };
            let child = slice_right(&branch.children[slot], to - branch.offset_of(slot));
            if !child.is_empty() {
                trimmed.push_child(child);
            }
            ReferenceCounter::new(Node::Branch(trimmed))
        }
    }
}

/// Drops the first `from` elements of `node`.
pub(super) fn slice_left<T: Clone>(node: &Link<T>, from: usize) -> Link<T> {
    if from == 0 {
        return node.clone();
    }
    if from >= node.len() {
        return ReferenceCounter::new(Node::empty(node.height()));
    }

    match node.as_ref() {
        Node::Leaf(elements) => {
            ReferenceCounter::new(Node::Leaf(elements[from..].iter().cloned().collect()))
        }
        Node::Branch(branch) => {
            let slot = branch.slot_for(from);
            let child = slice_left(&branch.children[slot], from - branch.offset_of(slot));
            let retained = branch.children[slot + 1..].iter().cloned();
            ReferenceCounter::new(Node::Branch(Branch::from_children(
                branch.height,
                iter::once(child).chain(retained),
            )))
        }
    }
}
