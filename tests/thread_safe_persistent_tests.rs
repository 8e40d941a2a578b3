//! Integration tests for sharing `PersistentVector` across threads.
//!
//! With the `arc` feature enabled, nodes are reference counted with `Arc`,
//! so vectors can be moved and shared across threads while every version
//! stays intact.

#![cfg(feature = "arc")]
#![allow(clippy::cast_possible_wrap)]

use relaxed_vector::persistent::PersistentVector;
use rstest::rstest;
use std::sync::Arc;
use std::thread;

#[rstest]
fn test_vector_cross_thread_structural_sharing() {
    let original: Arc<PersistentVector<usize>> = Arc::new((0..100).collect());

    let handles: Vec<_> = (0..4)
        .map(|index| {
            let vector_clone = Arc::clone(&original);
            thread::spawn(move || {
                let modified = vector_clone.set(index * 10, 999);
                assert_eq!(modified.get(index * 10), Ok(&999));
                assert_eq!(vector_clone.get(index * 10), Ok(&(index * 10)));
                modified
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect();

    for (index, vector) in results.iter().enumerate() {
        assert_eq!(vector.get(index * 10), Ok(&999));
        let expected_first = if index == 0 { 999 } else { 0 };
        assert_eq!(vector.get(0), Ok(&expected_first));
    }

    assert!(original.iter().copied().eq(0..100));
}

#[rstest]
fn test_threads_append_to_shared_prefix() {
    let prefix: PersistentVector<usize> = (0..1000).collect();

    let handles: Vec<_> = (0..4)
        .map(|index| {
            let prefix = prefix.clone();
            thread::spawn(move || {
                let start = 1000 + index * 100;
                let suffix: PersistentVector<usize> = (start..start + 100).collect();
                prefix.append(&suffix)
            })
        })
        .collect();

    for (index, handle) in handles.into_iter().enumerate() {
        let joined = handle.join().expect("Thread panicked");
        assert_eq!(joined.len(), 1100);
        assert_eq!(joined.get(999), Ok(&999));
        assert_eq!(joined.get(1000), Ok(&(1000 + index * 100)));
    }
    assert_eq!(prefix.len(), 1000);
}

#[rstest]
fn test_slices_read_concurrently() {
    let vector: Arc<PersistentVector<usize>> = Arc::new((0..10_000).collect());

    let sums: Vec<usize> = (0..8)
        .map(|chunk| {
            let vector = Arc::clone(&vector);
            thread::spawn(move || {
                let from = chunk * 1250;
                vector
                    .slice(from as isize, (from + 1250) as isize)
                    .fold_left(0, |sum, element| sum + element)
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect();

    assert_eq!(sums.iter().sum::<usize>(), (0..10_000).sum());
}
