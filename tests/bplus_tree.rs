use std::collections::{BTreeMap, BTreeSet};

use bplus_index::{BPlusTree, Degree, Error};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// The number of operations to perform in each proptest case.
const TEST_SIZE: usize = 2_000;

/// Keys drawn from a range narrower than `TEST_SIZE` so that inserts collide.
fn key_strategy() -> impl Strategy<Value = i64> {
    -1_000i64..1_000i64
}

fn degree_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(3usize), Just(4), Just(5), Just(8), Just(16), 3usize..=64]
}

// ─── Operations enum for driving randomized tests ────────────────────────────

#[derive(Debug, Clone)]
enum TreeOp {
    Insert(i64, i64),
    Delete(i64),
    Search(i64),
    ContainsKey(i64),
    Range(i64, i64),
}

fn tree_op_strategy() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        5 => (key_strategy(), any::<i64>()).prop_map(|(k, v)| TreeOp::Insert(k, v)),
        3 => key_strategy().prop_map(TreeOp::Delete),
        2 => key_strategy().prop_map(TreeOp::Search),
        1 => key_strategy().prop_map(TreeOp::ContainsKey),
        1 => (key_strategy(), key_strategy()).prop_map(|(lo, hi)| TreeOp::Range(lo, hi)),
    ]
}

fn build(degree: usize, keys: impl IntoIterator<Item = i64>) -> BPlusTree<i64, i64> {
    let mut tree = BPlusTree::new(degree).unwrap();
    for key in keys {
        tree.insert(key, key.wrapping_mul(7));
    }
    tree
}

// ─── Model-based properties ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Replays a random sequence of operations on both `BPlusTree` and `BTreeMap` and asserts
    /// identical observable results at every step.
    #[test]
    fn ops_match_btreemap(
        degree in degree_strategy(),
        ops in proptest::collection::vec(tree_op_strategy(), TEST_SIZE),
    ) {
        let mut tree: BPlusTree<i64, i64> = BPlusTree::new(degree).unwrap();
        let mut model: BTreeMap<i64, i64> = BTreeMap::new();

        for op in &ops {
            match *op {
                TreeOp::Insert(k, v) => {
                    let expected = !model.contains_key(&k);
                    model.entry(k).or_insert(v);
                    prop_assert_eq!(tree.insert(k, v), expected, "insert({}, {})", k, v);
                }
                TreeOp::Delete(k) => {
                    prop_assert_eq!(tree.delete(&k), model.remove(&k).is_some(), "delete({})", k);
                }
                TreeOp::Search(k) => {
                    prop_assert_eq!(tree.search(&k), model.get(&k), "search({})", k);
                }
                TreeOp::ContainsKey(k) => {
                    prop_assert_eq!(tree.contains_key(&k), model.contains_key(&k), "contains_key({})", k);
                }
                TreeOp::Range(lo, hi) => {
                    let actual: Vec<_> = tree.range(&lo, &hi).collect();
                    let expected: Vec<_> = if lo <= hi { model.range(lo..=hi).collect() } else { Vec::new() };
                    prop_assert_eq!(actual, expected, "range({}, {})", lo, hi);
                }
            }
            prop_assert_eq!(tree.len(), model.len(), "len mismatch after {:?}", op);
            prop_assert_eq!(tree.is_empty(), model.is_empty(), "is_empty mismatch after {:?}", op);
        }

        let keys: Vec<_> = tree.keys().copied().collect();
        let expected: Vec<_> = model.keys().copied().collect();
        prop_assert_eq!(&keys, &expected);
    }

    /// Every distinct inserted key comes back in strictly ascending order, once.
    #[test]
    fn ordered_keys_are_sorted_and_unique(
        degree in degree_strategy(),
        keys in proptest::collection::vec(key_strategy(), 0..TEST_SIZE),
    ) {
        let tree = build(degree, keys.iter().copied());
        let distinct: BTreeSet<i64> = keys.iter().copied().collect();

        let ordered = tree.ordered_keys();
        prop_assert!(ordered.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert_eq!(ordered, distinct.iter().copied().collect::<Vec<_>>());
        prop_assert_eq!(tree.len(), distinct.len());
    }

    /// Every inserted key can be found with its first value; deleted keys cannot.
    #[test]
    fn round_trip(
        degree in degree_strategy(),
        keys in proptest::collection::btree_set(key_strategy(), 0..500),
        deleted in proptest::collection::btree_set(key_strategy(), 0..500),
    ) {
        let mut tree = build(degree, keys.iter().copied());
        for key in &keys {
            prop_assert_eq!(tree.search(key), Some(&key.wrapping_mul(7)));
        }

        for key in &deleted {
            prop_assert_eq!(tree.delete(key), keys.contains(key));
        }
        for key in &keys {
            let expected = (!deleted.contains(key)).then(|| key.wrapping_mul(7));
            prop_assert_eq!(tree.search(key).copied(), expected);
        }
    }

    /// A successful insert grows the tree by exactly one, a successful delete shrinks it by one
    /// and rejected operations leave it alone.
    #[test]
    fn cardinality_tracks_successful_operations(
        degree in degree_strategy(),
        ops in proptest::collection::vec((any::<bool>(), key_strategy()), 0..TEST_SIZE),
    ) {
        let mut tree = build(degree, []);
        for (insert, key) in ops {
            let before = tree.len();
            if insert {
                let added = tree.insert(key, 0);
                prop_assert_eq!(tree.len(), before + usize::from(added));
            } else {
                let removed = tree.delete(&key);
                prop_assert_eq!(tree.len(), before - usize::from(removed));
            }
        }
    }

    /// `range(lo, hi)` equals filtering the full key list to `lo <= k <= hi`.
    #[test]
    fn range_matches_filter(
        degree in degree_strategy(),
        keys in proptest::collection::vec(key_strategy(), 0..TEST_SIZE),
        lo in key_strategy(),
        hi in key_strategy(),
    ) {
        let tree = build(degree, keys);
        let ranged: Vec<i64> = tree.range(&lo, &hi).map(|(k, _)| *k).collect();
        let filtered: Vec<i64> = tree.keys().copied().filter(|k| lo <= *k && *k <= hi).collect();
        prop_assert_eq!(ranged, filtered);
    }

    /// The breadth-first structural dump agrees with the leaf chain after inserts and deletes.
    #[test]
    fn structural_dump_matches_chain(
        degree in degree_strategy(),
        keys in proptest::collection::vec(key_strategy(), 0..TEST_SIZE),
        deleted in proptest::collection::vec(key_strategy(), 0..TEST_SIZE),
    ) {
        let mut tree = build(degree, keys);
        for key in &deleted {
            tree.delete(key);
        }
        let chain: Vec<&i64> = tree.keys().collect();
        prop_assert_eq!(tree.structural_keys(), chain);

        // Every leaf sits on the last level.
        let levels = tree.levels();
        prop_assert_eq!(levels.len(), tree.height());
        if let Some(leaves) = levels.last() {
            prop_assert_eq!(leaves.iter().map(|keys| keys.len()).sum::<usize>(), tree.len());
        }
    }
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn degree_three_insert_sequence() {
    let mut tree = BPlusTree::new(3).unwrap();

    tree.insert(10, ());
    tree.insert(20, ());
    assert_eq!(tree.height(), 1);

    // The third insert overflows the root leaf.
    tree.insert(5, ());
    assert_eq!(tree.height(), 2);

    for key in [6, 12, 30, 7, 17] {
        assert!(tree.insert(key, ()));
    }
    assert_eq!(tree.ordered_keys(), [5, 6, 7, 10, 12, 17, 20, 30]);
    assert_eq!(tree.len(), 8);
}

#[test]
fn empty_tree_behaviour() {
    let mut tree: BPlusTree<i32, i32> = BPlusTree::new(3).unwrap();
    assert!(!tree.delete(&42));
    assert_eq!(tree.search(&42), None);
    assert_eq!(tree.len(), 0);
    assert!(tree.ordered_keys().is_empty());
    assert!(tree.structural_keys().is_empty());
    assert!(tree.levels().is_empty());
    assert_eq!(tree.range(&i32::MIN, &i32::MAX).count(), 0);
}

#[test]
fn random_keys_insert_then_delete_all() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut keys: Vec<u64> = (0..1 << 10).map(|_| rng.gen_range(0..1u64 << 40)).collect();
    keys.sort_unstable();
    keys.dedup();

    let mut tree = BPlusTree::new(3).unwrap();
    keys.shuffle(&mut rng);
    for &key in &keys {
        assert!(tree.insert(key, !key));
    }
    assert_eq!(tree.len(), keys.len());

    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(tree.ordered_keys(), sorted);

    keys.shuffle(&mut rng);
    for (deleted, key) in keys.iter().enumerate() {
        assert_eq!(tree.search(key), Some(&!key));
        assert!(tree.delete(key));
        assert_eq!(tree.search(key), None);
        assert_eq!(tree.len(), keys.len() - deleted - 1);
    }

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
}

#[test]
fn range_after_deleting_from_the_middle() {
    let mut tree = build(4, 1..=20);
    assert!(tree.delete(&10));
    assert!(tree.delete(&11));

    let keys: Vec<i64> = tree.range(&5, &15).map(|(k, _)| *k).collect();
    assert_eq!(keys, [5, 6, 7, 8, 9, 12, 13, 14, 15]);
}

#[test]
fn degree_two_is_rejected() {
    assert_eq!(
        BPlusTree::<i64, i64>::new(2).err(),
        Some(Error::InvalidDegree { degree: 2, min: 3 })
    );
    assert!(BPlusTree::<i64, i64>::new(0).is_err());
    assert!(BPlusTree::<i64, i64>::new(3).is_ok());
}

#[test]
fn with_degree_and_default() {
    let tree: BPlusTree<u8, u8> = BPlusTree::with_degree(Degree::new(7).unwrap());
    assert_eq!(tree.degree().get(), 7);

    let tree: BPlusTree<u8, u8> = BPlusTree::default();
    assert_eq!(tree.degree(), Degree::DEFAULT);
}

#[test]
fn duplicate_insert_keeps_first_value() {
    let mut tree = BPlusTree::new(3).unwrap();
    assert!(tree.insert("k", 1));
    assert!(!tree.insert("k", 2));
    assert_eq!(tree.search(&"k"), Some(&1));
    assert_eq!(tree.len(), 1);
}

#[test]
fn clear_then_reuse() {
    let mut tree = build(5, 0..500);
    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.search(&3), None);

    tree.extend((0..10).map(|k| (k, k)));
    assert_eq!(tree.ordered_keys(), (0..10).collect::<Vec<_>>());
}

#[test]
fn iterate_by_reference() {
    let tree = build(3, [3, 1, 2]);
    let mut seen = Vec::new();
    for (key, value) in &tree {
        seen.push((*key, *value));
    }
    assert_eq!(seen, [(1, 7), (2, 14), (3, 21)]);
}

#[test]
fn height_grows_logarithmically() {
    let tree = build(16, 0..10_000);
    // min fill 7 gives a branching factor of at least 8 below the root.
    assert!(tree.height() <= 6, "height {}", tree.height());
    assert!(tree.height() >= 3);
}
