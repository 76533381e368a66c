use core::borrow::Borrow;
use core::hash::Hash;
use std::collections::{HashSet, VecDeque};

use super::arena::Arena;
use super::handle::Handle;
use super::node::{InternalNode, LeafNode, Node};
use crate::degree::Degree;

/// The core B+ tree implementation backing `BPlusTree`.
#[derive(Clone)]
pub(crate) struct RawBPlusTree<K, V> {
    /// Arena storing all tree nodes.
    nodes: Arena<Node<K>>,
    /// Arena storing all values, referenced from leaf entries.
    values: Arena<V>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
    degree: Degree,
    /// Every live key, kept in step with the leaves for O(1) membership checks.
    key_set: HashSet<K>,
}

/// Where a root-to-leaf descent for a key ended.
struct Descent {
    leaf: Handle,
    /// The deepest internal node that holds the searched key as a separator.
    witness: Option<Handle>,
}

/// A node's place among its parent's entries.
struct Siblings {
    parent: Handle,
    /// Entry index of the node in `parent`; `parent.size()` means the sentinel entry.
    index: usize,
    left: Option<Handle>,
    right: Option<Handle>,
}

/// Position of a record in the leaf chain. `None` is the position past the last record.
pub(crate) type Cursor = Option<(Handle, usize)>;

impl<K, V> RawBPlusTree<K, V> {
    /// Creates a new, empty tree.
    pub(crate) fn new(degree: Degree) -> Self {
        Self {
            nodes: Arena::new(),
            values: Arena::new(),
            root: None,
            degree,
            key_set: HashSet::new(),
        }
    }

    pub(crate) const fn degree(&self) -> Degree {
        self.degree
    }

    /// Returns the number of live keys.
    pub(crate) fn len(&self) -> usize {
        self.key_set.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Drops every node and value.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.values.clear();
        self.key_set.clear();
        self.root = None;
    }

    /// Returns a reference to a node by handle.
    pub(crate) fn node(&self, handle: Handle) -> &Node<K> {
        self.nodes.get(handle)
    }

    /// Returns the record at a chain position.
    pub(crate) fn entry(&self, leaf: Handle, index: usize) -> (&K, &V) {
        let leaf = self.nodes.get(leaf).as_leaf();
        (leaf.key(index), self.values.get(leaf.value(index)))
    }

    /// Returns the leftmost leaf, found by following least children down from the root.
    pub(crate) fn first_leaf(&self) -> Option<Handle> {
        let mut current = self.root?;
        while let Node::Internal(internal) = self.nodes.get(current) {
            current = internal.min_child();
        }
        Some(current)
    }

    /// Returns the cursor of the smallest record.
    pub(crate) fn first(&self) -> Cursor {
        self.settle(self.first_leaf()?, 0)
    }

    /// Returns the cursor of the greatest record, reached through sentinel children.
    pub(crate) fn last(&self) -> Cursor {
        let mut current = self.root?;
        while let Node::Internal(internal) = self.nodes.get(current) {
            current = internal.max_child();
        }
        let size = self.nodes.get(current).size();
        size.checked_sub(1).map(|index| (current, index))
    }

    /// Normalizes `(leaf, index)` so that it names an actual record, stepping along the chain
    /// when `index` runs off the end of `leaf`.
    pub(crate) fn settle(&self, mut leaf: Handle, mut index: usize) -> Cursor {
        loop {
            let node = self.nodes.get(leaf).as_leaf();
            if index < node.size() {
                return Some((leaf, index));
            }
            leaf = node.next()?;
            index = 0;
        }
    }

    /// Number of levels; 0 for an empty tree.
    pub(crate) fn height(&self) -> usize {
        let Some(mut current) = self.root else {
            return 0;
        };
        let mut height = 1;
        while let Node::Internal(internal) = self.nodes.get(current) {
            current = internal.min_child();
            height += 1;
        }
        height
    }

    /// Every node in breadth-first order, grouped by depth.
    pub(crate) fn levels(&self) -> Vec<Vec<Handle>> {
        let mut levels: Vec<Vec<Handle>> = Vec::new();
        let mut queue: VecDeque<(Handle, usize)> = self.root.map(|root| (root, 0)).into_iter().collect();

        while let Some((handle, depth)) = queue.pop_front() {
            if levels.len() == depth {
                levels.push(Vec::new());
            }
            levels[depth].push(handle);
            if let Node::Internal(internal) = self.nodes.get(handle) {
                queue.extend(internal.children().iter().map(|&child| (child, depth + 1)));
            }
        }

        levels
    }

    /// Collects leaf keys by visiting every node breadth first, without using the leaf chain.
    pub(crate) fn structural_keys(&self) -> Vec<&K> {
        let mut keys = Vec::with_capacity(self.len());
        let mut queue: VecDeque<Handle> = self.root.into_iter().collect();

        while let Some(handle) = queue.pop_front() {
            match self.nodes.get(handle) {
                Node::Internal(internal) => queue.extend(internal.children().iter().copied()),
                Node::Leaf(leaf) => keys.extend(leaf.keys()),
            }
        }

        keys
    }

    /// Follows the descent rule from `root`: at each internal node take the first entry whose key
    /// is strictly greater than `key`. Equal separators are remembered as the boundary witness.
    fn descend_from<Q>(&self, root: Handle, key: &Q) -> Descent
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = root;
        let mut witness = None;

        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => {
                    let (index, exact) = internal.route(key);
                    if exact {
                        witness = Some(current);
                    }
                    current = internal.child(index);
                }
                Node::Leaf(_) => return Descent { leaf: current, witness },
            }
        }
    }

    fn descend<Q>(&self, key: &Q) -> Option<Descent>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        Some(self.descend_from(self.root?, key))
    }

    fn siblings(&self, node: Handle) -> Option<Siblings> {
        let parent = self.nodes.get(node).parent()?;
        let entries = self.nodes.get(parent).as_internal();
        let index = entries
            .locate_child(node)
            .expect("`RawBPlusTree::siblings()` - node is missing from its parent!");
        let left = index.checked_sub(1).map(|i| entries.child(i));
        let right = (index < entries.size()).then(|| entries.child(index + 1));
        Some(Siblings {
            parent,
            index,
            left,
            right,
        })
    }

    /// Points every child of `node` back at it.
    fn adopt_children(&mut self, node: Handle) {
        for index in 0..self.nodes.get(node).as_internal().children().len() {
            let child = self.nodes.get(node).as_internal().child(index);
            self.nodes.get_mut(child).set_parent(Some(node));
        }
    }
}

impl<K: Ord + Hash + Clone, V> RawBPlusTree<K, V> {
    /// Returns a reference to the value corresponding to the key.
    pub(crate) fn search<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let Descent { leaf, .. } = self.descend(key)?;
        let leaf = self.nodes.get(leaf).as_leaf();
        let index = leaf.locate(key)?;
        Some(self.values.get(leaf.value(index)))
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub(crate) fn search_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let Descent { leaf, .. } = self.descend(key)?;
        let leaf = self.nodes.get(leaf).as_leaf();
        let value = leaf.value(leaf.locate(key)?);
        Some(self.values.get_mut(value))
    }

    /// Answers membership from the key index without touching the tree.
    pub(crate) fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.key_set.contains(key)
    }

    /// Cursor of the first record with a key `>= key`.
    pub(crate) fn lower_bound<Q>(&self, key: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let Descent { leaf, .. } = self.descend(key)?;
        let index = self.nodes.get(leaf).as_leaf().lower_bound(key);
        self.settle(leaf, index)
    }

    /// Cursor of the first record with a key `> key`.
    pub(crate) fn upper_bound<Q>(&self, key: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let Descent { leaf, .. } = self.descend(key)?;
        let index = self.nodes.get(leaf).as_leaf().upper_bound(key);
        self.settle(leaf, index)
    }

    /// Inserts a key-value pair. Returns `false`, leaving the tree untouched, if the key is
    /// already present.
    pub(crate) fn insert(&mut self, key: K, value: V) -> bool {
        if self.key_set.contains(&key) {
            return false;
        }

        let root = match self.root {
            Some(root) => root,
            None => {
                let root = self.nodes.alloc(Node::Leaf(LeafNode::new()));
                self.root = Some(root);
                root
            }
        };

        let Descent { leaf, .. } = self.descend_from(root, &key);
        let value = self.values.alloc(value);
        self.key_set.insert(key.clone());

        let node = self.nodes.get_mut(leaf).as_leaf_mut();
        node.add(key, value);
        if node.size() == self.degree.get() {
            self.split(leaf);
        }

        true
    }

    /// Splits `node` and every ancestor that overflows in turn.
    fn split(&mut self, node: Handle) {
        let mut current = node;

        while self.nodes.get(current).size() >= self.degree.get() {
            let parent = self.parent_or_grow_root(current);
            let mid = self.nodes.get(current).size() / 2;
            let is_leaf = self.nodes.get(current).is_leaf();

            let (separator, sibling) = if is_leaf {
                self.split_leaf(current, mid)
            } else {
                self.split_internal(current, mid)
            };

            tracing::trace!(
                target: "bplus_index::split",
                node = %current,
                sibling = %sibling,
                parent = %parent,
                leaf = is_leaf,
                "split node into new left sibling"
            );

            self.nodes.get_mut(parent).as_internal_mut().add(separator, sibling);
            current = parent;
        }
    }

    /// Returns the parent of `node`, first growing a new root above it if it has none.
    fn parent_or_grow_root(&mut self, node: Handle) -> Handle {
        if let Some(parent) = self.nodes.get(node).parent() {
            return parent;
        }

        let root = self.nodes.alloc(Node::Internal(InternalNode::with_sentinel(node)));
        self.nodes.get_mut(node).set_parent(Some(root));
        self.root = Some(root);

        tracing::trace!(target: "bplus_index::tree", root = %root, height = self.height(), "root grew");
        root
    }

    /// Moves the smaller half of a leaf into a new left sibling spliced into the chain just
    /// before it. The separator is a copy of the leaf's new minimum.
    fn split_leaf(&mut self, node: Handle, mid: usize) -> (K, Handle) {
        let leaf = self.nodes.get_mut(node).as_leaf_mut();
        let mut left = leaf.split_front(mid);
        let separator = leaf.key(0).clone();
        let prev = leaf.prev();

        left.set_prev(prev);
        left.set_next(Some(node));
        let left = self.nodes.alloc(Node::Leaf(left));

        self.nodes.get_mut(node).as_leaf_mut().set_prev(Some(left));
        if let Some(prev) = prev {
            self.nodes.get_mut(prev).as_leaf_mut().set_next(Some(left));
        }

        debug_assert!(self.nodes.get(left).max_key() < Some(&separator));
        (separator, left)
    }

    /// Moves the entries left of `mid` into a new left sibling; the entry at `mid` goes up.
    fn split_internal(&mut self, node: Handle, mid: usize) -> (K, Handle) {
        let (separator, left) = self.nodes.get_mut(node).as_internal_mut().split_front(mid);
        let left = self.nodes.alloc(Node::Internal(left));
        self.adopt_children(left);
        (separator, left)
    }

    /// Removes a key from the tree and returns the key-value pair.
    pub(crate) fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord + Hash,
    {
        if !self.key_set.contains(key) {
            return None;
        }

        let Descent { leaf, witness } = self
            .descend(key)
            .expect("`RawBPlusTree::remove_entry()` - indexed key but the tree is empty!");
        let node = self.nodes.get_mut(leaf).as_leaf_mut();
        let index = node
            .locate(key)
            .expect("`RawBPlusTree::remove_entry()` - indexed key is missing from its leaf!");
        let (removed_key, value) = node.pop(index);
        self.key_set.remove(key);
        let removed_value = self.values.take(value);

        self.merge_leaf(&removed_key, leaf, witness);

        Some((removed_key, removed_value))
    }

    /// Restores fill and separators after `key` was removed from `leaf`.
    fn merge_leaf(&mut self, key: &K, leaf: Handle, witness: Option<Handle>) {
        let min_fill = self.degree.min_fill();
        let size = self.nodes.get(leaf).size();

        let Some(Siblings {
            parent,
            index,
            left,
            right,
        }) = self.siblings(leaf)
        else {
            // A root leaf may hold any number of records; only an empty one goes away.
            if size == 0 {
                self.nodes.free(leaf);
                self.root = None;
                tracing::trace!(target: "bplus_index::tree", "last key removed, tree is empty");
            }
            return;
        };

        if size >= min_fill {
            if let Some(witness) = witness {
                self.repair_witness(witness, key, leaf);
            }
            return;
        }

        let left_can_lend = left.is_some_and(|left| self.nodes.get(left).size() > min_fill);
        let right_can_lend = right.is_some_and(|right| self.nodes.get(right).size() > min_fill);

        let survivor = match (left, right) {
            (Some(left), _) if left_can_lend => {
                self.steal_from_left_leaf(leaf, left, parent, index);
                leaf
            }
            (_, Some(right)) if right_can_lend => {
                self.steal_from_right_leaf(leaf, right, parent, index);
                leaf
            }
            (Some(left), _) => {
                self.merge_leaves(left, leaf, parent, index - 1);
                tracing::trace!(
                    target: "bplus_index::merge",
                    survivor = %left,
                    removed = %leaf,
                    direction = "left",
                    "merged leaf into left sibling"
                );
                left
            }
            (None, Some(right)) => {
                self.merge_leaves(leaf, right, parent, index);
                tracing::trace!(
                    target: "bplus_index::merge",
                    survivor = %leaf,
                    removed = %right,
                    direction = "right",
                    "merged right sibling into leaf"
                );
                leaf
            }
            (None, None) => panic!("`RawBPlusTree::merge_leaf()` - underfull leaf {leaf} has no siblings!"),
        };

        if let Some(witness) = witness {
            self.repair_witness(witness, key, survivor);
        }

        self.merge_internal(parent);
    }

    /// Rewrites the witness separator equal to `key`, if it still holds one, to the current
    /// minimum of `leaf`.
    fn repair_witness(&mut self, witness: Handle, key: &K, leaf: Handle) {
        let Some(index) = self.nodes.get(witness).as_internal().locate(key) else {
            return;
        };
        let min = self
            .nodes
            .get(leaf)
            .min_key()
            .expect("`RawBPlusTree::repair_witness()` - leaf is empty!")
            .clone();
        self.nodes.get_mut(witness).as_internal_mut().set_key(index, min);
    }

    /// Moves the left sibling's greatest record to the front of `leaf`. That record becomes the
    /// leaf's minimum, so it also becomes the separator between the two.
    fn steal_from_left_leaf(&mut self, leaf: Handle, left: Handle, parent: Handle, index: usize) {
        let donor = self.nodes.get_mut(left).as_leaf_mut();
        let (key, value) = donor.pop(donor.size() - 1);

        self.nodes.get_mut(parent).as_internal_mut().set_key(index - 1, key.clone());
        self.nodes.get_mut(leaf).as_leaf_mut().push_front(key, value);

        tracing::trace!(target: "bplus_index::merge", node = %leaf, donor = %left, direction = "left", "stole record");
    }

    /// Moves the right sibling's least record to the back of `leaf` and re-points the separator
    /// between them at the sibling's new minimum.
    fn steal_from_right_leaf(&mut self, leaf: Handle, right: Handle, parent: Handle, index: usize) {
        let (key, value) = self.nodes.get_mut(right).as_leaf_mut().pop(0);
        let new_min = self
            .nodes
            .get(right)
            .min_key()
            .expect("`RawBPlusTree::steal_from_right_leaf()` - donor left empty!")
            .clone();

        self.nodes.get_mut(parent).as_internal_mut().set_key(index, new_min);
        self.nodes.get_mut(leaf).as_leaf_mut().push_back(key, value);

        tracing::trace!(target: "bplus_index::merge", node = %leaf, donor = %right, direction = "right", "stole record");
    }

    /// Appends `absorbed` onto its left neighbor `survivor`, unlinks it from the chain and drops
    /// the separator that bounded it from below.
    fn merge_leaves(&mut self, survivor: Handle, absorbed: Handle, parent: Handle, separator_index: usize) {
        let Node::Leaf(absorbed_leaf) = self.nodes.take(absorbed) else {
            panic!("expected leaf node");
        };
        let next = absorbed_leaf.next();

        self.nodes.get_mut(survivor).as_leaf_mut().absorb(absorbed_leaf);
        if let Some(next) = next {
            self.nodes.get_mut(next).as_leaf_mut().set_prev(Some(survivor));
        }

        let (_, removed) = self.nodes.get_mut(parent).as_internal_mut().remove_separator(separator_index);
        debug_assert_eq!(removed, absorbed);
    }

    /// Rebalances internal nodes from `node` upward until one is adequately filled or the root
    /// is reached.
    fn merge_internal(&mut self, node: Handle) {
        let min_fill = self.degree.min_fill();
        let mut current = node;

        loop {
            let size = self.nodes.get(current).size();

            let Some(Siblings {
                parent,
                index,
                left,
                right,
            }) = self.siblings(current)
            else {
                if size == 0 {
                    self.collapse_root(current);
                }
                return;
            };

            if size >= min_fill {
                return;
            }

            let left_can_lend = left.is_some_and(|left| self.nodes.get(left).size() > min_fill);
            let right_can_lend = right.is_some_and(|right| self.nodes.get(right).size() > min_fill);

            match (left, right) {
                (Some(left), _) if left_can_lend => self.rotate_from_left(current, left, parent, index),
                (_, Some(right)) if right_can_lend => self.rotate_from_right(current, right, parent, index),
                (Some(left), _) => {
                    self.merge_internals(left, current, parent, index - 1);
                    tracing::trace!(
                        target: "bplus_index::merge",
                        survivor = %left,
                        removed = %current,
                        direction = "left",
                        "merged internal node into left sibling"
                    );
                }
                (None, Some(right)) => {
                    self.merge_internals(current, right, parent, index);
                    tracing::trace!(
                        target: "bplus_index::merge",
                        survivor = %current,
                        removed = %right,
                        direction = "right",
                        "merged right sibling into internal node"
                    );
                }
                (None, None) => {
                    panic!("`RawBPlusTree::merge_internal()` - underfull node {current} has no siblings!")
                }
            }

            current = parent;
        }
    }

    /// Replaces an emptied root by its sole remaining child.
    fn collapse_root(&mut self, root: Handle) {
        let child = self.nodes.get(root).as_internal().min_child();
        self.nodes.free(root);
        self.nodes.get_mut(child).set_parent(None);
        self.root = Some(child);

        tracing::trace!(target: "bplus_index::tree", root = %child, height = self.height(), "root collapsed");
    }

    /// Rotates the left sibling's sentinel child into `node`: the parent separator is demoted
    /// into `node` and the sibling's greatest separator is promoted in its place.
    fn rotate_from_left(&mut self, node: Handle, left: Handle, parent: Handle, index: usize) {
        let (promoted, child) = self.nodes.get_mut(left).as_internal_mut().pop_back();
        let demoted = self.nodes.get_mut(parent).as_internal_mut().set_key(index - 1, promoted);
        self.nodes.get_mut(node).as_internal_mut().push_front(demoted, child);
        self.nodes.get_mut(child).set_parent(Some(node));

        tracing::trace!(target: "bplus_index::merge", node = %node, donor = %left, direction = "left", "rotated child");
    }

    /// Rotates the right sibling's least child into `node`'s sentinel slot: the parent
    /// separator is demoted into `node` and the sibling's least separator is promoted.
    fn rotate_from_right(&mut self, node: Handle, right: Handle, parent: Handle, index: usize) {
        let (promoted, child) = self.nodes.get_mut(right).as_internal_mut().pop_front();
        let demoted = self.nodes.get_mut(parent).as_internal_mut().set_key(index, promoted);
        self.nodes.get_mut(node).as_internal_mut().push_back(demoted, child);
        self.nodes.get_mut(child).set_parent(Some(node));

        tracing::trace!(target: "bplus_index::merge", node = %node, donor = %right, direction = "right", "rotated child");
    }

    /// Appends `absorbed` onto its left neighbor `survivor`, demoting the separator between
    /// them, and re-parents every child `survivor` now owns.
    fn merge_internals(&mut self, survivor: Handle, absorbed: Handle, parent: Handle, separator_index: usize) {
        let (separator, removed) = self.nodes.get_mut(parent).as_internal_mut().remove_separator(separator_index);
        debug_assert_eq!(removed, absorbed);

        let Node::Internal(absorbed_node) = self.nodes.take(absorbed) else {
            panic!("expected internal node");
        };
        self.nodes.get_mut(survivor).as_internal_mut().absorb(separator, absorbed_node);
        self.adopt_children(survivor);
    }
}
