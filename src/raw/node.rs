use core::borrow::Borrow;

use smallvec::SmallVec;

use super::handle::Handle;

/// Entries kept inline before a node spills to the heap. Small degrees never allocate per node.
pub(crate) const INLINE_ENTRIES: usize = 8;

type Keys<K> = SmallVec<[K; INLINE_ENTRIES]>;
type Handles = SmallVec<[Handle; INLINE_ENTRIES + 1]>;

#[allow(private_interfaces)]
#[derive(Clone, Debug)]
pub(crate) enum Node<K> {
    Internal(InternalNode<K>),
    Leaf(LeafNode<K>),
}

// An internal node is a list of (separator, child) entries followed by the +inf sentinel entry.
// Entry `i` is `(keys[i], children[i])`: every key under `children[i]` is `< keys[i]`. The
// sentinel has no stored key; its child is the trailing `children[keys.len()]`, so there is
// always exactly one more child than there are keys.
#[derive(Clone, Debug)]
pub(crate) struct InternalNode<K> {
    parent: Option<Handle>,
    keys: Keys<K>,
    children: Handles,
}

// A leaf is a list of (key, value) entries. Its sentinel is the end of the list.
#[derive(Clone, Debug)]
pub(crate) struct LeafNode<K> {
    parent: Option<Handle>,
    prev: Option<Handle>,
    next: Option<Handle>,
    keys: Keys<K>,
    values: Handles,
}

impl<K> Node<K> {
    /// Returns true if this is a leaf node.
    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Returns the leaf node, panicking if this is not a leaf.
    pub(crate) fn as_leaf(&self) -> &LeafNode<K> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("expected leaf node"),
        }
    }

    /// Returns the leaf node mutably, panicking if this is not a leaf.
    pub(crate) fn as_leaf_mut(&mut self) -> &mut LeafNode<K> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("expected leaf node"),
        }
    }

    /// Returns the internal node, panicking if this is not internal.
    pub(crate) fn as_internal(&self) -> &InternalNode<K> {
        match self {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("expected internal node"),
        }
    }

    /// Returns the internal node mutably, panicking if this is not internal.
    pub(crate) fn as_internal_mut(&mut self) -> &mut InternalNode<K> {
        match self {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("expected internal node"),
        }
    }

    /// Number of real (non-sentinel) entries.
    pub(crate) fn size(&self) -> usize {
        match self {
            Node::Internal(internal) => internal.size(),
            Node::Leaf(leaf) => leaf.size(),
        }
    }

    pub(crate) fn parent(&self) -> Option<Handle> {
        match self {
            Node::Internal(internal) => internal.parent,
            Node::Leaf(leaf) => leaf.parent,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Handle>) {
        match self {
            Node::Internal(internal) => internal.parent = parent,
            Node::Leaf(leaf) => leaf.parent = parent,
        }
    }

    /// Least real key (key mode minimum). Never the sentinel.
    pub(crate) fn min_key(&self) -> Option<&K> {
        self.keys().first()
    }

    /// Greatest real key (key mode maximum). Never the sentinel.
    pub(crate) fn max_key(&self) -> Option<&K> {
        self.keys().last()
    }

    /// Real keys of the node in ascending order: separators for internal nodes, records for leaves.
    pub(crate) fn keys(&self) -> &[K] {
        match self {
            Node::Internal(internal) => &internal.keys,
            Node::Leaf(leaf) => &leaf.keys,
        }
    }
}

impl<K> InternalNode<K> {
    /// Creates an internal node holding only the sentinel entry, whose child is `child`.
    pub(crate) fn with_sentinel(child: Handle) -> Self {
        let mut children = Handles::new();
        children.push(child);
        Self {
            parent: None,
            keys: Keys::new(),
            children,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    /// Returns the child of entry `index`; `index == size()` is the sentinel's child.
    #[inline]
    pub(crate) fn child(&self, index: usize) -> Handle {
        self.children[index]
    }

    pub(crate) fn children(&self) -> &[Handle] {
        &self.children
    }

    /// Least child reference (pointer mode minimum).
    pub(crate) fn min_child(&self) -> Handle {
        self.children[0]
    }

    /// Sentinel child reference (pointer mode maximum).
    pub(crate) fn max_child(&self) -> Handle {
        self.children[self.children.len() - 1]
    }

    /// Picks the entry to descend into for `key`: the first entry whose key is strictly greater,
    /// falling through to the sentinel. Also reports whether the entry just before it carries
    /// `key` itself, which makes this node a boundary witness for `key`.
    #[inline]
    pub(crate) fn route<Q>(&self, key: &Q) -> (usize, bool)
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let index = self.keys.partition_point(|k| k.borrow() <= key);
        let exact = index > 0 && self.keys[index - 1].borrow() == key;
        (index, exact)
    }

    /// Position of the separator equal to `key`.
    pub(crate) fn locate<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.keys.iter().position(|k| k.borrow() == key)
    }

    /// Position of the entry pointing at `child`; the sentinel's child reports `size()`.
    pub(crate) fn locate_child(&self, child: Handle) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    /// Adds the entry `(key, child)` in key order. `child` becomes the subtree bounded above by
    /// `key`, sitting directly left of the entry that covered `key` before.
    pub(crate) fn add(&mut self, key: K, child: Handle) -> usize
    where
        K: Ord,
    {
        let index = self.keys.partition_point(|k| *k < key);
        self.keys.insert(index, key);
        self.children.insert(index, child);
        index
    }

    /// Replaces the separator at `index`, returning the old one.
    pub(crate) fn set_key(&mut self, index: usize, key: K) -> K {
        core::mem::replace(&mut self.keys[index], key)
    }

    /// Removes the separator at `index` together with the child to its right, the child that
    /// separator was the minimum of. Used when that child is absorbed by its left neighbor.
    pub(crate) fn remove_separator(&mut self, index: usize) -> (K, Handle) {
        let key = self.keys.remove(index);
        let child = self.children.remove(index + 1);
        (key, child)
    }

    /// Prepends an entry: `child` becomes the least child, bounded above by `key`.
    pub(crate) fn push_front(&mut self, key: K, child: Handle) {
        self.keys.insert(0, key);
        self.children.insert(0, child);
    }

    /// Appends past the sentinel: the old sentinel child gets upper bound `key` and `child`
    /// becomes the new sentinel child.
    pub(crate) fn push_back(&mut self, key: K, child: Handle) {
        self.keys.push(key);
        self.children.push(child);
    }

    /// Removes the least entry, returning its separator and child.
    pub(crate) fn pop_front(&mut self) -> (K, Handle) {
        let key = self.keys.remove(0);
        let child = self.children.remove(0);
        (key, child)
    }

    /// Removes the greatest separator and the sentinel child; the child left of them takes over
    /// the sentinel slot.
    pub(crate) fn pop_back(&mut self) -> (K, Handle) {
        let key = self.keys.pop().expect("`InternalNode::pop_back()` - node has no separators!");
        let child = self.children.pop().expect("`InternalNode::pop_back()` - node has no children!");
        (key, child)
    }

    /// Moves entries `[0, mid)` into a new left sibling. The entry at `mid` is removed: its key
    /// is returned as the separator for the parent and its child becomes the sibling's sentinel
    /// child. The caller re-parents the sibling's children.
    pub(crate) fn split_front(&mut self, mid: usize) -> (K, InternalNode<K>) {
        let keys: Keys<K> = self.keys.drain(..mid).collect();
        let children: Handles = self.children.drain(..=mid).collect();
        let separator = self.keys.remove(0);
        let left = InternalNode {
            parent: self.parent,
            keys,
            children,
        };
        (separator, left)
    }

    /// Appends `right` after demoting `separator` between the two.
    pub(crate) fn absorb(&mut self, separator: K, mut right: InternalNode<K>) {
        self.keys.push(separator);
        self.keys.append(&mut right.keys);
        self.children.append(&mut right.children);
    }
}

impl<K> LeafNode<K> {
    pub(crate) fn new() -> Self {
        Self {
            parent: None,
            prev: None,
            next: None,
            keys: Keys::new(),
            values: Handles::new(),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn prev(&self) -> Option<Handle> {
        self.prev
    }

    pub(crate) fn set_prev(&mut self, prev: Option<Handle>) {
        self.prev = prev;
    }

    pub(crate) fn next(&self) -> Option<Handle> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<Handle>) {
        self.next = next;
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    #[inline]
    pub(crate) fn value(&self, index: usize) -> Handle {
        self.values[index]
    }

    pub(crate) fn locate<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.keys.binary_search_by(|k| k.borrow().cmp(key)).ok()
    }

    /// Index of the first key `>= key`, or `size()` if there is none.
    pub(crate) fn lower_bound<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.keys.partition_point(|k| k.borrow() < key)
    }

    /// Index of the first key `> key`, or `size()` if there is none.
    pub(crate) fn upper_bound<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.keys.partition_point(|k| k.borrow() <= key)
    }

    /// Adds a record in key order.
    ///
    /// # Panics
    ///
    /// Panics if `key` is already present; the tree's key index rules that out before descent.
    pub(crate) fn add(&mut self, key: K, value: Handle) -> usize
    where
        K: Ord,
    {
        match self.keys.binary_search(&key) {
            Ok(_) => panic!("`LeafNode::add()` - duplicate key reached a leaf!"),
            Err(index) => {
                self.keys.insert(index, key);
                self.values.insert(index, value);
                index
            }
        }
    }

    /// Removes the record at `index`.
    pub(crate) fn pop(&mut self, index: usize) -> (K, Handle) {
        let key = self.keys.remove(index);
        let value = self.values.remove(index);
        (key, value)
    }

    pub(crate) fn push_front(&mut self, key: K, value: Handle) {
        self.keys.insert(0, key);
        self.values.insert(0, value);
    }

    pub(crate) fn push_back(&mut self, key: K, value: Handle) {
        self.keys.push(key);
        self.values.push(value);
    }

    /// Moves records `[0, mid)` into a new left sibling sharing this leaf's parent. Chain links
    /// are left to the caller.
    pub(crate) fn split_front(&mut self, mid: usize) -> LeafNode<K> {
        let mut left = LeafNode::new();
        left.parent = self.parent;
        left.keys = self.keys.drain(..mid).collect();
        left.values = self.values.drain(..mid).collect();
        left
    }

    /// Appends every record of `right` and takes over its `next` link.
    pub(crate) fn absorb(&mut self, mut right: LeafNode<K>) {
        self.keys.append(&mut right.keys);
        self.values.append(&mut right.values);
        self.next = right.next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles(count: usize) -> Vec<Handle> {
        (0..count).map(Handle::from_index).collect()
    }

    fn internal(keys: &[i32], children: &[Handle]) -> InternalNode<i32> {
        assert_eq!(keys.len() + 1, children.len());
        let mut node = InternalNode::with_sentinel(children[keys.len()]);
        for (&key, &child) in keys.iter().zip(children) {
            node.add(key, child);
        }
        node
    }

    #[test]
    fn leaf_add_keeps_order() {
        let mut leaf = LeafNode::new();
        for (i, key) in [30, 10, 20].into_iter().enumerate() {
            leaf.add(key, Handle::from_index(i));
        }
        assert_eq!(leaf.keys(), &[10, 20, 30]);
        assert_eq!(leaf.value(0), Handle::from_index(1));
        let node = Node::Leaf(leaf);
        assert_eq!(node.min_key(), Some(&10));
        assert_eq!(node.max_key(), Some(&30));
        let leaf = node.as_leaf();
        assert_eq!(leaf.locate(&20), Some(1));
        assert_eq!(leaf.locate(&25), None);
    }

    #[test]
    #[should_panic(expected = "duplicate key reached a leaf")]
    fn leaf_add_rejects_duplicates() {
        let mut leaf = LeafNode::new();
        leaf.add(1, Handle::from_index(0));
        leaf.add(1, Handle::from_index(1));
    }

    #[test]
    fn leaf_bounds() {
        let mut leaf = LeafNode::new();
        for key in [2, 4, 6] {
            leaf.add(key, Handle::from_index(0));
        }
        assert_eq!(leaf.lower_bound(&4), 1);
        assert_eq!(leaf.upper_bound(&4), 2);
        assert_eq!(leaf.lower_bound(&7), 3);
        assert_eq!(leaf.upper_bound(&1), 0);
    }

    #[test]
    fn leaf_split_front_moves_smaller_half() {
        let mut leaf = LeafNode::new();
        for (i, key) in [1, 2, 3].into_iter().enumerate() {
            leaf.add(key, Handle::from_index(i));
        }
        let left = leaf.split_front(1);
        assert_eq!(left.keys(), &[1]);
        assert_eq!(leaf.keys(), &[2, 3]);
        assert_eq!(leaf.value(0), Handle::from_index(1));
    }

    #[test]
    fn internal_route_and_witness() {
        let h = handles(3);
        let node = internal(&[10, 20], &h);

        assert_eq!(node.route(&5), (0, false));
        assert_eq!(node.route(&10), (1, true));
        assert_eq!(node.route(&15), (1, false));
        assert_eq!(node.route(&20), (2, true));
        assert_eq!(node.route(&99), (2, false));
    }

    #[test]
    fn internal_add_places_child_left_of_covering_entry() {
        let h = handles(3);
        let mut node = InternalNode::with_sentinel(h[0]);
        node.add(10, h[1]);
        assert_eq!(node.children(), &[h[1], h[0]]);

        // Splitting the sentinel child [10, inf) again at 20.
        node.add(20, h[2]);
        assert_eq!(node.keys.as_slice(), &[10, 20]);
        assert_eq!(node.children(), &[h[1], h[2], h[0]]);
        assert_eq!(node.locate_child(h[0]), Some(2));
        assert_eq!(node.max_child(), h[0]);
        assert_eq!(node.min_child(), h[1]);
    }

    #[test]
    fn internal_split_front_promotes_middle_entry() {
        let h = handles(4);
        let mut node = internal(&[10, 20, 30], &h);

        let (separator, left) = node.split_front(1);
        assert_eq!(separator, 20);
        assert_eq!(left.keys.as_slice(), &[10]);
        assert_eq!(left.children(), &[h[0], h[1]]);
        assert_eq!(node.keys.as_slice(), &[30]);
        assert_eq!(node.children(), &[h[2], h[3]]);
    }

    #[test]
    fn internal_rotations() {
        let h = handles(5);
        let mut node = internal(&[10, 20], &h[..3]);

        let (key, child) = node.pop_back();
        assert_eq!((key, child), (20, h[2]));
        assert_eq!(node.max_child(), h[1]);

        node.push_back(20, h[3]);
        assert_eq!(node.children(), &[h[0], h[1], h[3]]);

        let (key, child) = node.pop_front();
        assert_eq!((key, child), (10, h[0]));
        node.push_front(5, h[4]);
        assert_eq!(node.keys.as_slice(), &[5, 20]);
        assert_eq!(node.children(), &[h[4], h[1], h[3]]);
    }

    #[test]
    fn internal_remove_separator_drops_right_child() {
        let h = handles(3);
        let mut node = internal(&[10, 20], &h);
        assert_eq!(node.remove_separator(0), (10, h[1]));
        assert_eq!(node.keys.as_slice(), &[20]);
        assert_eq!(node.children(), &[h[0], h[2]]);
        assert_eq!(node.locate(&20), Some(0));
        assert_eq!(node.locate(&10), None);
    }

    #[test]
    fn internal_absorb_demotes_separator() {
        let h = handles(4);
        let mut left = internal(&[10], &h[..2]);
        let right = internal(&[30], &h[2..]);
        left.absorb(20, right);
        assert_eq!(left.keys.as_slice(), &[10, 20, 30]);
        assert_eq!(left.children(), &[h[0], h[1], h[2], h[3]]);
    }
}
