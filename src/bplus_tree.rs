use core::borrow::Borrow;
use core::fmt;
use core::hash::Hash;

use crate::degree::Degree;
use crate::error::Result;
use crate::raw::RawBPlusTree;

mod iter;

pub use iter::{Iter, Keys, Range, Values};

/// An in-memory index over unique keys, organized as a [B+ tree].
///
/// Records live only in the leaves, which are linked into a doubly-linked chain in key order.
/// Internal nodes hold copies of keys as separators and route every lookup by the rule "take
/// the first entry whose key is strictly greater than the searched key". Ordered walks and
/// range scans run along the leaf chain without going back through the internal levels.
///
/// The branching factor is fixed at construction: see [`Degree`]. Every node splits as soon as
/// it holds `D` entries, and every non-root node keeps at least `ceil(D / 2) - 1`.
///
/// Keys must be [`Ord`], [`Hash`] and [`Clone`]: separators are clones of record keys, and a
/// hash set of live keys answers membership and duplicate checks without a descent.
///
/// It is a logic error for a key to be modified in such a way that the key's ordering or hash
/// changes while it is in the tree.
///
/// # Examples
///
/// ```
/// use bplus_index::BPlusTree;
///
/// let mut index = BPlusTree::new(4)?;
///
/// for (id, name) in [(30, "carol"), (10, "alice"), (20, "bob"), (40, "dave")] {
///     assert!(index.insert(id, name));
/// }
///
/// // Keys are unique: a second insert is rejected and the old value kept.
/// assert!(!index.insert(20, "bobby"));
/// assert_eq!(index.search(&20), Some(&"bob"));
///
/// // Inclusive range scan along the leaf chain.
/// let names: Vec<_> = index.range(&15, &35).map(|(_, name)| *name).collect();
/// assert_eq!(names, ["bob", "carol"]);
///
/// assert!(index.delete(&10));
/// assert!(!index.delete(&10));
/// assert_eq!(index.ordered_keys(), [20, 30, 40]);
/// # Ok::<(), bplus_index::Error>(())
/// ```
///
/// [B+ tree]: https://en.wikipedia.org/wiki/B%2B_tree
#[derive(Clone)]
pub struct BPlusTree<K, V> {
    raw: RawBPlusTree<K, V>,
}

impl<K, V> BPlusTree<K, V> {
    /// Makes a new, empty `BPlusTree` with branching factor `degree`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDegree`](crate::Error::InvalidDegree) if `degree < 3`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_index::{BPlusTree, Error};
    ///
    /// let tree: BPlusTree<u32, ()> = BPlusTree::new(8)?;
    /// assert_eq!(tree.degree().get(), 8);
    ///
    /// assert!(matches!(BPlusTree::<u32, ()>::new(2), Err(Error::InvalidDegree { degree: 2, .. })));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn new(degree: usize) -> Result<Self> {
        Ok(Self::with_degree(Degree::new(degree)?))
    }

    /// Makes a new, empty `BPlusTree` from an already validated [`Degree`].
    #[must_use]
    pub fn with_degree(degree: Degree) -> Self {
        tracing::debug!(target: "bplus_index::tree", %degree, min_fill = degree.min_fill(), "created tree");
        Self {
            raw: RawBPlusTree::new(degree),
        }
    }

    /// The branching factor this tree was built with.
    #[must_use]
    pub const fn degree(&self) -> Degree {
        self.raw.degree()
    }

    /// Returns the number of records in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the tree contains no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Removes every record, keeping the degree.
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Number of levels from the root down to the leaves; 0 for an empty tree.
    #[must_use]
    pub fn height(&self) -> usize {
        self.raw.height()
    }

    /// Gets an iterator over the records of the tree, sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_index::BPlusTree;
    ///
    /// let mut tree = BPlusTree::default();
    /// tree.insert(3, "c");
    /// tree.insert(1, "a");
    /// tree.insert(2, "b");
    ///
    /// let (first_key, first_value) = tree.iter().next().unwrap();
    /// assert_eq!((*first_key, *first_value), (1, "a"));
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.raw)
    }

    /// Gets an iterator over the keys of the tree, in sorted order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Gets an iterator over the values of the tree, in order by key.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns the record with the smallest key.
    #[must_use]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.raw.first().map(|(leaf, index)| self.raw.entry(leaf, index))
    }

    /// Returns the record with the greatest key.
    #[must_use]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.raw.last().map(|(leaf, index)| self.raw.entry(leaf, index))
    }

    /// Collects the leaf keys by walking every node breadth first, independently of the leaf
    /// chain. The result always equals [`keys`](Self::keys).
    #[must_use]
    pub fn structural_keys(&self) -> Vec<&K> {
        self.raw.structural_keys()
    }

    /// Dumps the tree level by level from the root: each level lists the real keys of its
    /// nodes, left to right. Internal nodes show their separators, leaves their records.
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_index::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(3)?;
    /// for key in [10, 20, 5] {
    ///     tree.insert(key, ());
    /// }
    ///
    /// let levels = tree.levels();
    /// assert_eq!(levels[0], [&[10][..]]);
    /// assert_eq!(levels[1], [&[5][..], &[10, 20][..]]);
    /// # Ok::<(), bplus_index::Error>(())
    /// ```
    #[must_use]
    pub fn levels(&self) -> Vec<Vec<&[K]>> {
        self.raw
            .levels()
            .into_iter()
            .map(|level| level.into_iter().map(|node| self.raw.node(node).keys()).collect())
            .collect()
    }
}

impl<K: Ord + Hash + Clone, V> BPlusTree<K, V> {
    /// Inserts a record.
    ///
    /// Returns `true` if the key was new. If the key is already present the tree is left
    /// unchanged, the new value is dropped and `false` is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_index::BPlusTree;
    ///
    /// let mut tree = BPlusTree::default();
    /// assert!(tree.insert(37, "a"));
    /// assert!(!tree.insert(37, "b"));
    /// assert_eq!(tree.search(&37), Some(&"a"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.raw.insert(key, value)
    }

    /// Removes a key, returning `true` if it was present.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord + Hash,
    {
        self.raw.remove_entry(key).is_some()
    }

    /// Removes a key, returning its value if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord + Hash,
    {
        self.raw.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes a key, returning the stored key and value if it was present.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord + Hash,
    {
        self.raw.remove_entry(key)
    }

    /// Returns a reference to the value stored under `key`.
    ///
    /// The key may be any borrowed form of the tree's key type, but the ordering on the borrowed
    /// form *must* match the ordering on the key type.
    pub fn search<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.search(key)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn search_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.search_mut(key)
    }

    /// Returns `true` if the tree holds `key`. Answered in O(1) from the key set.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.raw.contains_key(key)
    }

    /// Gets an iterator over the records with `low <= key <= high`, in key order.
    ///
    /// The scan descends once to the leaf covering `low` and then walks the leaf chain. It yields
    /// nothing when `low > high`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_index::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(4)?;
    /// for key in 1..=20 {
    ///     tree.insert(key, key * key);
    /// }
    ///
    /// let squares: Vec<_> = tree.range(&3, &5).map(|(_, square)| *square).collect();
    /// assert_eq!(squares, [9, 16, 25]);
    /// assert_eq!(tree.range(&5, &3).count(), 0);
    /// # Ok::<(), bplus_index::Error>(())
    /// ```
    pub fn range<Q>(&self, low: &Q, high: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        if low > high {
            return Range::empty(&self.raw);
        }
        Range::new(&self.raw, self.raw.lower_bound(low), self.raw.upper_bound(high))
    }

    /// Collects all keys in ascending order.
    #[must_use]
    pub fn ordered_keys(&self) -> Vec<K> {
        self.keys().cloned().collect()
    }
}

impl<K, V> Default for BPlusTree<K, V> {
    /// Creates an empty `BPlusTree` of degree [`Degree::DEFAULT`].
    fn default() -> Self {
        Self::with_degree(Degree::DEFAULT)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for BPlusTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord + Hash + Clone, V> Extend<(K, V)> for BPlusTree<K, V> {
    /// Inserts every record; records whose key is already present are skipped.
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K, V> IntoIterator for &'a BPlusTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}
