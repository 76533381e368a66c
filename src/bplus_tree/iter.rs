use core::fmt;
use core::iter::FusedIterator;

use crate::raw::{Cursor, RawBPlusTree};

/// An iterator over the records of a `BPlusTree`, in key order.
///
/// This `struct` is created by the [`iter`] method on [`BPlusTree`]. See its documentation for
/// more.
///
/// [`iter`]: super::BPlusTree::iter
/// [`BPlusTree`]: super::BPlusTree
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, K, V> {
    tree: &'a RawBPlusTree<K, V>,
    front: Cursor,
    remaining: usize,
}

/// An iterator over the keys of a `BPlusTree`.
///
/// This `struct` is created by the [`keys`] method on [`BPlusTree`].
///
/// [`keys`]: super::BPlusTree::keys
/// [`BPlusTree`]: super::BPlusTree
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Keys<'a, K, V> {
    pub(super) inner: Iter<'a, K, V>,
}

/// An iterator over the values of a `BPlusTree`.
///
/// This `struct` is created by the [`values`] method on [`BPlusTree`].
///
/// [`values`]: super::BPlusTree::values
/// [`BPlusTree`]: super::BPlusTree
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Values<'a, K, V> {
    pub(super) inner: Iter<'a, K, V>,
}

/// An iterator over a closed key interval of a `BPlusTree`.
///
/// This `struct` is created by the [`range`] method on [`BPlusTree`]. A clone continues from the
/// same position as the original.
///
/// [`range`]: super::BPlusTree::range
/// [`BPlusTree`]: super::BPlusTree
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Range<'a, K, V> {
    tree: &'a RawBPlusTree<K, V>,
    front: Cursor,
    /// First position past the interval; `None` is the end of the chain.
    end: Cursor,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(super) fn new(tree: &'a RawBPlusTree<K, V>) -> Self {
        Self {
            tree,
            front: tree.first(),
            remaining: tree.len(),
        }
    }
}

impl<'a, K, V> Range<'a, K, V> {
    pub(super) fn new(tree: &'a RawBPlusTree<K, V>, front: Cursor, end: Cursor) -> Self {
        Self { tree, front, end }
    }

    pub(super) fn empty(tree: &'a RawBPlusTree<K, V>) -> Self {
        Self::new(tree, None, None)
    }
}

// Manual impls: deriving would demand `K: Clone, V: Clone`.

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            remaining: self.remaining,
        }
    }
}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Clone for Range<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            end: self.end,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Keys<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<K, V: fmt::Debug> fmt::Debug for Values<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Range<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<(&'a K, &'a V)> {
        let (leaf, index) = self.front?;
        self.front = self.tree.settle(leaf, index + 1);
        self.remaining -= 1;
        Some(self.tree.entry(leaf, index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Values<'_, K, V> {}

impl<'a, K, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<(&'a K, &'a V)> {
        if self.front == self.end {
            return None;
        }
        let (leaf, index) = self.front?;
        self.front = self.tree.settle(leaf, index + 1);
        Some(self.tree.entry(leaf, index))
    }
}

impl<K, V> FusedIterator for Range<'_, K, V> {}
