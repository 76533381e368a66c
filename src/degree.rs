//! Branching-factor configuration.

use core::fmt;

use crate::error::{Error, Result};

/// The branching factor `D` of a [`BPlusTree`](crate::BPlusTree).
///
/// A node splits the moment it holds `D` real entries, so at rest every node holds at most
/// `D - 1`. Every node other than the root holds at least [`min_fill`](Degree::min_fill)
/// `= ceil(D / 2) - 1`. Degrees below 3 are rejected: with `D = 2` the minimum fill is zero and
/// empty nodes could linger in the tree.
///
/// # Examples
///
/// ```
/// use bplus_index::Degree;
///
/// let degree = Degree::new(4)?;
/// assert_eq!(degree.get(), 4);
/// assert_eq!(degree.min_fill(), 1);
/// assert!(Degree::new(2).is_err());
/// # Ok::<(), bplus_index::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Degree(usize);

impl Degree {
    /// Smallest accepted degree.
    pub const MIN: usize = 3;

    /// Degree used by [`Default`].
    pub const DEFAULT: Self = Self(Self::MIN);

    /// Validates `degree`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDegree`] if `degree < 3`.
    pub const fn new(degree: usize) -> Result<Self> {
        if degree < Self::MIN {
            return Err(Error::InvalidDegree {
                degree,
                min: Self::MIN,
            });
        }
        Ok(Self(degree))
    }

    /// The raw branching factor.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Minimum number of real entries in any non-root node: `ceil(D / 2) - 1`.
    #[must_use]
    pub const fn min_fill(self) -> usize {
        self.0.div_ceil(2) - 1
    }

    /// Maximum number of real entries in any node between operations: `D - 1`.
    #[must_use]
    pub const fn max_fill(self) -> usize {
        self.0 - 1
    }
}

impl Default for Degree {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for Degree {
    type Error = Error;

    fn try_from(degree: usize) -> Result<Self> {
        Self::new(degree)
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
