//! Triangular channel-pair addressing
//!
//! Every unordered channel pair `(i, j)` with `i <= j` maps to a flat index
//! in row-major upper-triangle order:
//!
//! ```text
//!        j=0  j=1  j=2
//! i=0  [  0    1    2 ]
//! i=1  [       3    4 ]
//! i=2  [            5 ]
//! ```
//!
//! The mapping is a pure function of the channel count, so cross-spectra,
//! coherency rows, and network slots can all live in flat vectors and be
//! partitioned across workers by index.

use serde::{Deserialize, Serialize};

/// Linearization of the upper triangle (diagonal included) of a
/// `n_channels × n_channels` matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairIndex {
    n_channels: usize,
}

impl PairIndex {
    /// Create the pair index for `n_channels` channels
    #[inline]
    pub const fn new(n_channels: usize) -> Self {
        Self { n_channels }
    }

    /// Number of channels
    #[inline]
    pub const fn n_channels(self) -> usize {
        self.n_channels
    }

    /// Number of unordered pairs, `n(n + 1) / 2`
    #[inline]
    pub const fn len(self) -> usize {
        self.n_channels * (self.n_channels + 1) / 2
    }

    /// Whether there are no pairs at all
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.n_channels == 0
    }

    /// Flat index of the first pair in row `i`, i.e. of `(i, i)`
    #[inline]
    const fn row_start(self, i: usize) -> usize {
        i * (2 * self.n_channels + 1 - i) / 2
    }

    /// Flat index of the unordered pair `{i, j}`.
    ///
    /// The arguments may be given in either order. Returns `None` if either
    /// channel is out of range.
    #[inline]
    pub const fn index(self, i: usize, j: usize) -> Option<usize> {
        let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
        if hi >= self.n_channels {
            return None;
        }
        Some(self.row_start(lo) + (hi - lo))
    }

    /// Pair `(i, j)`, `i <= j`, stored at flat index `idx`
    pub fn pair(self, idx: usize) -> Option<(usize, usize)> {
        let mut remaining = idx;
        for i in 0..self.n_channels {
            let row_len = self.n_channels - i;
            if remaining < row_len {
                return Some((i, i + remaining));
            }
            remaining -= row_len;
        }
        None
    }

    /// Iterate over all pairs in flat-index order
    pub fn iter(self) -> PairIter {
        PairIter { n_channels: self.n_channels, i: 0, j: 0, remaining: self.len() }
    }
}

impl IntoIterator for PairIndex {
    type Item = (usize, usize);
    type IntoIter = PairIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over `(i, j)` pairs, `i <= j`, in flat-index order.
#[derive(Clone, Debug)]
pub struct PairIter {
    n_channels: usize,
    i: usize,
    j: usize,
    remaining: usize,
}

impl Iterator for PairIter {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = (self.i, self.j);
        self.remaining -= 1;
        self.j += 1;
        if self.j == self.n_channels {
            self.i += 1;
            self.j = self.i;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PairIter {}
