//! Dense row-major matrix for per-channel and per-pair spectra.

use std::ops::AddAssign;

/// `rows × cols` matrix stored row-major in one allocation.
///
/// Used for PSD (`channels × bins`, real), CSD (`pairs × bins`, complex), and
/// tapered spectra (`channels·tapers × bins`, complex).
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralMatrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> SpectralMatrix<T> {
    /// Zero-filled matrix
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![T::default(); rows * cols] }
    }

    /// Number of rows
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Whether the matrix has `rows × cols` shape
    #[inline]
    pub fn has_shape(&self, rows: usize, cols: usize) -> bool {
        self.rows == rows && self.cols == cols
    }

    /// One row
    #[inline]
    pub fn row(&self, row: usize) -> &[T] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    /// One row, mutable
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        let start = row * self.cols;
        &mut self.data[start..start + self.cols]
    }

    /// Iterate over rows in order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Row-major view of all elements
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Apply `f` to every element in place
    pub fn map_in_place(&mut self, f: impl Fn(T) -> T) {
        for value in &mut self.data {
            *value = f(*value);
        }
    }
}

impl<T: Copy + AddAssign> SpectralMatrix<T> {
    /// Element-wise `self += other`.
    ///
    /// Shapes must match; callers validate trial shapes before dispatch.
    pub fn add_assign_elementwise(&mut self, other: &Self) {
        debug_assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        for (acc, &value) in self.data.iter_mut().zip(&other.data) {
            *acc += value;
        }
    }
}
