use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;

/// Sample data of one acquisition.
///
/// A non-segmented acquisition is one-dimensional. A sequence acquisition is a matrix with
/// one row per segment.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum Samples<T> {
    Single(Array1<T>),
    Segmented(Array2<T>),
}

impl<T> Samples<T> {
    /// Total number of samples over all segments.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Samples::Single(a) => a.len(),
            Samples::Segmented(a) => a.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Samples::Single(a) => a.shape(),
            Samples::Segmented(a) => a.shape(),
        }
    }

    /// Number of samples in a single segment, i.e., the length of the last dimension.
    #[must_use]
    pub fn row_len(&self) -> usize {
        match self {
            Samples::Single(a) => a.len(),
            Samples::Segmented(a) => a.ncols(),
        }
    }

    /// Number of segment rows; 1 for a non-segmented acquisition.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        match self {
            Samples::Single(_) => 1,
            Samples::Segmented(a) => a.nrows(),
        }
    }

    /// View of the segment at `idx`.
    #[must_use]
    pub fn row(&self, idx: usize) -> Option<ArrayView1<'_, T>> {
        match self {
            Samples::Single(a) if idx == 0 => Some(a.view()),
            Samples::Single(_) => None,
            Samples::Segmented(a) if idx < a.nrows() => Some(a.index_axis(Axis(0), idx)),
            Samples::Segmented(_) => None,
        }
    }

    /// Views of every segment in order.
    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, T>> + '_ {
        (0..self.num_rows()).filter_map(move |idx| self.row(idx))
    }

    /// All samples in logical (row-major) order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            Samples::Single(a) => Box::new(a.iter()),
            Samples::Segmented(a) => Box::new(a.iter()),
        }
    }

    /// Apply `f` to every sample, preserving shape.
    pub fn map<U, F>(&self, f: F) -> Samples<U>
    where
        F: FnMut(&T) -> U,
    {
        match self {
            Samples::Single(a) => Samples::Single(a.map(f)),
            Samples::Segmented(a) => Samples::Segmented(a.map(f)),
        }
    }

    /// Segment matrix with `num_rows()` rows, copying a non-segmented acquisition into a
    /// single row.
    #[must_use]
    pub fn to_matrix(&self) -> Array2<T>
    where
        T: Clone,
    {
        match self {
            Samples::Single(a) => a.clone().insert_axis(Axis(0)),
            Samples::Segmented(a) => a.clone(),
        }
    }
}
