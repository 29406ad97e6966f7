use crate::KnnError;

/// A dense column-major matrix.
///
/// Point sets are stored one point per column; result tables store one query
/// per column and one neighbor rank per row.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Clone> DenseMatrix<T> {
    /// Create a matrix with every entry set to `value`.
    pub fn new(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Create a matrix from column-major data.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::InvalidShape`] if `data.len() != rows * cols`.
    pub fn from_shape_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, KnnError> {
        if data.len() != rows * cols {
            return Err(KnnError::InvalidShape(data.len(), rows, cols));
        }
        Ok(Self { rows, cols, data })
    }

    /// Create a matrix with `N` rows from a list of columns.
    pub fn from_columns<const N: usize>(columns: &[[T; N]]) -> Self {
        let data = columns.iter().flat_map(|c| c.iter().cloned()).collect();
        Self {
            rows: N,
            cols: columns.len(),
            data,
        }
    }

    /// Create a matrix by evaluating `f(row, col)` for every entry.
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> T) -> Self {
        let data = (0..cols)
            .flat_map(|c| (0..rows).map(move |r| (r, c)))
            .map(|(r, c)| f(r, c))
            .collect();
        Self { rows, cols, data }
    }

    /// Apply `f` to every entry and return the resulting matrix.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> DenseMatrix<U> {
        DenseMatrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<T> DenseMatrix<T> {
    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Get a reference to the entry at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if the position is out of bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &T {
        assert!(row < self.rows && col < self.cols);
        &self.data[col * self.rows + row]
    }

    /// Set the entry at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if the position is out of bounds.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        assert!(row < self.rows && col < self.cols);
        self.data[col * self.rows + row] = value;
    }

    /// The entries of a column.
    #[inline]
    pub fn col(&self, col: usize) -> &[T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// The mutable entries of a column.
    #[inline]
    pub fn col_mut(&mut self, col: usize) -> &mut [T] {
        &mut self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// The underlying column-major storage.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The underlying column-major storage, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_matrix_layout() -> Result<(), KnnError> {
        let m = DenseMatrix::from_shape_vec(2, 3, vec![1, 2, 3, 4, 5, 6])?;
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(*m.get(0, 1), 3);
        assert_eq!(*m.get(1, 2), 6);
        assert_eq!(m.col(1), &[3, 4]);
        Ok(())
    }

    #[test]
    fn test_dense_matrix_invalid_shape() {
        let res = DenseMatrix::from_shape_vec(2, 2, vec![1.0; 3]);
        assert_eq!(res, Err(KnnError::InvalidShape(3, 2, 2)));
    }

    #[test]
    fn test_dense_matrix_from_columns() {
        let m = DenseMatrix::from_columns(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.col(1), &[4.0, 5.0, 6.0]);
        assert_eq!(*m.get(2, 0), 3.0);
    }

    #[test]
    fn test_dense_matrix_from_fn_and_map() {
        let mut m = DenseMatrix::from_fn(2, 2, |r, c| r * 10 + c);
        assert_eq!(m.as_slice(), &[0, 10, 1, 11]);
        m.set(0, 0, 7);
        let doubled = m.map(|v| v * 2);
        assert_eq!(doubled.as_slice(), &[14, 20, 2, 22]);
        m.col_mut(1)[0] = 3;
        assert_eq!(*m.get(0, 1), 3);
    }
}
