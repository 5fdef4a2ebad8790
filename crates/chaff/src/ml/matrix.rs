use super::norm;
use rayon::prelude::*;
use std::fmt::{self, Debug};
use std::ops::{AddAssign, Index, IndexMut};

/// Dense, row-major matrix of f64
#[derive(Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

impl Matrix {
    /// Create a new `Matrix`
    ///
    /// # Panics
    ///
    /// * Panics if `data` does not have len == rows * cols
    pub fn new<T: Into<Vec<f64>>>(t: T, rows: usize, cols: usize) -> Matrix {
        let data = t.into();
        assert_eq!(
            data.len(),
            rows * cols,
            "data passed to Matrix::new() does not have shape ({}, {})",
            rows,
            cols
        );
        Matrix { data, rows, cols }
    }

    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    pub fn col_vector(data: Vec<f64>) -> Matrix {
        let rows = data.len();
        Matrix {
            data,
            rows,
            cols: 1,
        }
    }

    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Rows are contiguous in memory
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[self.cols * row..self.cols * (row + 1)]
    }

    pub(crate) fn swap_rows(&mut self, i: usize, j: usize) {
        for k in 0..self.cols {
            self.data.swap(self.cols * i + k, self.cols * j + k);
        }
    }

    /// Copy out the given rows, in order, as a new matrix
    pub fn select_rows(&self, rows: &[usize]) -> Matrix {
        let data = rows
            .iter()
            .flat_map(|&r| self.row(r).iter().copied())
            .collect::<Vec<_>>();
        Matrix::new(data, rows.len(), self.cols)
    }

    pub fn transpose(&self) -> Matrix {
        if self.cols == 1 || self.rows == 1 {
            let mut mat = self.clone();
            std::mem::swap(&mut mat.cols, &mut mat.rows);
            return mat;
        }
        let mut mat = Matrix::zeros(self.cols, self.rows);
        for row in 0..self.rows {
            for col in 0..self.cols {
                mat[(col, row)] = self[(row, col)]
            }
        }
        mat
    }

    pub fn dotv(&self, rhs: &[f64]) -> Vec<f64> {
        assert_eq!(
            self.cols,
            rhs.len(),
            "lhs has shape ({},{}), rhs has shape (1,{})",
            self.rows,
            self.cols,
            rhs.len()
        );
        (0..self.rows)
            .into_par_iter()
            .map(|row| {
                self.row(row)
                    .iter()
                    .zip(rhs)
                    .fold(0.0, |acc, (x, y)| acc + x * y)
            })
            .collect::<Vec<_>>()
    }

    pub fn dot(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(
            self.cols, rhs.rows,
            "lhs has shape ({},{}), rhs has shape ({},{})",
            self.rows, self.cols, rhs.rows, rhs.cols
        );
        let data = (0..self.rows)
            .into_par_iter()
            .flat_map_iter(|row| {
                (0..rhs.cols).map(move |col| {
                    (0..self.cols).fold(0.0, |acc, k| acc + self[(row, k)] * rhs[(k, col)])
                })
            })
            .collect::<Vec<_>>();
        Matrix {
            data,
            rows: self.rows,
            cols: rhs.cols,
        }
    }

    /// Mean of each column
    pub fn col_means(&self) -> Vec<f64> {
        let mut means = vec![0.0; self.cols];
        for row in 0..self.rows {
            for (m, x) in means.iter_mut().zip(self.row(row)) {
                *m += x;
            }
        }
        means.iter_mut().for_each(|m| *m /= self.rows as f64);
        means
    }

    /// Population standard deviation of each column
    pub fn col_stds(&self, means: &[f64]) -> Vec<f64> {
        assert_eq!(means.len(), self.cols);
        let mut vars = vec![0.0; self.cols];
        for row in 0..self.rows {
            for (v, (x, m)) in vars.iter_mut().zip(self.row(row).iter().zip(means)) {
                *v += (x - m).powi(2);
            }
        }
        vars.iter_mut().for_each(|v| *v = (*v / self.rows as f64).sqrt());
        vars
    }

    /// Use the power method to find the eigenvector with the largest
    /// corresponding eigenvalue
    pub fn power_method(&self, initial: &[f64]) -> Vec<f64> {
        let n = norm(initial);
        let mut v = initial.iter().map(|i| i / n).collect::<Vec<_>>();

        let mut last_eig = 0.0;
        for _ in 0..50 {
            let mut v1 = self.dotv(&v);
            let norm = norm(&v1);
            if (norm - last_eig).abs() < 1E-8 {
                break;
            }
            last_eig = norm;
            v1.iter_mut().for_each(|x| *x /= norm);
            v = v1;
        }
        v
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.data[self.cols * row + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        &mut self.data[self.cols * row + col]
    }
}

impl AddAssign<Matrix> for Matrix {
    fn add_assign(&mut self, rhs: Matrix) {
        assert_eq!(
            self.shape(),
            rhs.shape(),
            "matrices must have equal shape to add"
        );
        for i in 0..self.data.len() {
            self.data[i] += rhs.data[i];
        }
    }
}

impl Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[")?;
        for row in 0..self.rows {
            writeln!(f, "{:?}", self.row(row))?;
        }
        writeln!(f, "]")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dotv() {
        let a = Matrix::new([1., 2., 3., 4.], 2, 2);
        assert_eq!(a.dotv(&[0.5, 0.5]), vec![1.5, 3.5]);
    }

    #[test]
    fn transpose() {
        let mat = Matrix::new([1., 2., 3., 4., 5., 6.], 3, 2);
        let t = mat.transpose();
        assert_eq!(t.shape(), (2, 3));
        assert_eq!(t[(0, 1)], 3.);
        assert_eq!(t[(1, 2)], 6.);
    }

    #[test]
    fn dot() {
        #[rustfmt::skip]
        let a = Matrix::new(vec![
            1., 0., 1.,
            2., 1., 1.,
            0., 1., 1.,
            1., 1., 2.,
        ], 4, 3);

        #[rustfmt::skip]
        let b = Matrix::new(vec![
            1., 2., 1.,
            2., 3., 1.,
            4., 2., 2.,
        ], 3, 3);

        let c = a.dot(&b);
        assert_eq!(c.shape(), (4, 3));
        #[rustfmt::skip]
        assert_eq!(
            c,
            Matrix::new(vec![
                5., 4., 3.,
                8., 9., 5.,
                6., 5., 3.,
                11., 9., 6.,
            ], 4, 3)
        );
    }

    #[test]
    fn column_stats() {
        let m = Matrix::new([1., 10., 3., 10., 5., 10.], 3, 2);
        let means = m.col_means();
        assert_eq!(means, vec![3.0, 10.0]);
        let stds = m.col_stds(&means);
        assert!((stds[0] - (8.0f64 / 3.0).sqrt()).abs() < 1E-12);
        assert_eq!(stds[1], 0.0);
    }

    #[test]
    fn select_rows() {
        let m = Matrix::new([1., 2., 3., 4., 5., 6.], 3, 2);
        let s = m.select_rows(&[2, 0]);
        assert_eq!(s, Matrix::new([5., 6., 1., 2.], 2, 2));
    }
}
