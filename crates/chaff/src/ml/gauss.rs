//! Gauss-Jordan elimination for solution of systems of linear equations
//!
//! LDA needs the generalized eigenvalue problem for the scatter matrices Sw
//! and Sb. Rather than inverting Sw, solve the linear system Sw.dot(X) = Sb
//! and take the leading eigenvector of X.

use super::matrix::Matrix;

#[derive(Debug)]
pub struct Gauss {
    left: Matrix,
    right: Matrix,
}

impl Gauss {
    pub fn solve(left: Matrix, right: Matrix) -> Option<Matrix> {
        let mut g = Gauss { left, right };
        g.echelon();
        g.reduce();
        g.backfill();

        // If `left` was reduced to the identity (modulo all-zero rows), then
        // `right` now contains the solution to the system
        match g.left_solved() {
            true => Some(g.right),
            false => None,
        }
    }

    fn left_solved(&self) -> bool {
        let n = self.left.cols;
        for i in 0..n {
            for j in 0..n {
                let x = self.left[(i, j)];
                if i == j {
                    if x != 1.0 && x != 0.0 {
                        return false;
                    }
                } else if x != 0.0 {
                    return false;
                }
            }
        }
        true
    }

    fn echelon(&mut self) {
        let (m, n) = self.left.shape();
        let mut h = 0;
        let mut k = 0;

        while h < m && k < n {
            // Partial pivoting: find the row with the largest value in the
            // current pivot column
            let mut max = (0, f64::MIN);
            for i in h..m {
                if self.left[(i, k)] >= max.1 {
                    max = (i, self.left[(i, k)]);
                }
            }
            let i = max.0;
            if self.left[(i, k)] == 0.0 {
                k += 1;
                continue;
            }

            if h != i {
                self.left.swap_rows(h, i);
                self.right.swap_rows(h, i);
            }

            // Clear rows below the pivot row
            for i in h + 1..m {
                let factor = self.left[(i, k)] / self.left[(h, k)];
                self.left[(i, k)] = 0.0;
                for j in k + 1..n {
                    self.left[(i, j)] -= self.left[(h, j)] * factor;
                }
                for j in 0..self.right.cols {
                    self.right[(i, j)] -= self.right[(h, j)] * factor;
                }
            }
            h += 1;
            k += 1;
        }
    }

    // Scale so that the leading entry of every row is 1
    fn reduce(&mut self) {
        for i in (0..self.left.rows).rev() {
            for j in 0..self.left.cols {
                let x = self.left[(i, j)];
                if x == 0.0 {
                    continue;
                }
                for k in j..self.left.cols {
                    self.left[(i, k)] /= x;
                }
                for k in 0..self.right.cols {
                    self.right[(i, k)] /= x;
                }
                break;
            }
        }
    }

    // Clear entries above each pivot
    fn backfill(&mut self) {
        for i in (0..self.left.rows).rev() {
            for j in 0..self.left.cols {
                if self.left[(i, j)] == 0.0 {
                    continue;
                }
                for k in 0..i {
                    let factor = self.left[(k, j)] / self.left[(i, j)];
                    for h in 0..self.left.cols {
                        self.left[(k, h)] -= self.left[(i, h)] * factor;
                    }
                    for h in 0..self.right.cols {
                        self.right[(k, h)] -= self.right[(i, h)] * factor;
                    }
                }
                break;
            }
        }
    }
}
