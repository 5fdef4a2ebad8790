//! Two-class linear discriminant analysis over arbitrary PSM feature
//! columns, built from first principles on the in-crate matrix type.
//!
//! The caller hands us whatever numeric features the upstream search engine
//! produced, so instead of hand-tuned transforms every column is z-scored
//! against the training set, and constant columns are excluded from the fit
//! (they carry no class information and make the within-class scatter
//! singular).

use super::gauss::Gauss;
use super::matrix::Matrix;
use rayon::prelude::*;

pub struct LinearDiscriminant {
    /// Discriminant direction, one weight per *kept* column
    weights: Vec<f64>,
    /// Indices of the feature columns that survived the variance filter
    kept: Vec<usize>,
    /// Training-set mean and standard deviation per kept column
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl LinearDiscriminant {
    /// Fit a discriminant separating decoys from targets. Returns `None` if
    /// either class is empty, every column is constant, or the scatter
    /// system is singular.
    pub fn fit(features: &Matrix, decoy: &[bool]) -> Option<LinearDiscriminant> {
        assert_eq!(features.rows, decoy.len());

        let n_decoys = decoy.iter().filter(|&&d| d).count();
        if n_decoys == 0 || n_decoys == decoy.len() {
            return None;
        }

        let raw_means = features.col_means();
        let raw_stds = features.col_stds(&raw_means);
        let kept = (0..features.cols)
            .filter(|&c| raw_stds[c] > f64::EPSILON)
            .collect::<Vec<_>>();
        if kept.is_empty() {
            return None;
        }

        let means = kept.iter().map(|&c| raw_means[c]).collect::<Vec<_>>();
        let stds = kept.iter().map(|&c| raw_stds[c]).collect::<Vec<_>>();

        // z-score the kept columns
        let z = {
            let (means, stds, kept) = (&means, &stds, &kept);
            let data = (0..features.rows)
                .flat_map(|row| {
                    let r = features.row(row);
                    kept.iter()
                        .enumerate()
                        .map(move |(k, &c)| (r[c] - means[k]) / stds[k])
                })
                .collect::<Vec<_>>();
            Matrix::new(data, features.rows, kept.len())
        };

        let x_bar = z.col_means();
        let mut scatter_within = Matrix::zeros(z.cols, z.cols);
        let mut scatter_between = Matrix::zeros(z.cols, z.cols);
        let mut class_means = Vec::new();

        for class in [true, false] {
            let count = decoy.iter().filter(|&label| *label == class).count();

            let class_data = (0..z.rows)
                .zip(decoy)
                .filter(|&(_, label)| *label == class)
                .flat_map(|(row, _)| z.row(row).iter().copied())
                .collect::<Vec<_>>();

            let mut class_data = Matrix::new(class_data, count, z.cols);
            let class_mean = class_data.col_means();

            for row in 0..class_data.rows {
                for col in 0..class_data.cols {
                    class_data[(row, col)] -= class_mean[col];
                }
            }

            let cov = class_data.transpose().dot(&class_data);
            scatter_within += cov;

            let diff = Matrix::col_vector(
                class_mean
                    .iter()
                    .zip(x_bar.iter())
                    .map(|(x, y)| x - y)
                    .collect::<Vec<_>>(),
            );
            scatter_between += diff.dot(&diff.transpose());
            class_means.extend(class_mean);
        }

        // The columns are standardized, so the overall mean is ~0 and makes
        // a useless starting vector for power iteration - use all-ones
        let initial = vec![1.0; z.cols];
        let mut weights =
            Gauss::solve(scatter_within, scatter_between).map(|mat| mat.power_method(&initial))?;

        if !weights.iter().all(|w| w.is_finite()) {
            return None;
        }

        // Power iteration can return the eigenvector with flipped sign.
        // Fix it so that targets score higher than decoys.
        let class_means = Matrix::new(class_means, 2, z.cols);
        let coef = class_means.dotv(&weights);
        if coef[1] < coef[0] {
            weights.iter_mut().for_each(|c| *c *= -1.0);
        }

        log::trace!("- linear model fit with weights: {:?}", weights);

        Some(LinearDiscriminant {
            weights,
            kept,
            means,
            stds,
        })
    }

    /// Project feature rows onto the discriminant direction, applying the
    /// training-set standardization
    pub fn score(&self, features: &Matrix) -> Vec<f64> {
        (0..features.rows)
            .into_par_iter()
            .map(|row| {
                let r = features.row(row);
                self.kept
                    .iter()
                    .enumerate()
                    .map(|(k, &c)| (r[c] - self.means[k]) / self.stds[k] * self.weights[k])
                    .sum()
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn separates_clear_classes() {
        // Two informative columns, one constant column that must be dropped
        #[rustfmt::skip]
        let feats = Matrix::new(
            vec![
                5., 4., 7.,
                4., 5., 7.,
                6., 3., 7.,
                5., 4., 7.,
                1., 0., 7.,
                2., 1., 7.,
                1., 0., 7.,
                0., 2., 7.,
            ],
            8,
            3,
        );
        let decoy = [false, false, false, false, true, true, true, true];

        let lda = LinearDiscriminant::fit(&feats, &decoy).expect("error training LDA");
        let scores = lda.score(&feats);

        let min_target = scores[..4].iter().cloned().fold(f64::MAX, f64::min);
        let max_decoy = scores[4..].iter().cloned().fold(f64::MIN, f64::max);
        assert!(
            min_target > max_decoy,
            "targets should outscore decoys: {:?}",
            scores
        );
    }

    #[test]
    fn one_class_fails() {
        let feats = Matrix::new(vec![1., 2., 3., 4.], 2, 2);
        assert!(LinearDiscriminant::fit(&feats, &[false, false]).is_none());
    }

    #[test]
    fn all_constant_columns_fail() {
        let feats = Matrix::new(vec![1., 1., 1., 1.], 2, 2);
        assert!(LinearDiscriminant::fit(&feats, &[false, true]).is_none());
    }
}
