//! Score providers: either the search engine's native score, or a learned
//! discriminant refined by semi-supervised iteration.
//!
//! The learning algorithm itself is an injected capability behind the
//! [`Learner`] trait. Each iteration treats target winners passing a
//! provisional FDR threshold as positives and all decoys as negatives, fits
//! a fresh model, and rescores every row; the loop stops when the positive
//! set stops changing or the iteration cap is reached. Score vectors are
//! replaced wholesale between iterations, never mutated in place, so any
//! iteration can be replayed from its inputs.

use crate::competition::{compete, TieBreak};
use crate::ml::linear_discriminant::LinearDiscriminant;
use crate::ml::matrix::Matrix;
use crate::psm::PsmTable;
use crate::qvalue::{assign_q_values, QRow};
use crate::Level;

/// A ranking score for every row of the table, higher = more confident
#[derive(Clone, Debug)]
pub struct Scores {
    pub values: Vec<f32>,
    /// Number of model fits performed (0 for the engine-score passthrough)
    pub iterations: usize,
    /// False when the iteration cap was hit before the labels stabilized.
    /// The last iteration's scores are still usable - this is a diagnostic,
    /// not a failure.
    pub converged: bool,
}

/// A fitted scoring function
pub trait Discriminant: Send + Sync {
    fn score(&self, features: &Matrix) -> Vec<f64>;
}

/// Injected model-fitting capability. Implementations must be deterministic
/// for a fixed `seed` and produce scores where higher = more confident.
pub trait Learner: Send + Sync {
    fn train(&self, features: &Matrix, decoy: &[bool], seed: u64) -> Option<Box<dyn Discriminant>>;
}

/// The built-in learner: closed-form linear discriminant analysis. The fit
/// is deterministic for any seed.
pub struct LdaLearner;

impl Learner for LdaLearner {
    fn train(
        &self,
        features: &Matrix,
        decoy: &[bool],
        _seed: u64,
    ) -> Option<Box<dyn Discriminant>> {
        LinearDiscriminant::fit(features, decoy).map(|m| Box::new(m) as Box<dyn Discriminant>)
    }
}

impl Discriminant for LinearDiscriminant {
    fn score(&self, features: &Matrix) -> Vec<f64> {
        LinearDiscriminant::score(self, features)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct RescoreSettings {
    /// Provisional FDR threshold selecting the positive training set
    pub train_fdr: f32,
    pub max_iterations: usize,
    pub tie_break: TieBreak,
    pub seed: u64,
}

impl Default for RescoreSettings {
    fn default() -> Self {
        RescoreSettings {
            train_fdr: 0.01,
            max_iterations: 10,
            tie_break: TieBreak::Lexical,
            seed: 0,
        }
    }
}

/// Passthrough of the search engine's native score
pub fn engine_scores(table: &PsmTable) -> Scores {
    Scores {
        values: table.engine_scores(),
        iterations: 0,
        converged: true,
    }
}

/// Semi-supervised rescoring. Falls back to the engine score (with a
/// warning) when a model cannot be fit at all, mirroring a search run where
/// the discriminant fit fails and the heuristic score is kept.
pub fn rescore(table: &PsmTable, learner: &dyn Learner, settings: &RescoreSettings) -> Scores {
    let features = table.features();
    let decoy = table.decoys();
    let mut scores = table.engine_scores();
    let mut previous: Option<Vec<usize>> = None;

    for iteration in 0..settings.max_iterations {
        // Provisional confidence under the current score assignment
        let winners = compete(table, &scores, settings.tie_break);
        let mut rows = winners
            .iter()
            .map(|w| QRow::new(w.row, w.score, w.decoy))
            .collect::<Vec<_>>();
        if assign_q_values(&mut rows, Level::Psm, settings.train_fdr).is_err() {
            log::warn!("no decoys in input, skipping rescoring");
            return engine_scores(table);
        }

        let mut positives = rows
            .iter()
            .filter(|r| !r.decoy && r.q <= settings.train_fdr)
            .map(|r| r.key)
            .collect::<Vec<_>>();
        positives.sort_unstable();

        if positives.is_empty() {
            log::warn!(
                "no targets pass the training threshold (q <= {}), keeping engine scores",
                settings.train_fdr
            );
            return engine_scores(table);
        }
        if previous.as_ref() == Some(&positives) {
            log::trace!("- rescoring labels stable after {} iterations", iteration);
            return Scores {
                values: scores,
                iterations: iteration,
                converged: true,
            };
        }

        // Training set: confident targets plus every decoy
        let mut train_rows = positives.clone();
        train_rows.extend((0..table.len()).filter(|&row| decoy[row]));
        train_rows.sort_unstable();
        let train_features = features.select_rows(&train_rows);
        let train_decoy = train_rows.iter().map(|&row| decoy[row]).collect::<Vec<_>>();

        match learner.train(&train_features, &train_decoy, settings.seed) {
            Some(model) => {
                scores = model
                    .score(features)
                    .into_iter()
                    .map(|s| s as f32)
                    .collect();
            }
            None => {
                log::warn!("model fitting failed, falling back to engine scores");
                return engine_scores(table);
            }
        }
        previous = Some(positives);
    }

    log::warn!(
        "rescoring did not stabilize within {} iterations, keeping the last assignment",
        settings.max_iterations
    );
    Scores {
        values: scores,
        iterations: settings.max_iterations,
        converged: false,
    }
}
