//! Sequences the full confidence pipeline: scoring, target-decoy
//! competition, then q-value estimation at PSM, peptide, and protein-group
//! level. The orchestrator owns every derived structure for one run and
//! performs no I/O.

use crate::aggregate::aggregate;
use crate::competition::{compete, TieBreak};
use crate::proteins::{infer, DegenerateStrategy, PeptideProteinMap, ProteinGroup, ScoreAggregation};
use crate::psm::PsmTable;
use crate::qvalue::{assign_q_values, QRow};
use crate::scoring::{engine_scores, rescore, LdaLearner, Learner, RescoreSettings};
use crate::{Error, Level};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    /// FDR threshold marking entities as accepted, in (0, 1]
    pub fdr_threshold: f32,
    /// Provisional FDR threshold for the rescoring training set
    pub train_fdr: f32,
    pub max_rescoring_iterations: usize,
    /// Forwarded to the score provider; the built-in LDA is deterministic
    /// regardless, injected stochastic models must honor it
    pub seed: u64,
    pub tie_break: TieBreak,
    pub degenerate_peptides: DegenerateStrategy,
    pub score_aggregation: ScoreAggregation,
    /// When false, rank by the engine score alone
    pub rescore: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            fdr_threshold: 0.01,
            train_fdr: 0.01,
            max_rescoring_iterations: 10,
            seed: 0,
            tie_break: TieBreak::Lexical,
            degenerate_peptides: DegenerateStrategy::Exclusive,
            score_aggregation: ScoreAggregation::Best,
            rescore: true,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.fdr_threshold > 0.0 && self.fdr_threshold <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "fdr_threshold must be in (0, 1], got {}",
                self.fdr_threshold
            )));
        }
        if !(self.train_fdr > 0.0 && self.train_fdr <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "train_fdr must be in (0, 1], got {}",
                self.train_fdr
            )));
        }
        Ok(())
    }
}

/// The terminal output unit at any level
#[derive(Clone, Debug, Serialize)]
pub struct ConfidenceRecord {
    pub id: String,
    pub score: f32,
    pub q_value: f32,
    pub accepted: bool,
}

/// Which proteins and peptides make up a reported group
#[derive(Clone, Debug, Serialize)]
pub struct GroupMembership {
    pub group_id: String,
    pub proteins: Vec<Arc<str>>,
    pub peptides: Vec<Arc<str>>,
}

#[derive(Debug, Default)]
pub struct PipelineOutput {
    /// Target rows only; one per spectrum, ordered by descending score
    pub psms: Vec<ConfidenceRecord>,
    pub peptides: Vec<ConfidenceRecord>,
    pub protein_groups: Vec<ConfidenceRecord>,
    pub memberships: Vec<GroupMembership>,
    pub rescoring_iterations: usize,
    pub rescoring_converged: bool,
    /// Set when a level's q-value estimation could not run
    /// (insufficient decoys); earlier levels are still populated
    pub failed: Option<(Level, Error)>,
}

pub struct Pipeline<'a> {
    pub settings: PipelineSettings,
    learner: Option<&'a dyn Learner>,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: PipelineSettings) -> Pipeline<'a> {
        Pipeline {
            settings,
            learner: None,
        }
    }

    /// Inject a score provider other than the built-in LDA
    pub fn with_learner(mut self, learner: &'a dyn Learner) -> Pipeline<'a> {
        self.learner = Some(learner);
        self
    }

    pub fn run(
        &self,
        table: &PsmTable,
        mapping: &PeptideProteinMap,
    ) -> Result<PipelineOutput, Error> {
        self.settings.validate()?;
        let threshold = self.settings.fdr_threshold;
        let mut output = PipelineOutput {
            rescoring_converged: true,
            ..Default::default()
        };

        let scores = match self.settings.rescore {
            true => {
                let rescore_settings = RescoreSettings {
                    train_fdr: self.settings.train_fdr,
                    max_iterations: self.settings.max_rescoring_iterations,
                    tie_break: self.settings.tie_break,
                    seed: self.settings.seed,
                };
                rescore(table, self.learner.unwrap_or(&LdaLearner), &rescore_settings)
            }
            false => engine_scores(table),
        };
        output.rescoring_iterations = scores.iterations;
        output.rescoring_converged = scores.converged;
        log::info!(
            "- rescoring: {} iterations, converged = {}",
            scores.iterations,
            scores.converged
        );

        let winners = compete(table, &scores.values, self.settings.tie_break);
        log::info!(
            "- competition: {} candidates -> {} spectra",
            table.len(),
            winners.len()
        );

        // PSM level
        let mut rows = winners
            .iter()
            .map(|w| QRow::new(w.row, w.score, w.decoy))
            .collect::<Vec<_>>();
        match assign_q_values(&mut rows, Level::Psm, threshold) {
            Ok(passing) => {
                log::info!("- {} PSMs at q <= {}", passing, threshold);
                output.psms = rows
                    .iter()
                    .filter(|r| !r.decoy)
                    .map(|r| ConfidenceRecord {
                        id: table.psm(r.key).spec_id.to_string(),
                        score: r.score,
                        q_value: r.q,
                        accepted: r.q <= threshold,
                    })
                    .collect();
            }
            Err(err @ Error::InsufficientDecoys { .. }) => {
                output.failed = Some((Level::Psm, err));
                return Ok(output);
            }
            Err(err) => return Err(err),
        }

        // Peptide level
        let entries = match aggregate(&winners, threshold) {
            Ok((entries, passing)) => {
                log::info!("- {} peptides at q <= {}", passing, threshold);
                output.peptides = entries
                    .iter()
                    .filter(|e| !e.decoy)
                    .map(|e| ConfidenceRecord {
                        id: e.peptide.to_string(),
                        score: e.score,
                        q_value: e.q,
                        accepted: e.q <= threshold,
                    })
                    .collect();
                entries
            }
            Err(err @ Error::InsufficientDecoys { .. }) => {
                output.failed = Some((Level::Peptide, err));
                return Ok(output);
            }
            Err(err) => return Err(err),
        };

        // Protein level. A missing mapping is structural corruption and
        // aborts the whole run rather than returning partial tables.
        match infer(
            &entries,
            mapping,
            self.settings.degenerate_peptides,
            self.settings.score_aggregation,
            threshold,
        ) {
            Ok(proteins) => {
                log::info!(
                    "- {} protein groups at q <= {} ({:?} strategy)",
                    proteins.passing,
                    threshold,
                    proteins.strategy
                );
                let targets = proteins
                    .groups
                    .into_iter()
                    .filter(|g| !g.decoy)
                    .collect::<Vec<ProteinGroup>>();
                output.protein_groups = targets
                    .iter()
                    .map(|g| ConfidenceRecord {
                        id: g.group_id.clone(),
                        score: g.score,
                        q_value: g.q,
                        accepted: g.q <= threshold,
                    })
                    .collect();
                output.memberships = targets
                    .into_iter()
                    .map(|g| GroupMembership {
                        group_id: g.group_id,
                        proteins: g.proteins,
                        peptides: g.peptides,
                    })
                    .collect();
            }
            Err(err @ Error::InsufficientDecoys { .. }) => {
                output.failed = Some((Level::Protein, err));
                return Ok(output);
            }
            Err(err) => return Err(err),
        }

        Ok(output)
    }
}
