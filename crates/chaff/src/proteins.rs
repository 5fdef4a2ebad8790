//! Parsimonious protein inference.
//!
//! Proteins sharing an identical peptide-evidence set are merged into one
//! group, then a greedy set cover repeatedly picks the group explaining the
//! most yet-unexplained peptides until every peptide is covered. Tie-breaks
//! are explicit (coverage, then lexically smallest accession) so results
//! are reproducible across runs. Group-level q-values come from the same
//! counting estimator as every other level, with a group counted as decoy
//! only when all of its peptides are decoy.

use crate::aggregate::PeptideEntry;
use crate::qvalue::{assign_q_values, QRow};
use crate::{Error, Level};
use fnv::{FnvHashMap, FnvHashSet};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Peptide sequence -> non-empty set of protein accessions, supplied by the
/// upstream database digestion
pub type PeptideProteinMap = FnvHashMap<String, Vec<String>>;

/// How a peptide matching several surviving groups is reported
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateStrategy {
    /// Assigned only to the earliest-selected group containing it
    Exclusive,
    /// Listed in every selected group containing it (duplicated, never
    /// fractionally weighted)
    Shared,
}

/// How a group's score is derived from its member peptides
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum ScoreAggregation {
    /// Score of the best peptide
    Best,
    /// Sum of the top `k` peptide scores
    RankSum { k: usize },
}

/// A parsimony-resolved protein group
#[derive(Clone, Debug, Serialize)]
pub struct ProteinGroup {
    /// Member accessions joined with '/'
    pub group_id: String,
    pub proteins: Vec<Arc<str>>,
    pub peptides: Vec<Arc<str>>,
    pub decoy: bool,
    pub score: f32,
    pub q: f32,
}

#[derive(Debug)]
pub struct ProteinTable {
    pub groups: Vec<ProteinGroup>,
    /// The degenerate-peptide policy the table was built with, kept as
    /// output metadata so downstream consumers can reproduce the run
    pub strategy: DegenerateStrategy,
    /// Target groups passing the acceptance threshold
    pub passing: usize,
}

/// Run parsimony over the peptide-level entries (targets and decoys) and
/// assign group q-values.
///
/// Fails with [`Error::InconsistentMapping`] when a peptide has no (or an
/// empty) protein mapping - inference on partial evidence would silently
/// misassign everything else.
pub fn infer(
    peptides: &[PeptideEntry],
    mapping: &PeptideProteinMap,
    strategy: DegenerateStrategy,
    aggregation: ScoreAggregation,
    threshold: f32,
) -> Result<ProteinTable, Error> {
    // Resolve and intern the accessions for every peptide entry
    let mut accessions: Vec<Arc<str>> = Vec::new();
    let mut accession_ids: FnvHashMap<Arc<str>, usize> = FnvHashMap::default();
    let mut peptide_proteins: Vec<Vec<usize>> = Vec::with_capacity(peptides.len());
    for entry in peptides {
        let proteins = mapping
            .get(entry.peptide.as_ref())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InconsistentMapping {
                peptide: entry.peptide.to_string(),
            })?;
        let ids = proteins
            .iter()
            .map(|name| match accession_ids.get(name.as_str()) {
                Some(&id) => id,
                None => {
                    let acc: Arc<str> = Arc::from(name.as_str());
                    let id = accessions.len();
                    accessions.push(acc.clone());
                    accession_ids.insert(acc, id);
                    id
                }
            })
            .unique()
            .collect::<Vec<_>>();
        peptide_proteins.push(ids);
    }

    // Evidence set per protein, then merge proteins with identical evidence
    let mut evidence: FnvHashMap<usize, Vec<usize>> = FnvHashMap::default();
    for (pep, proteins) in peptide_proteins.iter().enumerate() {
        for &protein in proteins {
            evidence.entry(protein).or_default().push(pep);
        }
    }
    let mut merged: FnvHashMap<Vec<usize>, Vec<usize>> = FnvHashMap::default();
    for (protein, mut peps) in evidence {
        peps.sort_unstable();
        merged.entry(peps).or_default().push(protein);
    }

    struct Candidate {
        proteins: Vec<usize>,
        evidence: Vec<usize>,
        first_accession: Arc<str>,
    }
    let mut candidates = merged
        .into_iter()
        .map(|(evidence, mut proteins)| {
            proteins.sort_unstable_by(|&a, &b| accessions[a].cmp(&accessions[b]));
            let first_accession = accessions[proteins[0]].clone();
            Candidate {
                proteins,
                evidence,
                first_accession,
            }
        })
        .collect::<Vec<_>>();
    candidates.sort_unstable_by(|a, b| a.first_accession.cmp(&b.first_accession));

    // Greedy cover: maximum uncovered evidence first, accession order on ties.
    // Every peptide maps to at least one protein, so the loop terminates with
    // full coverage.
    let mut uncovered: FnvHashSet<usize> = (0..peptides.len()).collect();
    let mut selected: Vec<usize> = Vec::new();
    let mut in_cover = vec![false; candidates.len()];
    while !uncovered.is_empty() {
        let (best, _) = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| !in_cover[*i])
            .map(|(i, c)| {
                let gain = c.evidence.iter().filter(|p| uncovered.contains(p)).count();
                (i, gain)
            })
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .expect("uncovered peptides always have an unselected candidate");
        in_cover[best] = true;
        selected.push(best);
        for pep in &candidates[best].evidence {
            uncovered.remove(pep);
        }
    }

    // Membership per the degenerate-peptide strategy. A group is selected
    // only when it covers a then-unexplained peptide, so even under
    // Exclusive every selected group keeps at least one member.
    let mut assigned: FnvHashSet<usize> = FnvHashSet::default();
    let mut groups = Vec::with_capacity(selected.len());
    for &ix in &selected {
        let candidate = &candidates[ix];
        let members = match strategy {
            DegenerateStrategy::Exclusive => candidate
                .evidence
                .iter()
                .copied()
                .filter(|pep| assigned.insert(*pep))
                .collect::<Vec<_>>(),
            DegenerateStrategy::Shared => candidate.evidence.clone(),
        };

        let mut scores = members.iter().map(|&pep| peptides[pep].score).collect::<Vec<_>>();
        scores.sort_unstable_by(|a, b| b.total_cmp(a));
        let score = match aggregation {
            ScoreAggregation::Best => scores[0],
            ScoreAggregation::RankSum { k } => scores.iter().take(k.max(1)).sum(),
        };
        let decoy = members.iter().all(|&pep| peptides[pep].decoy);

        let proteins = candidate
            .proteins
            .iter()
            .map(|&p| accessions[p].clone())
            .collect::<Vec<_>>();
        let group_id = proteins.iter().join("/");
        let peptide_names = members
            .iter()
            .map(|&pep| peptides[pep].peptide.clone())
            .sorted()
            .collect::<Vec<_>>();

        groups.push(ProteinGroup {
            group_id,
            proteins,
            peptides: peptide_names,
            decoy,
            score,
            q: 1.0,
        });
    }

    // The selection order is deterministic, so the group index doubles as
    // the q-value tie-break key
    let mut rows = groups
        .iter()
        .enumerate()
        .map(|(i, g)| QRow::new(i, g.score, g.decoy))
        .collect::<Vec<_>>();
    let passing = assign_q_values(&mut rows, Level::Protein, threshold)?;
    for row in rows {
        groups[row.key].q = row.q;
    }
    groups.sort_unstable_by(|a, b| a.group_id.cmp(&b.group_id));

    Ok(ProteinTable {
        groups,
        strategy,
        passing,
    })
}
