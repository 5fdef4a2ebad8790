//! PSM to peptide roll-up: the best-scoring competed PSM represents its
//! peptide, and q-values are re-estimated from scratch at peptide
//! granularity. PSM-level q-values are never reused - a peptide seen in
//! many spectra would otherwise count the same evidence repeatedly.

use crate::competition::Competed;
use crate::qvalue::{assign_q_values, QRow};
use crate::{Error, Level};
use fnv::FnvHashMap;
use std::sync::Arc;

/// Peptide-level evidence derived from competed PSMs
#[derive(Clone, Debug)]
pub struct PeptideEntry {
    pub peptide: Arc<str>,
    pub decoy: bool,
    /// Table row of the best contributing PSM
    pub best_row: usize,
    /// Number of spectra contributing evidence
    pub spectra: usize,
    pub score: f32,
    pub q: f32,
}

/// Group winners by (peptide, decoy flag), keep the best PSM per group, and
/// assign peptide-level q-values. Returns the entries sorted by peptide
/// together with the number of targets passing `threshold`.
///
/// A sequence observed as both target and decoy competes as two distinct
/// entities rather than being an error.
pub fn aggregate(winners: &[Competed], threshold: f32) -> Result<(Vec<PeptideEntry>, usize), Error> {
    let mut groups: FnvHashMap<(Arc<str>, bool), PeptideEntry> = FnvHashMap::default();
    for w in winners {
        let entry = groups
            .entry((w.peptide.clone(), w.decoy))
            .or_insert_with(|| PeptideEntry {
                peptide: w.peptide.clone(),
                decoy: w.decoy,
                best_row: w.row,
                spectra: 0,
                score: f32::MIN,
                q: 1.0,
            });
        entry.spectra += 1;
        // Strictly-greater keeps the earliest row on ties, and winners are
        // ordered by spectrum id, so the representative is deterministic
        if w.score > entry.score {
            entry.score = w.score;
            entry.best_row = w.row;
        }
    }

    let mut entries = groups.into_values().collect::<Vec<_>>();
    entries.sort_unstable_by(|a, b| (&a.peptide, a.decoy).cmp(&(&b.peptide, b.decoy)));

    let mut rows = entries
        .iter()
        .enumerate()
        .map(|(i, e)| QRow::new(i, e.score, e.decoy))
        .collect::<Vec<_>>();
    let passing = assign_q_values(&mut rows, Level::Peptide, threshold)?;
    for row in rows {
        entries[row.key].q = row.q;
    }

    Ok((entries, passing))
}
