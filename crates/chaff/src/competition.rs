//! Target-decoy competition: every spectrum keeps exactly one candidate,
//! the one with the highest score. Targets and decoys compete head to head,
//! so a spectrum whose candidates are all decoys yields a decoy winner -
//! that is expected, not an error.

use crate::psm::PsmTable;
use fnv::FnvHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How score ties between candidates for the same spectrum are resolved
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lexically smallest (peptide, charge) wins
    Lexical,
    /// The candidate appearing earliest in the input wins
    FirstSeen,
}

/// The surviving candidate for one spectrum
#[derive(Clone, Debug)]
pub struct Competed {
    /// Index of the winning row in the [`PsmTable`]
    pub row: usize,
    pub spec_id: Arc<str>,
    pub peptide: Arc<str>,
    pub decoy: bool,
    pub score: f32,
}

/// Reduce the table to one winner per spectrum. `scores[i]` ranks table row
/// `i`. The unit of parallel work is a whole spectrum's candidate set, and
/// the output is ordered by spectrum id regardless of worker scheduling.
///
/// Running the competition on a table that already holds one row per
/// spectrum is a no-op (every group of one elects its only member).
pub fn compete(table: &PsmTable, scores: &[f32], tie_break: TieBreak) -> Vec<Competed> {
    assert_eq!(table.len(), scores.len(), "one score per table row");

    let mut groups: FnvHashMap<Arc<str>, Vec<usize>> = FnvHashMap::default();
    for (row, psm) in table.psms().iter().enumerate() {
        groups.entry(psm.spec_id.clone()).or_default().push(row);
    }

    let groups = groups.into_values().collect::<Vec<_>>();
    let mut winners = groups
        .into_par_iter()
        .map(|rows| {
            // Rows per spectrum are in input order, so FirstSeen ties fall
            // out of keeping the incumbent on equality
            let mut best = rows[0];
            for &row in &rows[1..] {
                match scores[row].total_cmp(&scores[best]) {
                    std::cmp::Ordering::Greater => best = row,
                    std::cmp::Ordering::Equal => {
                        if tie_break == TieBreak::Lexical {
                            let challenger = table.psm(row);
                            let incumbent = table.psm(best);
                            if (challenger.peptide.as_ref(), challenger.charge)
                                < (incumbent.peptide.as_ref(), incumbent.charge)
                            {
                                best = row;
                            }
                        }
                    }
                    std::cmp::Ordering::Less => {}
                }
            }
            let psm = table.psm(best);
            Competed {
                row: best,
                spec_id: psm.spec_id.clone(),
                peptide: psm.peptide.clone(),
                decoy: psm.decoy,
                score: scores[best],
            }
        })
        .collect::<Vec<_>>();

    winners.par_sort_unstable_by(|a, b| a.spec_id.cmp(&b.spec_id));
    winners
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::psm::test::record;
    use crate::psm::PsmTable;

    #[test]
    fn one_winner_per_spectrum() {
        let table = PsmTable::from_records(vec![
            record("s1", "AAA", 2, false, 10.0),
            record("s1", "BBB", 2, true, 12.0),
            record("s2", "CCC", 2, false, 8.0),
        ])
        .unwrap();

        let winners = compete(&table, &table.engine_scores(), TieBreak::Lexical);
        assert_eq!(winners.len(), 2);
        assert_eq!(winners[0].peptide.as_ref(), "BBB");
        assert!(winners[0].decoy);
        assert_eq!(winners[1].peptide.as_ref(), "CCC");
    }

    #[test]
    fn all_decoy_spectrum_yields_decoy_winner() {
        let table = PsmTable::from_records(vec![
            record("s1", "AAA", 2, true, 10.0),
            record("s1", "BBB", 2, true, 9.0),
        ])
        .unwrap();
        let winners = compete(&table, &table.engine_scores(), TieBreak::Lexical);
        assert_eq!(winners.len(), 1);
        assert!(winners[0].decoy);
    }

    #[test]
    fn lexical_tie_break() {
        let table = PsmTable::from_records(vec![
            record("s1", "ZZZ", 2, false, 10.0),
            record("s1", "AAA", 2, true, 10.0),
        ])
        .unwrap();
        let winners = compete(&table, &table.engine_scores(), TieBreak::Lexical);
        assert_eq!(winners[0].peptide.as_ref(), "AAA");
    }

    #[test]
    fn first_seen_tie_break() {
        let table = PsmTable::from_records(vec![
            record("s1", "ZZZ", 2, false, 10.0),
            record("s1", "AAA", 2, true, 10.0),
        ])
        .unwrap();
        let winners = compete(&table, &table.engine_scores(), TieBreak::FirstSeen);
        assert_eq!(winners[0].peptide.as_ref(), "ZZZ");
    }

    #[test]
    fn charge_breaks_peptide_ties() {
        let table = PsmTable::from_records(vec![
            record("s1", "AAA", 3, false, 10.0),
            record("s1", "AAA", 2, false, 10.0),
        ])
        .unwrap();
        let winners = compete(&table, &table.engine_scores(), TieBreak::Lexical);
        assert_eq!(winners[0].row, 1);
    }

    #[test]
    fn idempotent_on_reduced_input() {
        let table = PsmTable::from_records(vec![
            record("s1", "AAA", 2, false, 10.0),
            record("s2", "BBB", 2, true, 12.0),
            record("s3", "CCC", 2, false, 8.0),
        ])
        .unwrap();
        let scores = table.engine_scores();
        let first = compete(&table, &scores, TieBreak::Lexical);
        assert_eq!(first.len(), table.len());
        for w in &first {
            assert_eq!(w.score, scores[w.row]);
            assert_eq!(w.spec_id, table.psm(w.row).spec_id);
        }
    }
}
