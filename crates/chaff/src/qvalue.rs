//! q-value estimation from target-decoy counts.
//!
//! Works on any competed entity level (PSM, peptide, protein group): sort
//! descending by score, walk the list accumulating target/decoy counts, take
//! the conservative decoy-corrected FDR `(D + 1) / max(T, 1)`, then enforce
//! monotonicity with a reversed cumulative minimum.

use crate::{Error, Level};
use rayon::prelude::*;

/// One scored entity competing for discovery.
///
/// `key` is the deterministic secondary sort key: entities with tied scores
/// are ordered by it, so repeated runs always produce identical q-values.
#[derive(Clone, Debug)]
pub struct QRow<K> {
    pub key: K,
    pub score: f32,
    pub decoy: bool,
    pub q: f32,
}

impl<K> QRow<K> {
    pub fn new(key: K, score: f32, decoy: bool) -> QRow<K> {
        QRow {
            key,
            score,
            decoy,
            q: 1.0,
        }
    }
}

/// Assign q-values in place, reordering `rows` (descending score, ties by
/// key). Returns the number of *target* rows with q <= `threshold`.
///
/// Fails with [`Error::InsufficientDecoys`] when no decoy is present - the
/// FDR is not estimable without them. An all-decoy input saturates every
/// q-value at 1.0.
pub fn assign_q_values<K: Ord + Send>(
    rows: &mut [QRow<K>],
    level: Level,
    threshold: f32,
) -> Result<usize, Error> {
    if rows.is_empty() {
        return Ok(0);
    }
    if !rows.iter().any(|row| row.decoy) {
        return Err(Error::InsufficientDecoys { level });
    }

    rows.par_sort_unstable_by(|a, b| {
        b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key))
    });

    let mut decoy = 1usize;
    let mut target = 0usize;
    for row in rows.iter_mut() {
        match row.decoy {
            true => decoy += 1,
            false => target += 1,
        }
        row.q = (decoy as f32 / target.max(1) as f32).min(1.0);
    }

    // Reverse pass: q-value is the minimum FDR at any lower score threshold
    let mut q_min = 1.0f32;
    let mut passing = 0;
    for row in rows.iter_mut().rev() {
        q_min = q_min.min(row.q);
        row.q = q_min;
        if q_min <= threshold && !row.decoy {
            passing += 1;
        }
    }
    Ok(passing)
}
