//! Post-processing of peptide-spectrum matches from DDA database searches:
//! target-decoy competition, semi-supervised rescoring, q-value estimation
//! at the PSM, peptide, and protein-group level, and parsimonious protein
//! grouping.
//!
//! The library performs no I/O - it consumes normalized [`psm::PsmRecord`]s
//! and a peptide-to-protein mapping, and produces confidence tables.

pub mod aggregate;
pub mod competition;
pub mod ml;
pub mod pipeline;
pub mod proteins;
pub mod psm;
pub mod qvalue;
pub mod scoring;

use serde::Serialize;

/// Granularity at which q-values are estimated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Psm,
    Peptide,
    Protein,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Psm => f.write_str("psm"),
            Level::Peptide => f.write_str("peptide"),
            Level::Protein => f.write_str("protein"),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// Malformed or contradictory PSM rows, e.g. conflicting decoy flags for
    /// the same (spectrum, peptide, charge) triple
    InvalidInput(String),
    /// No decoys present at this level - FDR cannot be estimated
    InsufficientDecoys { level: Level },
    /// A peptide in the confidence table has no protein mapping
    InconsistentMapping { peptide: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::InsufficientDecoys { level } => {
                write!(f, "no decoys present at the {} level", level)
            }
            Error::InconsistentMapping { peptide } => {
                write!(f, "peptide '{}' has no protein mapping", peptide)
            }
        }
    }
}

impl std::error::Error for Error {}
