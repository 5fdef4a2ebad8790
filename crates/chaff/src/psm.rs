//! The normalized in-memory PSM dataset: one row per candidate match, a
//! target/decoy flag, the engine score, and a column-ordered feature matrix
//! shared by every rescoring model.

use crate::ml::matrix::Matrix;
use crate::Error;
use fnv::FnvHashMap;
use serde::Deserialize;
use std::sync::Arc;

/// A candidate match supplied by an upstream parser. Decoys are generated
/// and flagged upstream, never inferred here.
#[derive(Clone, Debug, Deserialize)]
pub struct PsmRecord {
    pub spectrum: String,
    pub peptide: String,
    pub charge: u8,
    pub decoy: bool,
    pub engine_score: f32,
    #[serde(default)]
    pub features: FnvHashMap<String, f64>,
}

/// One immutable row of the table
#[derive(Clone, Debug)]
pub struct Psm {
    pub spec_id: Arc<str>,
    pub peptide: Arc<str>,
    pub charge: u8,
    pub decoy: bool,
    pub engine_score: f32,
}

#[derive(Debug)]
pub struct PsmTable {
    psms: Vec<Psm>,
    feature_names: Vec<String>,
    features: Matrix,
}

impl PsmTable {
    /// Build the table, validating the dataset invariants:
    ///
    /// * at most one row per (spectrum, peptide, charge) triple
    /// * identical triples never disagree on the decoy flag
    /// * every record carries the same feature set
    ///
    /// The engine score is appended as a feature column (named
    /// `engine_score`) unless the records already provide one, so that
    /// rescoring models always see the native ranking.
    pub fn from_records(records: Vec<PsmRecord>) -> Result<PsmTable, Error> {
        let mut feature_names = records
            .first()
            .map(|r| r.features.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        feature_names.sort_unstable();
        let auto_engine_score = !feature_names.iter().any(|n| n == "engine_score");
        if auto_engine_score {
            feature_names.push("engine_score".into());
        }
        let supplied = feature_names.len() - usize::from(auto_engine_score);

        let mut interner: FnvHashMap<String, Arc<str>> = FnvHashMap::default();
        let mut intern = move |s: &str| -> Arc<str> {
            match interner.get(s) {
                Some(a) => a.clone(),
                None => {
                    let a: Arc<str> = Arc::from(s);
                    interner.insert(s.into(), a.clone());
                    a
                }
            }
        };

        let mut seen: FnvHashMap<(Arc<str>, Arc<str>, u8), bool> = FnvHashMap::default();
        let mut psms = Vec::with_capacity(records.len());
        let mut data = Vec::with_capacity(records.len() * feature_names.len());

        for record in &records {
            let spec_id = intern(&record.spectrum);
            let peptide = intern(&record.peptide);

            let key = (spec_id.clone(), peptide.clone(), record.charge);
            if let Some(&decoy) = seen.get(&key) {
                let msg = match decoy == record.decoy {
                    true => format!(
                        "duplicate row for ({}, {}, {})",
                        record.spectrum, record.peptide, record.charge
                    ),
                    false => format!(
                        "conflicting decoy flags for ({}, {}, {})",
                        record.spectrum, record.peptide, record.charge
                    ),
                };
                return Err(Error::InvalidInput(msg));
            }
            seen.insert(key, record.decoy);

            if record.features.len() != supplied {
                return Err(Error::InvalidInput(format!(
                    "row ({}, {}, {}) does not carry the same feature set as the first row",
                    record.spectrum, record.peptide, record.charge
                )));
            }
            for name in &feature_names {
                let value = match name.as_str() {
                    "engine_score" if auto_engine_score => record.engine_score as f64,
                    _ => *record.features.get(name).ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "row ({}, {}, {}) is missing feature '{}'",
                            record.spectrum, record.peptide, record.charge, name
                        ))
                    })?,
                };
                data.push(value);
            }

            psms.push(Psm {
                spec_id,
                peptide,
                charge: record.charge,
                decoy: record.decoy,
                engine_score: record.engine_score,
            });
        }

        let features = Matrix::new(data, psms.len(), feature_names.len());
        Ok(PsmTable {
            psms,
            feature_names,
            features,
        })
    }

    pub fn len(&self) -> usize {
        self.psms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.psms.is_empty()
    }

    pub fn psms(&self) -> &[Psm] {
        &self.psms
    }

    pub fn psm(&self, row: usize) -> &Psm {
        &self.psms[row]
    }

    pub fn features(&self) -> &Matrix {
        &self.features
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn engine_scores(&self) -> Vec<f32> {
        self.psms.iter().map(|p| p.engine_score).collect()
    }

    pub fn decoys(&self) -> Vec<bool> {
        self.psms.iter().map(|p| p.decoy).collect()
    }
}
