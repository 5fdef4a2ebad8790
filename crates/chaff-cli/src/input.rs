use anyhow::{ensure, Context};
use chaff_core::pipeline::PipelineSettings;
use chaff_core::proteins::PeptideProteinMap;
use chaff_core::psm::{PsmRecord, PsmTable};
use fnv::FnvHashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Run parameters deserialized from a JSON file, with command-line overrides
/// applied on top
#[derive(Deserialize)]
pub struct Input {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    /// Path to the normalized PSM TSV
    pub psms: Option<String>,
    /// Path to the peptide-to-protein mapping TSV
    pub mapping: Option<String>,
    pub output_directory: Option<String>,
}

impl Input {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Input> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read parameters from {:?}", path.as_ref()))?;
        serde_json::from_str(&contents).context("failed to parse parameters file")
    }

    pub fn psm_path(&self) -> anyhow::Result<&str> {
        self.psms
            .as_deref()
            .context("no PSM file given on the command line or in the parameters file")
    }

    pub fn mapping_path(&self) -> anyhow::Result<&str> {
        self.mapping
            .as_deref()
            .context("no mapping file given on the command line or in the parameters file")
    }

    pub fn output_directory(&self) -> PathBuf {
        PathBuf::from(self.output_directory.as_deref().unwrap_or("."))
    }
}

/// Columns every PSM TSV must carry; everything else numeric is treated as
/// a rescoring feature
const RESERVED: [&str; 5] = ["spectrum", "peptide", "charge", "label", "engine_score"];

/// Read a normalized, PIN-like PSM table: one row per candidate match,
/// `label` is 1 for targets and -1 for decoys, and any extra columns are
/// numeric rescoring features.
pub fn read_psms<P: AsRef<Path>>(path: P) -> anyhow::Result<PsmTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path.as_ref())
        .with_context(|| format!("failed to open PSM file {:?}", path.as_ref()))?;

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect::<Vec<_>>();
    let column = |name: &str| -> anyhow::Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("PSM file is missing the '{}' column", name))
    };
    let spectrum = column("spectrum")?;
    let peptide = column("peptide")?;
    let charge = column("charge")?;
    let label = column("label")?;
    let engine_score = column("engine_score")?;
    let feature_columns = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !RESERVED.contains(&h.as_str()))
        .map(|(i, h)| (i, h.clone()))
        .collect::<Vec<_>>();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let field = |ix: usize| -> anyhow::Result<&str> {
            row.get(ix)
                .with_context(|| format!("PSM row {} is truncated", line + 2))
        };
        let label: i32 = field(label)?
            .parse()
            .with_context(|| format!("bad label on row {}", line + 2))?;
        ensure!(
            label == 1 || label == -1,
            "label must be 1 or -1 on row {}",
            line + 2
        );

        let mut features = FnvHashMap::default();
        for (ix, name) in &feature_columns {
            let value: f64 = field(*ix)?
                .parse()
                .with_context(|| format!("bad value for '{}' on row {}", name, line + 2))?;
            features.insert(name.clone(), value);
        }

        records.push(PsmRecord {
            spectrum: field(spectrum)?.to_string(),
            peptide: field(peptide)?.to_string(),
            charge: field(charge)?
                .parse()
                .with_context(|| format!("bad charge on row {}", line + 2))?,
            decoy: label == -1,
            engine_score: field(engine_score)?
                .parse()
                .with_context(|| format!("bad engine_score on row {}", line + 2))?,
            features,
        });
    }
    log::info!("read {} PSMs from {:?}", records.len(), path.as_ref());

    PsmTable::from_records(records).map_err(anyhow::Error::from)
}

/// Read a two-column `peptide <tab> protein` TSV into the mapping the
/// inference engine consumes. Repeated peptide rows accumulate accessions.
pub fn read_mapping<P: AsRef<Path>>(path: P) -> anyhow::Result<PeptideProteinMap> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path.as_ref())
        .with_context(|| format!("failed to open mapping file {:?}", path.as_ref()))?;

    let headers = reader.headers()?;
    ensure!(
        headers.len() >= 2,
        "mapping file needs 'peptide' and 'protein' columns"
    );

    let mut mapping = PeptideProteinMap::default();
    for row in reader.records() {
        let row = row?;
        let (peptide, protein) = (row.get(0), row.get(1));
        let (peptide, protein) = match (peptide, protein) {
            (Some(p), Some(a)) if !p.is_empty() && !a.is_empty() => (p, a),
            _ => anyhow::bail!("malformed mapping row: {:?}", row),
        };
        let proteins = mapping.entry(peptide.to_string()).or_default();
        if !proteins.iter().any(|existing| existing == protein) {
            proteins.push(protein.to_string());
        }
    }
    log::info!(
        "read protein mappings for {} peptides from {:?}",
        mapping.len(),
        path.as_ref()
    );
    Ok(mapping)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn psm_tsv_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "spectrum\tpeptide\tcharge\tlabel\tengine_score\tdelta_mass").unwrap();
        writeln!(file, "scan=1\tPEPTIDE\t2\t1\t42.5\t0.01").unwrap();
        writeln!(file, "scan=1\tEDITPEP\t2\t-1\t17.0\t0.2").unwrap();

        let table = read_psms(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.psm(1).decoy);
        assert_eq!(
            table.feature_names(),
            &["delta_mass".to_string(), "engine_score".to_string()]
        );
    }

    #[test]
    fn bad_label_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "spectrum\tpeptide\tcharge\tlabel\tengine_score").unwrap();
        writeln!(file, "scan=1\tPEPTIDE\t2\t0\t42.5").unwrap();
        assert!(read_psms(file.path()).is_err());
    }

    #[test]
    fn mapping_accumulates_accessions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "peptide\tprotein").unwrap();
        writeln!(file, "PEPTIDE\tsp|P1").unwrap();
        writeln!(file, "PEPTIDE\tsp|P2").unwrap();
        writeln!(file, "PEPTIDE\tsp|P1").unwrap();

        let mapping = read_mapping(file.path()).unwrap();
        assert_eq!(mapping["PEPTIDE"], vec!["sp|P1", "sp|P2"]);
    }
}
