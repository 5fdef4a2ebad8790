//! End-to-end pipeline runs over synthetic datasets

use chaff_core::pipeline::{Pipeline, PipelineSettings};
use chaff_core::proteins::PeptideProteinMap;
use chaff_core::psm::{PsmRecord, PsmTable};
use chaff_core::{Error, Level};
use fnv::FnvHashMap;

fn record(spectrum: &str, peptide: &str, decoy: bool, engine_score: f32) -> PsmRecord {
    PsmRecord {
        spectrum: spectrum.into(),
        peptide: peptide.into(),
        charge: 2,
        decoy,
        engine_score,
        features: FnvHashMap::default(),
    }
}

/// 8 target peptides across two proteins plus matching decoys, with engine
/// scores that cleanly separate targets from decoys
fn fixture() -> (PsmTable, PeptideProteinMap) {
    let mut records = Vec::new();
    let mut mapping: PeptideProteinMap = PeptideProteinMap::default();

    for i in 0..8 {
        let target = format!("TARGET{}PEP", i);
        let decoy = format!("YOCED{}PEP", i);
        // Competing candidates for the same spectrum
        records.push(record(&format!("scan={}", i), &target, false, 50.0 - i as f32));
        records.push(record(&format!("scan={}", i), &decoy, true, 10.0 - i as f32));
        // A second spectrum supporting the same target peptide, weaker
        records.push(record(&format!("scan={}", 100 + i), &target, false, 30.0 - i as f32));
        // A decoy-only spectrum
        records.push(record(&format!("scan={}", 200 + i), &decoy, true, 8.0 - i as f32));

        let protein = match i < 4 {
            true => "sp|P1",
            false => "sp|P2",
        };
        mapping.insert(target, vec![protein.to_string()]);
        mapping.insert(decoy, vec![format!("rev_{}", protein)]);
    }

    (PsmTable::from_records(records).unwrap(), mapping)
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        fdr_threshold: 0.2,
        rescore: false,
        ..Default::default()
    }
}

#[test]
fn full_run_produces_three_levels() {
    let (table, mapping) = fixture();
    let output = Pipeline::new(settings()).run(&table, &mapping).unwrap();

    assert!(output.failed.is_none());
    // 24 spectra, 8 of them decoy-only; targets reported only
    assert_eq!(output.psms.len(), 16);
    assert_eq!(output.peptides.len(), 8);
    assert_eq!(output.protein_groups.len(), 2);
    assert_eq!(output.memberships.len(), 2);

    // Targets dominate decoys by score, so PSMs and peptides are accepted
    // at 20% FDR
    assert!(output.psms.iter().all(|r| r.accepted));
    assert!(output.peptides.iter().all(|r| r.accepted));
    // With only two target proteins the smallest reachable group-level q is
    // the corrected (0 + 1) / 2
    for group in &output.protein_groups {
        assert!((group.q_value - 0.5).abs() < 1E-6);
        assert!(!group.accepted);
    }

    // q-values are non-decreasing down each table
    for level in [&output.psms, &output.peptides, &output.protein_groups] {
        for pair in level.windows(2) {
            assert!(pair[0].q_value <= pair[1].q_value || pair[0].score < pair[1].score);
        }
    }

    let membership = output
        .memberships
        .iter()
        .find(|m| m.group_id == "sp|P1")
        .unwrap();
    assert_eq!(membership.peptides.len(), 4);
}

#[test]
fn accepted_flags_respect_threshold() {
    let (table, mapping) = fixture();
    let strict = PipelineSettings {
        fdr_threshold: 0.01,
        rescore: false,
        ..Default::default()
    };
    let output = Pipeline::new(strict).run(&table, &mapping).unwrap();
    // With 8 targets the smallest reachable q is (0+1)/8 > 0.01
    assert!(output.peptides.iter().all(|r| !r.accepted));
    assert!(output.psms.iter().any(|r| !r.accepted));
}

#[test]
fn zero_decoys_fail_at_psm_level_with_partial_output() {
    let records = (0..4)
        .map(|i| record(&format!("scan={}", i), &format!("PEP{}", i), false, 10.0))
        .collect();
    let table = PsmTable::from_records(records).unwrap();
    let mapping = PeptideProteinMap::default();

    let output = Pipeline::new(settings()).run(&table, &mapping).unwrap();
    match output.failed {
        Some((Level::Psm, Error::InsufficientDecoys { level: Level::Psm })) => {}
        other => panic!("expected PSM-level failure, got {:?}", other),
    }
    assert!(output.psms.is_empty());
    assert!(output.peptides.is_empty());
    assert!(output.protein_groups.is_empty());
}

#[test]
fn missing_mapping_aborts_the_run() {
    let (table, mut mapping) = fixture();
    mapping.remove("TARGET0PEP");
    let err = Pipeline::new(settings()).run(&table, &mapping).unwrap_err();
    assert!(matches!(err, Error::InconsistentMapping { peptide } if peptide == "TARGET0PEP"));
}

#[test]
fn conflicting_decoy_flags_fail_before_any_estimation() {
    let records = vec![
        record("s1", "PEPTIDE", false, 10.0),
        record("s1", "PEPTIDE", true, 9.0),
    ];
    let err = PsmTable::from_records(records).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn invalid_threshold_rejected() {
    let (table, mapping) = fixture();
    let bad = PipelineSettings {
        fdr_threshold: 0.0,
        ..Default::default()
    };
    let err = Pipeline::new(bad).run(&table, &mapping).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn rescoring_run_reports_convergence() {
    let (table, mapping) = fixture();
    let rescored = PipelineSettings {
        fdr_threshold: 0.2,
        train_fdr: 0.2,
        rescore: true,
        ..Default::default()
    };
    let output = Pipeline::new(rescored).run(&table, &mapping).unwrap();
    assert!(output.rescoring_converged);
    assert_eq!(output.psms.len(), 16);
}

#[test]
fn settings_deserialize_with_defaults() {
    let settings: PipelineSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings.fdr_threshold, 0.01);
    assert_eq!(settings.max_rescoring_iterations, 10);

    let settings: PipelineSettings = serde_json::from_str(
        r#"{
            "fdr_threshold": 0.05,
            "tie_break": "first_seen",
            "degenerate_peptides": "shared",
            "score_aggregation": { "method": "rank_sum", "k": 3 }
        }"#,
    )
    .unwrap();
    assert_eq!(settings.fdr_threshold, 0.05);
}
