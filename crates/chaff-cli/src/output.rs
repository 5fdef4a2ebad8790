use anyhow::Context;
use chaff_core::pipeline::{ConfidenceRecord, GroupMembership, PipelineOutput};
use std::path::{Path, PathBuf};

fn join<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(";")
}

fn make_path(directory: &Path, file_name: &str) -> PathBuf {
    directory.join(file_name)
}

fn write_confidence(
    path: &Path,
    entity_column: &str,
    records: &[ConfidenceRecord],
) -> anyhow::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("failed to create {:?}", path))?;

    wtr.write_record([entity_column, "score", "q_value", "accepted"])?;
    for record in records {
        let mut row = csv::ByteRecord::new();
        row.push_field(record.id.as_bytes());
        row.push_field(ryu::Buffer::new().format(record.score).as_bytes());
        row.push_field(ryu::Buffer::new().format(record.q_value).as_bytes());
        row.push_field(match record.accepted {
            true => b"true",
            false => b"false",
        });
        wtr.write_byte_record(&row)?;
    }
    wtr.flush()?;
    log::info!("wrote {} rows to {:?}", records.len(), path);
    Ok(())
}

fn write_memberships(path: &Path, memberships: &[GroupMembership]) -> anyhow::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("failed to create {:?}", path))?;

    wtr.write_record(["group_id", "proteins", "peptides"])?;
    for membership in memberships {
        let mut row = csv::ByteRecord::new();
        row.push_field(membership.group_id.as_bytes());
        row.push_field(join(&membership.proteins).as_bytes());
        row.push_field(join(&membership.peptides).as_bytes());
        wtr.write_byte_record(&row)?;
    }
    wtr.flush()?;
    log::info!("wrote {} protein groups to {:?}", memberships.len(), path);
    Ok(())
}

/// Write the three confidence tables plus the group membership records
pub fn write_output(directory: &Path, output: &PipelineOutput) -> anyhow::Result<()> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("failed to create output directory {:?}", directory))?;

    write_confidence(
        &make_path(directory, "psms.chaff.tsv"),
        "spectrum",
        &output.psms,
    )?;
    write_confidence(
        &make_path(directory, "peptides.chaff.tsv"),
        "peptide",
        &output.peptides,
    )?;
    write_confidence(
        &make_path(directory, "protein_groups.chaff.tsv"),
        "protein_group",
        &output.protein_groups,
    )?;
    write_memberships(
        &make_path(directory, "protein_group_members.chaff.tsv"),
        &output.memberships,
    )?;
    Ok(())
}
