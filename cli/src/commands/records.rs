use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use stride_platform::RecordStore;
use stride_protocol::{Record, RecordType};
use tracing::info;

pub fn import<S: RecordStore + ?Sized>(store: &S, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    let records = Record::list_from_json(&content)
        .wrap_err_with(|| format!("{} is not a JSON array of records", file.display()))?;

    let written = store.insert_records(&records)?;
    info!(written, file = %file.display(), "Imported records");

    println!("Imported {} record(s) from {}", written, file.display());
    for (record_type, count) in count_by_type(&records) {
        println!("  {:<24} {}", record_type.label(), count);
    }

    Ok(())
}

pub fn delete<S: RecordStore + ?Sized>(store: &S, ids: &[String]) -> Result<()> {
    let deleted = store.delete_records(ids)?;

    println!("Deleted {} of {} record(s)", deleted, ids.len());
    if deleted < ids.len() {
        println!("Ids that did not match a record were skipped.");
    }

    Ok(())
}

fn count_by_type(records: &[Record]) -> Vec<(RecordType, usize)> {
    RecordType::ALL
        .into_iter()
        .map(|t| (t, records.iter().filter(|r| r.record_type() == t).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}
