use chrono::{DateTime, FixedOffset, Local};
use color_eyre::eyre::Result;
use stride_engine::{HistoryQueries, RecordWriter};
use stride_platform::RecordStore;
use stride_protocol::{DataOrigin, Record, RecordPayload, ZoneOffset};

use super::format::period_window;
use super::record::MANUAL_ORIGIN;

pub fn add<S: RecordStore + ?Sized>(store: &S, kilograms: f64) -> Result<()> {
    let record = add_at(store, kilograms, Local::now().fixed_offset())?;
    if let Some(line) = row(&record) {
        println!("Recorded {}", line.trim_start());
    }
    Ok(())
}

/// Writes a weight reading taken at `at`, keeping `at`'s offset.
pub fn add_at<S: RecordStore + ?Sized>(
    store: &S,
    kilograms: f64,
    at: DateTime<FixedOffset>,
) -> Result<Record> {
    let writer = RecordWriter::new(store, DataOrigin::new(MANUAL_ORIGIN));
    Ok(writer.write_weight(kilograms, at)?)
}

pub fn run<S: RecordStore + ?Sized>(store: &S, period: &str) -> Result<()> {
    let window = period_window(period, Local::now().fixed_offset())?;
    let history = HistoryQueries::new(store);
    let readings = history.read_weights(&window)?;

    println!("Weight ({})", period);
    println!("{}", "=".repeat(40));

    if readings.is_empty() {
        println!("No weight readings in this period.");
        return Ok(());
    }

    for record in &readings {
        if let Some(line) = row(record) {
            println!("{}", line);
        }
    }

    if let Some(average) = history.average_weight(&window)? {
        println!();
        println!("Average:  {:.1} kg over {} reading(s)", average, readings.len());
    }

    Ok(())
}

fn row(record: &Record) -> Option<String> {
    let RecordPayload::Weight { kilograms } = &record.payload else {
        return None;
    };
    let offset = record.zone_offset().unwrap_or(ZoneOffset::UTC).to_fixed();
    Some(format!(
        "{}  {:>6.1} kg",
        record.start.with_timezone(&offset).format("%Y-%m-%d %H:%M"),
        kilograms
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use stride_platform::MemoryStore;
    use stride_protocol::TimeWindow;

    #[test]
    fn test_added_weight_is_read_back_in_local_time() {
        let store = MemoryStore::new();
        let at = FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 7, 5, 0)
            .unwrap();

        let record = add_at(&store, 70.5, at).unwrap();
        add_at(&store, 71.5, at + chrono::Duration::hours(1)).unwrap();

        assert_eq!(record.start, Utc.with_ymd_and_hms(2024, 3, 4, 22, 5, 0).unwrap());
        assert_eq!(record.origin, DataOrigin::new(MANUAL_ORIGIN));
        assert_eq!(row(&record).unwrap(), "2024-03-05 07:05    70.5 kg");

        let day = TimeWindow::day_of(at);
        let history = HistoryQueries::new(&store);
        assert_eq!(history.read_weights(&day).unwrap().len(), 2);
        assert_eq!(history.average_weight(&day).unwrap(), Some(71.0));
    }

    #[test]
    fn test_rejects_non_positive_weight() {
        let store = MemoryStore::new();

        assert!(add_at(&store, 0.0, Local::now().fixed_offset()).is_err());
        assert!(store.is_empty());
    }
}
