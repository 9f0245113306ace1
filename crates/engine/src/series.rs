//! Flattening of per-record sample series into chart points.

use chrono::{DateTime, FixedOffset, Timelike};
use stride_protocol::{Record, SamplePoint};
use tracing::debug;

/// Turns the samples of `records` into one ascending list of points.
///
/// Each record's samples are placed in its start offset, or its end offset if
/// the start one is missing. Records with neither offset are skipped. Times are
/// truncated to whole seconds and the sort is stable, so samples sharing a
/// second keep their input order.
pub fn flatten<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<SamplePoint> {
    let mut points = Vec::new();

    for record in records {
        let samples = record.samples();
        if samples.is_empty() {
            continue;
        }

        let Some(offset) = record.zone_offset() else {
            debug!(
                record_id = %record.id,
                samples = samples.len(),
                "Dropping samples from record without zone offset"
            );
            continue;
        };
        let offset = offset.to_fixed();

        points.extend(samples.iter().map(|sample| SamplePoint {
            time: truncate_to_second(sample.time.with_timezone(&offset)),
            value: sample.value,
        }));
    }

    points.sort_by_key(|point| point.time);
    points
}

fn truncate_to_second(time: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    time.with_nanosecond(0).unwrap_or(time)
}
