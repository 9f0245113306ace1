//! Aggregate computation shared by the in-process stores.

use std::collections::{BTreeMap, BTreeSet};

use stride_protocol::{
    AggregateResult, MetricKey, Record, RecordPayload, RecordType, Statistic, TimeWindow,
};

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    fn get(&self, statistic: Statistic) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(match statistic {
            Statistic::Total => self.sum,
            Statistic::Min => self.min,
            Statistic::Avg => self.sum / self.count as f64,
            Statistic::Max => self.max,
        })
    }
}

/// Computes `metrics` over the records that overlap `window` and pass its origin filter.
///
/// Interval records (steps, energy) count in full when they overlap the window.
/// Samples and instantaneous records count only when their time lies inside it.
/// Exercise duration is clipped to the window.
pub fn aggregate_records<'a>(
    metrics: &BTreeSet<MetricKey>,
    window: &TimeWindow,
    records: impl IntoIterator<Item = &'a Record>,
) -> AggregateResult {
    let wanted: BTreeSet<RecordType> = metrics.iter().map(|m| m.record_type()).collect();
    let mut accumulators: BTreeMap<RecordType, Accumulator> = BTreeMap::new();

    for record in records {
        let record_type = record.record_type();
        if !wanted.contains(&record_type)
            || !record.overlaps(window)
            || !window.accepts_origin(&record.origin)
        {
            continue;
        }

        let acc = accumulators.entry(record_type).or_default();
        match &record.payload {
            RecordPayload::Steps { count } => acc.push(*count as f64),
            RecordPayload::TotalCaloriesBurned { kilocalories } => acc.push(*kilocalories),
            RecordPayload::HeartRate { samples } | RecordPayload::Speed { samples } => {
                for sample in samples.iter().filter(|s| window.contains(s.time)) {
                    acc.push(sample.value);
                }
            }
            RecordPayload::ExerciseSession { .. } => {
                acc.push(window.overlap_secs(record.start, record.end) as f64);
            }
            RecordPayload::Weight { kilograms } => {
                if window.contains(record.start) {
                    acc.push(*kilograms);
                }
            }
        }
    }

    metrics
        .iter()
        .filter_map(|metric| {
            accumulators
                .get(&metric.record_type())
                .and_then(|acc| acc.get(metric.statistic()))
                .map(|value| (*metric, value))
        })
        .collect()
}
