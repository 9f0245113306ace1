use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::RecordType;

/// Statistic a metric computes over its record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Total,
    Min,
    Avg,
    Max,
}

/// Named aggregate the store can compute over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    /// Step count, summed.
    StepsCountTotal,
    /// Energy burned in kilocalories, summed.
    EnergyTotal,
    HeartRateMin,
    HeartRateAvg,
    HeartRateMax,
    SpeedMin,
    SpeedAvg,
    SpeedMax,
    /// Exercise time in seconds, clipped to the window.
    ExerciseDurationTotal,
    WeightAvg,
    WeightMin,
    WeightMax,
}

impl MetricKey {
    pub fn record_type(&self) -> RecordType {
        match self {
            MetricKey::StepsCountTotal => RecordType::Steps,
            MetricKey::EnergyTotal => RecordType::TotalCaloriesBurned,
            MetricKey::HeartRateMin | MetricKey::HeartRateAvg | MetricKey::HeartRateMax => {
                RecordType::HeartRate
            }
            MetricKey::SpeedMin | MetricKey::SpeedAvg | MetricKey::SpeedMax => RecordType::Speed,
            MetricKey::ExerciseDurationTotal => RecordType::ExerciseSession,
            MetricKey::WeightAvg | MetricKey::WeightMin | MetricKey::WeightMax => {
                RecordType::Weight
            }
        }
    }

    pub fn statistic(&self) -> Statistic {
        match self {
            MetricKey::StepsCountTotal
            | MetricKey::EnergyTotal
            | MetricKey::ExerciseDurationTotal => Statistic::Total,
            MetricKey::HeartRateMin | MetricKey::SpeedMin | MetricKey::WeightMin => Statistic::Min,
            MetricKey::HeartRateAvg | MetricKey::SpeedAvg | MetricKey::WeightAvg => Statistic::Avg,
            MetricKey::HeartRateMax | MetricKey::SpeedMax | MetricKey::WeightMax => Statistic::Max,
        }
    }
}

/// Values computed by one aggregate query.
///
/// A missing key means the metric had no data in the window. It is never
/// stored as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateResult(BTreeMap<MetricKey, f64>);

impl AggregateResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-finite values are dropped so they read back as absent.
    pub fn insert(&mut self, key: MetricKey, value: f64) {
        if value.is_finite() {
            self.0.insert(key, value);
        }
    }

    pub fn get(&self, key: MetricKey) -> Option<f64> {
        self.0.get(&key).copied()
    }

    /// Value rounded to a whole count, for step totals.
    pub fn count(&self, key: MetricKey) -> Option<u64> {
        self.get(key).map(|v| v.max(0.0).round() as u64)
    }

    /// Value rounded to whole seconds, for durations.
    pub fn seconds(&self, key: MetricKey) -> Option<i64> {
        self.get(key).map(|v| v.round() as i64)
    }

    pub fn contains(&self, key: MetricKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(MetricKey, f64)> for AggregateResult {
    fn from_iter<I: IntoIterator<Item = (MetricKey, f64)>>(iter: I) -> Self {
        let mut result = AggregateResult::new();
        for (key, value) in iter {
            result.insert(key, value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_not_zero() {
        let mut result = AggregateResult::new();
        result.insert(MetricKey::StepsCountTotal, 0.0);

        assert_eq!(result.count(MetricKey::StepsCountTotal), Some(0));
        assert_eq!(result.get(MetricKey::HeartRateAvg), None);
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        let result: AggregateResult = [(MetricKey::SpeedAvg, f64::NAN)].into_iter().collect();
        assert!(result.is_empty());
    }

    #[test]
    fn test_metric_record_types() {
        assert_eq!(MetricKey::HeartRateMin.record_type(), RecordType::HeartRate);
        assert_eq!(
            MetricKey::ExerciseDurationTotal.record_type(),
            RecordType::ExerciseSession
        );
        assert_eq!(MetricKey::WeightAvg.statistic(), Statistic::Avg);
    }
}
