use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::records::{Record, SessionRecord};

/// Chart-ready point; `time` is truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub time: DateTime<FixedOffset>,
    pub value: f64,
}

/// Everything known about one exercise session.
///
/// Every numeric field is independently optional: `None` means the platform
/// had no data, which is different from a measured zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session: SessionRecord,
    pub active_duration_secs: Option<i64>,
    /// Steps inside the session window, from every origin.
    pub total_steps: Option<u64>,
    /// Steps over the whole local day the session started on.
    pub total_steps_for_day: Option<u64>,
    pub total_energy_kcal: Option<f64>,
    pub min_heart_rate: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub min_speed: Option<f64>,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub heart_rate_records: Vec<Record>,
    #[serde(default)]
    pub speed_records: Vec<Record>,
    #[serde(default)]
    pub heart_rate_series: Vec<SamplePoint>,
    #[serde(default)]
    pub speed_series: Vec<SamplePoint>,
}

impl SessionSummary {
    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn has_heart_rate(&self) -> bool {
        self.min_heart_rate.is_some() || self.avg_heart_rate.is_some() || self.max_heart_rate.is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
