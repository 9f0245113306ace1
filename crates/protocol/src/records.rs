use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::window::TimeWindow;

/// Kinds of record the health platform stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    ExerciseSession,
    Steps,
    TotalCaloriesBurned,
    HeartRate,
    Speed,
    Weight,
}

impl RecordType {
    pub const ALL: [RecordType; 6] = [
        RecordType::ExerciseSession,
        RecordType::Steps,
        RecordType::TotalCaloriesBurned,
        RecordType::HeartRate,
        RecordType::Speed,
        RecordType::Weight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::ExerciseSession => "exercise_session",
            RecordType::Steps => "steps",
            RecordType::TotalCaloriesBurned => "total_calories_burned",
            RecordType::HeartRate => "heart_rate",
            RecordType::Speed => "speed",
            RecordType::Weight => "weight",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordType::ExerciseSession => "Exercise session",
            RecordType::Steps => "Steps",
            RecordType::TotalCaloriesBurned => "Calories burned",
            RecordType::HeartRate => "Heart rate",
            RecordType::Speed => "Speed",
            RecordType::Weight => "Weight",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown record type: {}", s))
    }
}

/// Identifier of the application that authored a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataOrigin(String);

impl DataOrigin {
    pub fn new(package: impl Into<String>) -> Self {
        Self(package.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Offset from UTC recorded alongside an instant, in seconds.
///
/// Limited to +/-18 hours, the range every platform clock accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct ZoneOffset(i32);

impl ZoneOffset {
    pub const UTC: ZoneOffset = ZoneOffset(0);
    pub const MAX_SECONDS: i32 = 18 * 3600;

    pub fn from_seconds(seconds: i32) -> Option<Self> {
        (seconds.abs() <= Self::MAX_SECONDS).then_some(Self(seconds))
    }

    pub fn from_hours(hours: i32) -> Option<Self> {
        Self::from_seconds(hours.checked_mul(3600)?)
    }

    pub fn seconds(&self) -> i32 {
        self.0
    }

    pub fn to_fixed(&self) -> FixedOffset {
        FixedOffset::east_opt(self.0).unwrap_or_else(|| Utc.fix())
    }
}

impl From<FixedOffset> for ZoneOffset {
    fn from(offset: FixedOffset) -> Self {
        Self(offset.local_minus_utc())
    }
}

impl From<ZoneOffset> for i32 {
    fn from(offset: ZoneOffset) -> Self {
        offset.0
    }
}

impl TryFrom<i32> for ZoneOffset {
    type Error = String;

    fn try_from(seconds: i32) -> Result<Self, Self::Error> {
        ZoneOffset::from_seconds(seconds)
            .ok_or_else(|| format!("zone offset out of range: {}s", seconds))
    }
}

impl fmt::Display for ZoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { '-' } else { '+' };
        let abs = self.0.abs();
        write!(f, "{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
    }
}

impl FromStr for ZoneOffset {
    type Err = String;

    /// Accepts `Z`, `+09`, `+0930` and `+09:30` forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
            return Ok(ZoneOffset::UTC);
        }

        let invalid = || format!("invalid zone offset: {}", s);
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };

        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let (hours, minutes) = match digits.len() {
            2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
            4 => (
                digits[..2].parse::<i32>().map_err(|_| invalid())?,
                digits[2..].parse::<i32>().map_err(|_| invalid())?,
            ),
            _ => return Err(invalid()),
        };

        if minutes >= 60 {
            return Err(invalid());
        }

        ZoneOffset::from_seconds(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
    }
}

/// A single timestamped measurement inside a series record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSample {
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl SeriesSample {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self { time, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Running,
    Walking,
    Biking,
    Swimming,
    Hiking,
    StrengthTraining,
    Yoga,
    #[default]
    Other,
}

impl ExerciseType {
    pub fn label(&self) -> &'static str {
        match self {
            ExerciseType::Running => "Running",
            ExerciseType::Walking => "Walking",
            ExerciseType::Biking => "Biking",
            ExerciseType::Swimming => "Swimming",
            ExerciseType::Hiking => "Hiking",
            ExerciseType::StrengthTraining => "Strength training",
            ExerciseType::Yoga => "Yoga",
            ExerciseType::Other => "Other",
        }
    }
}

impl FromStr for ExerciseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "running" | "run" => Ok(ExerciseType::Running),
            "walking" | "walk" => Ok(ExerciseType::Walking),
            "biking" | "cycling" => Ok(ExerciseType::Biking),
            "swimming" | "swim" => Ok(ExerciseType::Swimming),
            "hiking" | "hike" => Ok(ExerciseType::Hiking),
            "strength_training" | "strength" => Ok(ExerciseType::StrengthTraining),
            "yoga" => Ok(ExerciseType::Yoga),
            "other" => Ok(ExerciseType::Other),
            _ => Err(format!("unknown exercise type: {}", s)),
        }
    }
}

/// Type-specific content of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordPayload {
    ExerciseSession {
        #[serde(default)]
        exercise_type: ExerciseType,
        #[serde(default)]
        title: Option<String>,
    },
    Steps {
        count: u64,
    },
    TotalCaloriesBurned {
        kilocalories: f64,
    },
    HeartRate {
        samples: Vec<SeriesSample>,
    },
    Speed {
        samples: Vec<SeriesSample>,
    },
    Weight {
        kilograms: f64,
    },
}

impl RecordPayload {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordPayload::ExerciseSession { .. } => RecordType::ExerciseSession,
            RecordPayload::Steps { .. } => RecordType::Steps,
            RecordPayload::TotalCaloriesBurned { .. } => RecordType::TotalCaloriesBurned,
            RecordPayload::HeartRate { .. } => RecordType::HeartRate,
            RecordPayload::Speed { .. } => RecordType::Speed,
            RecordPayload::Weight { .. } => RecordType::Weight,
        }
    }
}

/// A record as stored by the health platform.
///
/// Instantaneous records (weight) have `start == end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub origin: DataOrigin,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub start_offset: Option<ZoneOffset>,
    #[serde(default)]
    pub end_offset: Option<ZoneOffset>,
    pub payload: RecordPayload,
}

impl Record {
    pub fn record_type(&self) -> RecordType {
        self.payload.record_type()
    }

    /// Samples of a series record; empty for every other kind.
    pub fn samples(&self) -> &[SeriesSample] {
        match &self.payload {
            RecordPayload::HeartRate { samples } | RecordPayload::Speed { samples } => samples,
            _ => &[],
        }
    }

    /// Offset used to render this record's times: start offset first, then end offset.
    pub fn zone_offset(&self) -> Option<ZoneOffset> {
        self.start_offset.or(self.end_offset)
    }

    pub fn overlaps(&self, window: &TimeWindow) -> bool {
        self.start <= window.end() && self.end >= window.start()
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// Checks the invariants the store relies on before accepting a write.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("record id must not be empty".to_string());
        }
        if self.start > self.end {
            return Err(format!("record {} ends before it starts", self.id));
        }
        if self.record_type() == RecordType::Weight && self.start != self.end {
            return Err(format!("weight record {} must be instantaneous", self.id));
        }
        match &self.payload {
            RecordPayload::TotalCaloriesBurned { kilocalories } if !kilocalories.is_finite() => {
                Err(format!("record {} has a non-finite energy value", self.id))
            }
            RecordPayload::Weight { kilograms } if !kilograms.is_finite() || *kilograms <= 0.0 => {
                Err(format!("record {} has an invalid weight", self.id))
            }
            RecordPayload::HeartRate { samples } | RecordPayload::Speed { samples } => {
                if samples.iter().any(|s| !s.value.is_finite()) {
                    Err(format!("record {} has a non-finite sample", self.id))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    pub fn list_from_json(s: &str) -> Result<Vec<Record>, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// An exercise session resolved by id, with the fields aggregation needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub origin: DataOrigin,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub start_offset: Option<ZoneOffset>,
    pub end_offset: Option<ZoneOffset>,
    pub exercise_type: ExerciseType,
    pub title: Option<String>,
}

impl SessionRecord {
    /// Returns `None` when the record is not an exercise session.
    pub fn from_record(record: &Record) -> Option<Self> {
        match &record.payload {
            RecordPayload::ExerciseSession {
                exercise_type,
                title,
            } => Some(Self {
                id: record.id.clone(),
                origin: record.origin.clone(),
                start: record.start,
                end: record.end,
                start_offset: record.start_offset,
                end_offset: record.end_offset,
                exercise_type: *exercise_type,
                title: title.clone(),
            }),
            _ => None,
        }
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    pub fn zone_offset(&self) -> Option<ZoneOffset> {
        self.start_offset.or(self.end_offset)
    }

    /// Session start rendered in its recorded zone.
    ///
    /// Falls back to the end offset, then to UTC when the platform stored neither.
    pub fn local_start(&self) -> DateTime<FixedOffset> {
        let offset = self.zone_offset().unwrap_or(ZoneOffset::UTC);
        self.start.with_timezone(&offset.to_fixed())
    }

    pub fn local_end(&self) -> DateTime<FixedOffset> {
        let offset = self
            .end_offset
            .or(self.start_offset)
            .unwrap_or(ZoneOffset::UTC);
        self.end.with_timezone(&offset.to_fixed())
    }

    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.exercise_type.label().to_string())
    }
}
