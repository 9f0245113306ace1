use std::fmt::Write;

use color_eyre::eyre::Result;
use stride_engine::{EngineError, SessionAggregator};
use stride_platform::RecordStore;
use stride_protocol::SessionSummary;

use super::format::{format_duration, format_time, or_dash, or_dash_f64};

pub fn run<S: RecordStore + ?Sized>(store: &S, session_id: &str, json: bool) -> Result<()> {
    let summary = match SessionAggregator::new(store).summarize(session_id) {
        Ok(summary) => summary,
        Err(EngineError::SessionNotFound(id)) => {
            eprintln!("No exercise session with id '{}'.", id);
            eprintln!("List recent sessions with: stride sessions --period month");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", summary.to_json_pretty()?);
    } else {
        print!("{}", render(&summary));
    }

    Ok(())
}

fn min_avg_max(min: Option<f64>, avg: Option<f64>, max: Option<f64>, unit: &str) -> String {
    if min.is_none() && avg.is_none() && max.is_none() {
        return "-".to_string();
    }
    format!(
        "{} / {} / {} {}",
        or_dash_f64(min, 1),
        or_dash_f64(avg, 1),
        or_dash_f64(max, 1),
        unit
    )
}

pub fn render(summary: &SessionSummary) -> String {
    let session = &summary.session;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} ({})",
        session.display_title(),
        session.exercise_type.label()
    );
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "Session:          {}", session.id);
    let _ = writeln!(out, "Source:           {}", session.origin);
    let _ = writeln!(out, "Start:            {}", format_time(session.local_start()));
    let _ = writeln!(out, "End:              {}", format_time(session.local_end()));
    let _ = writeln!(out, "Duration:         {}", format_duration(session.duration_secs()));
    let _ = writeln!(
        out,
        "Active time:      {}",
        summary
            .active_duration_secs
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(out, "Steps:            {}", or_dash(summary.total_steps));
    let _ = writeln!(out, "Steps (day):      {}", or_dash(summary.total_steps_for_day));
    let _ = writeln!(
        out,
        "Energy:           {}",
        summary
            .total_energy_kcal
            .map(|kcal| format!("{:.1} kcal", kcal))
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(
        out,
        "Heart rate:       {}",
        min_avg_max(
            summary.min_heart_rate,
            summary.avg_heart_rate,
            summary.max_heart_rate,
            "bpm"
        )
    );
    let _ = writeln!(
        out,
        "Speed:            {}",
        min_avg_max(summary.min_speed, summary.avg_speed, summary.max_speed, "m/s")
    );
    let _ = writeln!(
        out,
        "Series points:    {} heart rate, {} speed",
        summary.heart_rate_series.len(),
        summary.speed_series.len()
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use stride_protocol::{DataOrigin, ExerciseType, SessionRecord, ZoneOffset};

    fn summary() -> SessionSummary {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 23, 0, 0).unwrap();
        SessionSummary {
            session: SessionRecord {
                id: "run-1".to_string(),
                origin: DataOrigin::new("com.example.run"),
                start,
                end: start + Duration::minutes(30),
                start_offset: ZoneOffset::from_hours(9),
                end_offset: ZoneOffset::from_hours(9),
                exercise_type: ExerciseType::Running,
                title: None,
            },
            active_duration_secs: Some(1_800),
            total_steps: Some(3_000),
            total_steps_for_day: Some(12_000),
            total_energy_kcal: None,
            min_heart_rate: Some(100.0),
            avg_heart_rate: Some(120.0),
            max_heart_rate: Some(140.0),
            min_speed: None,
            avg_speed: None,
            max_speed: None,
            heart_rate_records: Vec::new(),
            speed_records: Vec::new(),
            heart_rate_series: Vec::new(),
            speed_series: Vec::new(),
        }
    }

    #[test]
    fn test_render_summary() {
        let text = render(&summary());

        assert!(text.starts_with("Running (Running)\n"));
        assert!(text.contains("Start:            2024-03-05 08:00:00 +09:00"));
        assert!(text.contains("Active time:      30m"));
        assert!(text.contains("Steps:            3000"));
        assert!(text.contains("Steps (day):      12000"));
        assert!(text.contains("Energy:           -"));
        assert!(text.contains("Heart rate:       100.0 / 120.0 / 140.0 bpm"));
        assert!(text.contains("Speed:            -"));
    }
}
