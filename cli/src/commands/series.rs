use color_eyre::eyre::Result;
use stride_engine::{EngineError, SessionAggregator};
use stride_platform::RecordStore;
use stride_protocol::SamplePoint;

use super::format::format_time;
use crate::cli::SeriesMetric;

pub fn run<S: RecordStore + ?Sized>(
    store: &S,
    session_id: &str,
    metric: SeriesMetric,
    json: bool,
) -> Result<()> {
    let (_, series) = match SessionAggregator::new(store).series(session_id) {
        Ok(found) => found,
        Err(EngineError::SessionNotFound(id)) => {
            eprintln!("No exercise session with id '{}'.", id);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let (points, unit) = match metric {
        SeriesMetric::HeartRate => (&series.heart_rate_series, "bpm"),
        SeriesMetric::Speed => (&series.speed_series, "m/s"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(points)?);
        return Ok(());
    }

    if points.is_empty() {
        println!("No {} samples for this session.", metric_label(metric));
        return Ok(());
    }

    for line in render(points, unit) {
        println!("{}", line);
    }

    Ok(())
}

fn metric_label(metric: SeriesMetric) -> &'static str {
    match metric {
        SeriesMetric::HeartRate => "heart-rate",
        SeriesMetric::Speed => "speed",
    }
}

fn render(points: &[SamplePoint], unit: &str) -> Vec<String> {
    points
        .iter()
        .map(|p| format!("{}  {:>7.2} {}", format_time(p.time), p.value, unit))
        .collect()
}
