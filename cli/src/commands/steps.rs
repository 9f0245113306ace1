use color_eyre::eyre::Result;
use stride_engine::SessionAggregator;
use stride_platform::RecordStore;

use super::format::day_instant;

pub fn run<S: RecordStore + ?Sized>(
    store: &S,
    date: Option<&str>,
    offset: Option<&str>,
) -> Result<()> {
    let day = day_instant(date, offset)?;
    let steps = SessionAggregator::new(store).total_steps_for_day(day)?;

    let label = format!("{} ({})", day.format("%Y-%m-%d"), day.format("%:z"));
    match steps {
        Some(steps) => println!("Steps on {}: {}", label, steps),
        None => println!("No step data for {}.", label),
    }

    Ok(())
}
