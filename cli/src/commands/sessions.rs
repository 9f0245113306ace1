use chrono::Local;
use color_eyre::eyre::Result;
use stride_engine::HistoryQueries;
use stride_platform::RecordStore;
use stride_protocol::SessionRecord;

use super::format::{format_duration, period_window, truncate_str};

pub fn run<S: RecordStore + ?Sized>(store: &S, period: &str) -> Result<()> {
    let window = period_window(period, Local::now().fixed_offset())?;
    let sessions = HistoryQueries::new(store).read_exercise_sessions(&window)?;

    println!("Exercise Sessions ({})", period);
    println!("{}", "=".repeat(78));

    if sessions.is_empty() {
        println!("No sessions in this period.");
        println!("\nImport records first:");
        println!("  stride import records.json");
        return Ok(());
    }

    println!(
        "{:<17} {:>9}  {:<18} {:<28}",
        "Start", "Duration", "Type", "Id"
    );
    println!("{}", "-".repeat(78));
    for session in &sessions {
        println!("{}", row(session));
    }

    let total: i64 = sessions.iter().map(SessionRecord::duration_secs).sum();
    println!();
    println!(
        "{} session(s), {} total",
        sessions.len(),
        format_duration(total)
    );

    Ok(())
}

fn row(session: &SessionRecord) -> String {
    format!(
        "{:<17} {:>9}  {:<18} {:<28}",
        session.local_start().format("%Y-%m-%d %H:%M"),
        format_duration(session.duration_secs()),
        truncate_str(&session.display_title(), 18),
        truncate_str(&session.id, 28)
    )
}
