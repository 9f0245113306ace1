use chrono::{DateTime, Duration, FixedOffset, Local};
use color_eyre::eyre::{eyre, Result};
use rand::Rng;
use stride_engine::{RecordWriter, SessionDraft};
use stride_platform::RecordStore;
use stride_protocol::{DataOrigin, ExerciseType, SessionRecord};

use super::format::{format_duration, format_time, parse_start};

/// Origin stamped on everything this CLI writes.
pub const MANUAL_ORIGIN: &str = "dev.stride.cli";

#[derive(Debug, Clone)]
pub struct RecordArgs {
    pub start: Option<String>,
    pub duration: String,
    pub exercise: String,
    pub title: Option<String>,
    pub steps: Option<u64>,
    pub kcal: Option<f64>,
}

pub fn run<S: RecordStore + ?Sized>(store: &S, args: &RecordArgs) -> Result<()> {
    let mut rng = rand::thread_rng();
    let now = Local::now().fixed_offset();
    let draft = build_draft(args, now, &mut rng)?;
    let session = record_session(store, &draft, &mut rng)?;

    println!("Recorded session {}", session.id);
    println!("  {}", session.display_title());
    println!(
        "  {} to {} ({})",
        format_time(session.local_start()),
        format_time(session.local_end()),
        format_duration(session.duration_secs())
    );
    println!("  {} steps, {:.0} kcal", draft.steps, draft.energy_kcal);

    Ok(())
}

/// Writes `draft` with a heart-rate series drawn from `rng`.
pub fn record_session<S: RecordStore + ?Sized>(
    store: &S,
    draft: &SessionDraft,
    rng: &mut impl Rng,
) -> Result<SessionRecord> {
    let writer = RecordWriter::new(store, DataOrigin::new(MANUAL_ORIGIN));
    Ok(writer.write_exercise_session(draft, |_| rng.gen_range(80..160) as f64)?)
}

/// Fills in everything the user left out. Missing steps, energy and title are
/// generated; a missing start means the session just ended.
pub fn build_draft(
    args: &RecordArgs,
    now: DateTime<FixedOffset>,
    rng: &mut impl Rng,
) -> Result<SessionDraft> {
    let length = humantime::parse_duration(&args.duration)
        .map_err(|e| eyre!("invalid duration '{}': {}", args.duration, e))?;
    let length = Duration::from_std(length)?;
    if length <= Duration::zero() {
        return Err(eyre!("session duration must be longer than zero"));
    }

    let start = match args.start.as_deref() {
        Some(raw) => parse_start(raw, now)?,
        None => now - length,
    };
    let exercise_type: ExerciseType = args.exercise.parse().map_err(|e: String| eyre!(e))?;

    let title = args
        .title
        .clone()
        .unwrap_or_else(|| format!("My {} #{}", exercise_type.label(), rng.gen_range(0..60)));

    Ok(SessionDraft {
        start,
        end: start + length,
        exercise_type,
        title: Some(title),
        steps: args
            .steps
            .unwrap_or_else(|| 1_000 + 1_000 * rng.gen_range(0..3u64)),
        energy_kcal: args
            .kcal
            .unwrap_or_else(|| rng.gen_range(140..160) as f64),
    })
}
