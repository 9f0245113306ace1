use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeriesMetric {
    HeartRate,
    Speed,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Summarize one exercise session
    #[command(alias = "s")]
    Summary {
        session_id: String,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the chart series of a session
    Series {
        session_id: String,

        #[arg(short, long, value_enum, default_value_t = SeriesMetric::HeartRate)]
        metric: SeriesMetric,

        #[arg(long)]
        json: bool,
    },

    /// Pull changes since the last sync
    #[command(alias = "sync")]
    Changes {
        /// Forget the saved token and subscribe again from now
        #[arg(long)]
        reset: bool,

        #[arg(long)]
        json: bool,
    },

    /// List exercise sessions
    Sessions {
        /// today, week, month, year or all
        #[arg(short, long, default_value = "week")]
        period: String,
    },

    /// Total steps for a calendar day
    Steps {
        /// YYYY-MM-DD, defaults to today
        #[arg(short, long)]
        date: Option<String>,

        /// Zone offset such as +09:00, defaults to the local offset
        #[arg(short, long, allow_hyphen_values = true)]
        offset: Option<String>,
    },

    /// Record a finished exercise session with steps, energy and heart rate
    Record {
        /// Start as RFC 3339 or HH:MM today, defaults to `duration` ago
        #[arg(short, long)]
        start: Option<String>,

        /// Session length, e.g. 30m or 1h 15m
        #[arg(short, long, default_value = "30m")]
        duration: String,

        /// running, walking, biking, swimming, hiking, strength, yoga or other
        #[arg(short, long, default_value = "running")]
        exercise: String,

        #[arg(short, long)]
        title: Option<String>,

        /// Step count, generated when omitted
        #[arg(long)]
        steps: Option<u64>,

        /// Energy in kcal, generated when omitted
        #[arg(long)]
        kcal: Option<f64>,
    },

    /// Weight readings and their average
    Weight {
        #[command(subcommand)]
        action: Option<WeightAction>,

        #[arg(short, long, default_value = "week")]
        period: String,
    },

    /// Import records from a JSON array
    Import { file: PathBuf },

    /// Delete records by id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show or edit configuration
    Config {
        /// Print config file path
        #[arg(long)]
        path: bool,

        /// Reset config to defaults
        #[arg(long)]
        reset: bool,

        /// Open config file in $EDITOR
        #[arg(short, long)]
        edit: bool,
    },

    /// Show recent log output
    Logs {
        #[arg(short, long, default_value_t = 50)]
        lines: usize,

        #[arg(short, long)]
        follow: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum WeightAction {
    /// Record a weight reading taken now
    Add {
        /// Weight in kilograms
        kilograms: f64,
    },
}

/// Health-record sync and session summaries
#[derive(Debug, Parser)]
#[command(name = "stride", version, verbatim_doc_comment)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Record database to use instead of the configured one
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,
}
