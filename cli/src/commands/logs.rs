use std::os::unix::process::CommandExt;

use color_eyre::eyre::Result;

use crate::config;
use crate::logging;

pub fn run(lines: usize, follow: bool) -> Result<()> {
    let log_files = logging::log_files();

    let Some(path) = log_files.last() else {
        println!("No log files found in {:?}", config::runtime_dir());
        println!("Log files are written by commands that read or change records.");
        return Ok(());
    };

    if follow {
        let err = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(path)
            .exec();
        return Err(err.into());
    }

    std::process::Command::new("tail")
        .args(["-n", &lines.to_string()])
        .arg(path)
        .status()?;

    Ok(())
}
