//! Emit the host setup script for one shot.

use std::path::PathBuf;

use shotline_common::config::AppConfig;
use shotline_pipeline::shot::{ShotContext, ShotJob};
use shotline_script::ScriptEmitter;

pub fn run(
    config: &AppConfig,
    master: PathBuf,
    animation: PathBuf,
    output: PathBuf,
    range_csv: Option<PathBuf>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut job = ShotJob::new(master, animation, output);
    if let Some(csv) = range_csv {
        job = job.with_range_table(csv);
    }

    let context = ShotContext::prepare(&job, config)
        .map_err(|e| anyhow::anyhow!("Failed to prepare shot: {e}"))?;
    let emitter = ScriptEmitter::new()?;
    let script = emitter.emit(&job, &context, config)?;

    match out {
        Some(path) => {
            std::fs::write(&path, &script)?;
            eprintln!("Wrote setup script for {} to {}", context.identity, path.display());
        }
        None => print!("{script}"),
    }
    Ok(())
}
