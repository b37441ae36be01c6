//! Run the shot setup against JSON scene documents.

use std::path::PathBuf;

use shotline_common::config::AppConfig;
use shotline_pipeline::shot::{run_shot, ShotJob};
use shotline_scene_host::memory::MemoryScene;

pub fn run(
    config: &AppConfig,
    scene: PathBuf,
    library: PathBuf,
    output: PathBuf,
    range_csv: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let mut job = ShotJob::new(scene, library, output);
    if let Some(csv) = range_csv {
        job = job.with_range_table(csv);
    }

    let mut host = MemoryScene::new();
    let report = run_shot(&mut host, &job, config)
        .map_err(|e| anyhow::anyhow!("Shot setup failed: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Shot: {}", report.identity);
    match report.range {
        Some(range) => println!(
            "  Frames: {} - {} (step {})",
            range.start, range.end, range.step
        ),
        None => println!("  Frames: unchanged"),
    }
    println!(
        "  Camera: {}",
        report.active_camera.as_deref().unwrap_or("none")
    );
    println!();

    println!("Linked collections:");
    for linked in &report.links.linked {
        let note = if linked.already_linked {
            " (already linked)"
        } else {
            ""
        };
        println!("  {} <- {}{note}", linked.bucket, linked.name);
    }
    if !report.links.missing.is_empty() {
        println!("Missing:");
        for name in &report.links.missing {
            println!("  - {name}");
        }
    }
    println!();

    println!("Outputs:");
    println!("  Beauty: {}", report.graph.beauty.target.base_path());
    println!("  Alpha:  {}", report.graph.alpha.target.base_path());
    if let Some(count) = report.holdout {
        println!("  Holdout: {count} layer collection(s)");
    }
    println!("\nSaved {}", report.output_file.display());
    Ok(())
}
