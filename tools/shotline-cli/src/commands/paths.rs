//! Show the identity and render output paths of a shot file.

use std::path::PathBuf;

use serde::Serialize;

use shotline_common::config::AppConfig;
use shotline_pipeline::compositor::{ALPHA_LAYER, BEAUTY_LAYER};
use shotline_shot_model::identity::{ShotCode, ShotIdentity};
use shotline_shot_model::paths::{shot_dir, PathResolver};

#[derive(Serialize)]
struct PathsReport {
    identity: ShotIdentity,
    shot_code: Option<String>,
    volume: String,
    shot_root: String,
    beauty: String,
    alpha: String,
    /// Per-shot working directory, when a division was asked for.
    #[serde(skip_serializing_if = "Option::is_none")]
    work_dir: Option<String>,
}

pub fn run(
    config: &AppConfig,
    file: PathBuf,
    division: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let resolver = PathResolver::new(&config.paths);
    let identity = ShotIdentity::from_path(&file, resolver.projects());
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let work_dir = division.map(|division| {
        let project = resolver.project_root(resolver.projects().title_for(&identity.prefix_token));
        shot_dir(
            &project,
            &division,
            identity.episode.trim_start_matches("ep"),
            identity.sequence.trim_start_matches("sq"),
            identity.shot.trim_start_matches("sh"),
        )
        .to_string_lossy()
        .into_owned()
    });

    let report = PathsReport {
        shot_code: ShotCode::find(&stem).ok().map(|code| code.to_string()),
        volume: resolver.volume_code(&identity).to_string(),
        shot_root: resolver.shot_root(&identity),
        beauty: resolver.resolve(&identity, BEAUTY_LAYER),
        alpha: resolver.resolve(&identity, ALPHA_LAYER),
        work_dir,
        identity,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Shot: {}", report.identity);
    if report.identity.is_fallback() {
        println!("  (no shot tokens in file name, using fallback identity)");
    }
    println!(
        "  Shot code: {}",
        report.shot_code.as_deref().unwrap_or("none")
    );
    println!("  Volume: {}", report.volume);
    println!("  Shot root: {}", report.shot_root);
    println!("  Beauty: {}", report.beauty);
    println!("  Alpha:  {}", report.alpha);
    if let Some(dir) = &report.work_dir {
        println!("  Work dir: {dir}");
    }
    Ok(())
}
