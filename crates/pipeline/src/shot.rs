//! The shot setup run.
//!
//! Runs the whole lighting-file setup against a [`SceneHost`]:
//!
//! ```text
//! open master → render preset → buckets → camera → duration
//!     → compositor graph → holdout → relative paths → save → quit
//! ```
//!
//! Any error stops the run before the save step, so a failed run never
//! leaves a half-prepared output file behind.

use std::path::{Path, PathBuf};

use serde::Serialize;

use shotline_common::config::{AppConfig, CameraSettings};
use shotline_common::error::ShotlineResult;
use shotline_scene_host::SceneHost;
use shotline_shot_model::buckets::{BucketMapping, BucketPlacement, BucketPlan};
use shotline_shot_model::identity::{ProjectTable, ShotCode, ShotIdentity};
use shotline_shot_model::range::{ShotRange, ShotRangeTable};

use crate::bucketer::{apply_plan, plan_for_host, LinkReport};
use crate::compositor::{self, AppliedGraph, CompositeGraph, CompositeGraphAssembler};
use crate::holdout::apply_holdout;

/// Files involved in setting up one shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShotJob {
    /// Lighting master the setup starts from.
    pub master_file: PathBuf,
    /// Animation file collections are linked from.
    pub animation_file: PathBuf,
    /// Where the prepared file is saved.
    pub output_file: PathBuf,
    /// Optional frame range table.
    pub range_table: Option<PathBuf>,
}

impl ShotJob {
    pub fn new(
        master_file: impl Into<PathBuf>,
        animation_file: impl Into<PathBuf>,
        output_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            master_file: master_file.into(),
            animation_file: animation_file.into(),
            output_file: output_file.into(),
            range_table: None,
        }
    }

    pub fn with_range_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.range_table = Some(path.into());
        self
    }

    /// Library reference of the animation file, as the host records it.
    pub fn animation_library(&self) -> String {
        self.animation_file.to_string_lossy().into_owned()
    }

    /// Identity of the shot: from the output filename, or from the animation
    /// filename when the output name carries no shot tokens.
    pub fn identity(&self, projects: &ProjectTable) -> ShotIdentity {
        let identity = ShotIdentity::from_path(&self.output_file, projects);
        if !identity.is_fallback() {
            return identity;
        }
        let from_animation = ShotIdentity::from_path(&self.animation_file, projects);
        if !from_animation.is_fallback() {
            tracing::debug!(shot = %from_animation, "Shot identity taken from animation file");
        }
        from_animation
    }

    /// Key looked up in the range table.
    ///
    /// A canonical shot code in the output or animation filename wins;
    /// otherwise the parsed identity's key is used unless it is the fallback.
    pub fn range_key(&self, identity: &ShotIdentity) -> Option<String> {
        [&self.output_file, &self.animation_file]
            .into_iter()
            .find_map(|path| ShotCode::find(&stem(path)).ok())
            .map(|code| code.to_string())
            .or_else(|| (!identity.is_fallback()).then(|| identity.shot_key()))
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Everything derived from a job before any scene is touched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShotContext {
    pub identity: ShotIdentity,
    pub range_key: Option<String>,
    /// `None` when there is no table or the shot is not in it.
    pub range: Option<ShotRange>,
    pub mapping: BucketMapping,
    pub graph: CompositeGraph,
}

impl ShotContext {
    /// Parse the identity, resolve the frame range, and assemble the graph.
    pub fn prepare(job: &ShotJob, config: &AppConfig) -> ShotlineResult<Self> {
        let assembler = CompositeGraphAssembler::from_config(config);
        let identity = job.identity(assembler.resolver().projects());
        let range_key = job.range_key(&identity);

        let range = match (&job.range_table, &range_key) {
            (Some(path), Some(key)) => ShotRangeTable::from_path(path)?.resolve(key)?,
            (Some(_), None) => {
                tracing::info!("No shot code in filenames, frame range left unchanged");
                None
            }
            (None, _) => None,
        };

        let graph = assembler.assemble(&identity)?;
        Ok(Self {
            identity,
            range_key,
            range,
            mapping: BucketMapping::from_config(&config.buckets),
            graph,
        })
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShotReport {
    pub identity: ShotIdentity,
    pub range: Option<ShotRange>,
    pub links: LinkReport,
    pub active_camera: Option<String>,
    pub graph: AppliedGraph,
    /// Layer collections held out, when the holdout step ran.
    pub holdout: Option<usize>,
    pub output_file: PathBuf,
}

/// Prepare the shot described by `job` on `host` and save it.
///
/// The host is asked to quit only after a successful save.
pub fn run_shot(
    host: &mut impl SceneHost,
    job: &ShotJob,
    config: &AppConfig,
) -> ShotlineResult<ShotReport> {
    let context = ShotContext::prepare(job, config)?;
    tracing::info!(shot = %context.identity, output = %job.output_file.display(), "Setting up shot");

    host.open_file(&job.master_file)?;
    host.apply_render_preset(&config.render)?;

    let plan = plan_for_host(host, &context.mapping, &job.animation_library())?;
    let links = apply_plan(host, &plan)?;

    let active_camera = setup_camera(host, &plan, &links, &config.camera)?;

    match context.range {
        Some(range) => {
            host.set_frame_range(range.start, range.end);
            host.set_frame_step(range.step);
            tracing::info!(
                start = range.start,
                end = range.end,
                step = range.step,
                "Frame range set"
            );
        }
        None => tracing::info!("Frame range left unchanged"),
    }

    let graph = compositor::apply(host, &context.graph)?;

    let options = &context.graph.options;
    let holdout = if options.holdout {
        Some(apply_holdout(
            host,
            &options.holdout_view_layer,
            &options.holdout_bucket,
        )?)
    } else {
        None
    };

    host.make_paths_relative()?;
    host.save_as(&job.output_file)?;
    tracing::info!(path = %job.output_file.display(), "Shot file saved");
    host.quit();

    Ok(ShotReport {
        identity: context.identity,
        range: context.range,
        links,
        active_camera,
        graph,
        holdout,
        output_file: job.output_file.clone(),
    })
}

/// Make the first camera of the linked camera collection active, then apply
/// `settings` to whatever camera is active.
fn setup_camera(
    host: &mut impl SceneHost,
    plan: &BucketPlan,
    links: &LinkReport,
    settings: &CameraSettings,
) -> ShotlineResult<Option<String>> {
    let camera_buckets: Vec<&str> = plan
        .buckets
        .iter()
        .filter(|b| b.placement == BucketPlacement::SceneRoot)
        .map(|b| b.name.as_str())
        .collect();

    for linked in links
        .linked
        .iter()
        .filter(|l| camera_buckets.contains(&l.bucket.as_str()))
    {
        if let Some(camera) = host.cameras_in(linked.id)?.into_iter().next() {
            host.set_active_camera(&camera)?;
            tracing::info!(camera = %camera, collection = %linked.name, "Active camera set");
            break;
        }
    }

    let Some(camera) = host.active_camera() else {
        tracing::info!("No active camera found in the scene");
        return Ok(None);
    };
    host.configure_camera(&camera, settings)?;
    tracing::info!(
        camera = %camera,
        use_dof = settings.use_dof,
        clip_end = settings.clip_end,
        "Camera settings updated"
    );
    Ok(Some(camera))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_prefers_output_name() {
        let job = ShotJob::new(
            "/shots/master.json",
            "/shots/jgt_ep001_sq01_sh0010_anm.json",
            "/shots/jgt_ep002_sq02_sh0020_lgt.json",
        );
        let identity = job.identity(&ProjectTable::default());
        assert_eq!(identity.shot_key(), "ep002_sq02_sh0020");
        assert_eq!(identity.prefix_token, "jgt");
    }

    #[test]
    fn test_identity_falls_back_to_animation_name() {
        let job = ShotJob::new(
            "/shots/master.json",
            "/shots/rmb_ep001_sq01_sh0010_anm.json",
            "/shots/lighting_v001.json",
        );
        let identity = job.identity(&ProjectTable::default());
        assert_eq!(identity.shot_key(), "ep001_sq01_sh0010");
        assert_eq!(identity.prefix_token, "rmb");
    }

    #[test]
    fn test_range_key_prefers_canonical_code() {
        let job = ShotJob::new(
            "/m.json",
            "/shots/ep001_sq0001_sh0010_anm.json",
            "/shots/jgt_EP001-sq1_sh10_lgt.json",
        );
        let identity = job.identity(&ProjectTable::default());
        assert_eq!(identity.shot_key(), "ep001_sq1_sh10");
        assert_eq!(job.range_key(&identity).as_deref(), Some("ep001_sq0001_sh0010"));
    }

    #[test]
    fn test_range_key_absent_for_fallback_identity() {
        let job = ShotJob::new("/m.json", "/anim.json", "/out.json");
        let identity = job.identity(&ProjectTable::default());
        assert!(identity.is_fallback());
        assert_eq!(job.range_key(&identity), None);
    }
}
