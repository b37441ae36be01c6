//! Shot setup script emission.

use std::collections::BTreeMap;
use std::path::Path;

use shotline_common::config::{AppConfig, CameraSettings, RenderPreset};
use shotline_common::error::ShotlineResult;
use shotline_pipeline::compositor::{BranchSpec, CompositeGraph, NodeSpec, GUIDE_LINKS};
use shotline_pipeline::shot::{ShotContext, ShotJob};
use shotline_shot_model::buckets::BucketMapping;
use shotline_shot_model::passes::PRIMARY_PASS;
use shotline_shot_model::range::ShotRange;

use crate::literal::PyValue;
use crate::template::{Template, TemplateError};

/// Built-in host script.
pub const SHOT_SETUP_TEMPLATE: &str = include_str!("../templates/shot_setup.py");

/// Renders shot setup scripts from a template.
#[derive(Debug, Clone)]
pub struct ScriptEmitter {
    template: Template,
}

impl ScriptEmitter {
    /// Emitter for the built-in template.
    pub fn new() -> Result<Self, TemplateError> {
        Self::with_template(SHOT_SETUP_TEMPLATE)
    }

    pub fn with_template(source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            template: Template::parse(source)?,
        })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Render the script for one shot. The same inputs always give the same
    /// bytes.
    pub fn emit(
        &self,
        job: &ShotJob,
        context: &ShotContext,
        config: &AppConfig,
    ) -> ShotlineResult<String> {
        let script = self.template.render(&variables(job, context, config))?;
        tracing::debug!(shot = %context.identity, bytes = script.len(), "Emitted setup script");
        Ok(script)
    }
}

/// Render the built-in template for one shot.
pub fn emit(job: &ShotJob, context: &ShotContext, config: &AppConfig) -> ShotlineResult<String> {
    ScriptEmitter::new()?.emit(job, context, config)
}

/// Template variables for one shot.
pub fn variables(
    job: &ShotJob,
    context: &ShotContext,
    config: &AppConfig,
) -> BTreeMap<String, PyValue> {
    let options = &context.graph.options;
    let holdout = if options.holdout {
        PyValue::dict([
            ("view_layer", PyValue::from(&options.holdout_view_layer)),
            ("collection", PyValue::from(&options.holdout_bucket)),
        ])
    } else {
        PyValue::None
    };

    [
        ("MASTER_FILE", path_value(&job.master_file)),
        ("ANIMATION_FILE", path_value(&job.animation_file)),
        ("OUTPUT_FILE", path_value(&job.output_file)),
        ("SHOT_LABEL", PyValue::from(context.identity.to_string())),
        (
            "CAMERA_COLLECTION",
            PyValue::from(context.mapping.camera_collection()),
        ),
        ("BUCKETS", buckets_value(&context.mapping)),
        ("CAMERA_SETTINGS", camera_value(&config.camera)),
        ("RENDER_PRESET", render_value(&config.render)),
        ("FRAME_RANGE", range_value(context.range.as_ref())),
        ("GRAPH", graph_value(&context.graph)),
        ("HOLDOUT", holdout),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn path_value(path: &Path) -> PyValue {
    PyValue::from(path.to_string_lossy().into_owned())
}

fn buckets_value(mapping: &BucketMapping) -> PyValue {
    PyValue::List(
        mapping
            .rules()
            .iter()
            .map(|rule| {
                PyValue::dict([
                    ("name", PyValue::from(&rule.bucket)),
                    ("prefix", PyValue::from(rule.prefix.as_deref())),
                    ("required", PyValue::from(rule.required)),
                ])
            })
            .collect(),
    )
}

fn camera_value(camera: &CameraSettings) -> PyValue {
    PyValue::dict([
        ("use_dof", PyValue::from(camera.use_dof)),
        ("clip_end", PyValue::from(camera.clip_end)),
    ])
}

fn render_value(preset: &RenderPreset) -> PyValue {
    PyValue::dict([
        ("resolution_x", PyValue::from(preset.resolution_x)),
        ("resolution_y", PyValue::from(preset.resolution_y)),
        (
            "resolution_percentage",
            PyValue::from(preset.resolution_percentage),
        ),
        ("fps", PyValue::from(preset.fps)),
        ("file_format", PyValue::from(&preset.file_format)),
        ("exr_codec", PyValue::from(&preset.exr_codec)),
        ("film_transparent", PyValue::from(preset.film_transparent)),
        ("view_transform", PyValue::from(&preset.view_transform)),
        ("beauty_view_layer", PyValue::from(&preset.beauty_view_layer)),
        ("beauty_passes", PyValue::list(&preset.beauty_passes)),
    ])
}

fn range_value(range: Option<&ShotRange>) -> PyValue {
    match range {
        Some(range) => PyValue::dict([
            ("start", PyValue::from(range.start)),
            ("end", PyValue::from(range.end)),
            ("step", PyValue::from(range.step)),
        ]),
        None => PyValue::None,
    }
}

fn node_value(node: &NodeSpec) -> PyValue {
    PyValue::dict([
        ("name", PyValue::from(&node.name)),
        ("label", PyValue::from(&node.label)),
        ("type", PyValue::from(node.kind.host_type())),
        ("location", PyValue::list(node.location)),
    ])
}

fn branch_value(branch: &BranchSpec) -> PyValue {
    PyValue::dict([
        ("view_layer", PyValue::from(&branch.view_layer)),
        ("layer_node", node_value(&branch.layer_node)),
        (
            "denoise_node",
            branch.denoise_node.as_ref().map_or(PyValue::None, node_value),
        ),
        (
            "denoise_quality",
            PyValue::from(branch.denoise_quality.as_deref()),
        ),
        ("output_node", node_value(&branch.output_node)),
        ("base_path", PyValue::from(branch.target.base_path())),
        ("slots", PyValue::list(branch.target.slot_names())),
        (
            "slot_paths",
            PyValue::list(
                branch
                    .target
                    .slots()
                    .iter()
                    .map(|slot| branch.target.slot_path(slot)),
            ),
        ),
        (
            "positional_fallback",
            PyValue::from(branch.positional_fallback),
        ),
    ])
}

fn graph_value(graph: &CompositeGraph) -> PyValue {
    PyValue::dict([
        ("primary", PyValue::from(PRIMARY_PASS)),
        (
            "guides",
            PyValue::List(
                GUIDE_LINKS
                    .iter()
                    .map(|(from, to)| PyValue::list([*from, *to]))
                    .collect(),
            ),
        ),
        (
            "branches",
            PyValue::List(graph.branches().into_iter().map(branch_value).collect()),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::DELIMITER;

    fn job() -> ShotJob {
        ShotJob::new(
            "/shots/master_lighting.blend",
            "/shots/jgt_ep001_sq0001_sh0010_anm.blend",
            "/shots/jgt_ep001_sq0001_sh0010_lgt.blend",
        )
    }

    fn context(config: &AppConfig) -> ShotContext {
        ShotContext::prepare(&job(), config).unwrap()
    }

    #[test]
    fn test_builtin_template_is_valid() {
        let emitter = ScriptEmitter::new().unwrap();
        let names: Vec<&str> = emitter.template().placeholders().collect();
        assert_eq!(names.len(), 11);
        assert!(names.contains(&"GRAPH"));
    }

    #[test]
    fn test_every_placeholder_gets_a_value() {
        let config = AppConfig::default();
        let vars = variables(&job(), &context(&config), &config);
        let emitter = ScriptEmitter::new().unwrap();
        let mut names: Vec<&str> = emitter.template().placeholders().collect();
        names.sort_unstable();
        assert_eq!(names, vars.keys().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_emit_contains_resolved_values() {
        let config = AppConfig::default();
        let script = emit(&job(), &context(&config), &config).unwrap();

        assert!(!script.contains(DELIMITER));
        assert!(script.contains("MASTER_FILE = \"/shots/master_lighting.blend\""));
        assert!(script.contains("SHOT_LABEL = \"jgt:ep001_sq0001_sh0010\""));
        assert!(script.contains(
            "/mnt/K/ep001/ep001_sq0001/ep001_sq0001_sh0010/exr/beauty/jgt_ep001_sq0001_sh0010_beauty_####"
        ));
        assert!(script.contains("\"positional_fallback\": 7"));
        assert!(script.contains("\"slot_paths\": [\"/mnt/K/ep001/"));
        assert!(script.contains("\"type\": \"CompositorNodeDenoise\""));
        assert!(script.contains("FRAME_RANGE = None"));
        assert!(script.contains("HOLDOUT = {\"view_layer\": \"alpha_char\", \"collection\": \"SET\"}"));
        assert!(script.contains("{\"name\": \"CAM\", \"prefix\": None, \"required\": False}"));
    }

    #[test]
    fn test_template_matches_pipeline_semantics() {
        // Holdout walks every collection with the name, like the pipeline.
        assert!(SHOT_SETUP_TEMPLATE
            .contains("held = [c for c in bpy.data.collections if c.name == name]"));
        assert!(SHOT_SETUP_TEMPLATE.contains("changed += set_holdout_recursive(found)"));

        // The denoiser output is linked even when the layer has no primary pass.
        let primary = SHOT_SETUP_TEMPLATE
            .find("if denoise is not None and slot == GRAPH[\"primary\"]:")
            .unwrap();
        let branch = &SHOT_SETUP_TEMPLATE[primary..];
        let output_link = branch
            .find("tree.links.new(denoise.outputs[\"Image\"], output.inputs[target])")
            .unwrap();
        let guarded = branch.find("elif source is not None:").unwrap();
        assert!(output_link < guarded);
        assert!(!branch[..output_link].contains("continue"));
    }

    #[test]
    fn test_emit_is_deterministic() {
        let config = AppConfig::default();
        let first = emit(&job(), &context(&config), &config).unwrap();
        let second = emit(&job(), &context(&config), &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_flags_change_script() {
        let mut config = AppConfig::default();
        config.compositor.holdout = false;
        config.compositor.positional_fallback = None;
        let script = emit(&job(), &context(&config), &config).unwrap();
        assert!(script.contains("HOLDOUT = None"));
        assert!(!script.contains("\"positional_fallback\": 7"));
    }

    #[test]
    fn test_range_from_table() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("ranges.csv");
        std::fs::write(&csv, "ep001,sq0001,sh0010,10,101\n").unwrap();

        let config = AppConfig::default();
        let job = job().with_range_table(&csv);
        let context = ShotContext::prepare(&job, &config).unwrap();
        let script = emit(&job, &context, &config).unwrap();
        assert!(script.contains("FRAME_RANGE = {\"start\": 10, \"end\": 101, \"step\": 45}"));
    }

    #[test]
    fn test_hostile_paths_stay_inside_literals() {
        let config = AppConfig::default();
        let job = ShotJob::new(
            "/shots/evil\"@@GRAPH@@\n.blend",
            "/shots/anim.blend",
            "/shots/out.blend",
        );
        let context = ShotContext::prepare(&job, &config).unwrap();
        let script = emit(&job, &context, &config).unwrap();
        assert!(!script.contains(DELIMITER));
        assert!(script.contains("MASTER_FILE = \"/shots/evil\\\"\\x40\\x40GRAPH\\x40\\x40\\n.blend\""));
    }
}
