//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ShotlineError, ShotlineResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output path derivation settings.
    pub paths: PathConfig,

    /// Asset bucket mapping.
    pub buckets: BucketConfig,

    /// Compositor graph feature flags.
    pub compositor: CompositorConfig,

    /// Settings applied to the active camera.
    pub camera: CameraSettings,

    /// Render preset applied before the graph is built.
    pub render: RenderPreset,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Storage layout used when deriving output paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Mount point holding one directory per storage volume.
    pub volume_root: String,

    /// Volume code used when a filename prefix is unknown.
    pub default_volume: String,

    /// Known project prefixes.
    pub projects: Vec<ProjectEntry>,

    /// Frame-number wildcard appended to every output path.
    pub frame_placeholder: String,
}

/// One row of the project prefix table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    /// Leading filename characters identifying the project (lowercase).
    pub prefix: String,
    /// Single-letter storage volume code.
    pub volume: String,
    /// Display title, also used as the output filename prefix.
    pub title: String,
}

/// Bucket declarations, in tie-break order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    pub rules: Vec<BucketRuleConfig>,

    /// Collection name matched exactly by rules without a prefix.
    pub camera_collection: String,
}

/// A single bucket declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRuleConfig {
    pub bucket: String,

    /// `None` marks the exact-name camera bucket.
    pub prefix: Option<String>,

    /// Fail the run when this bucket ends up empty.
    #[serde(default)]
    pub required: bool,
}

/// Feature flags for the compositor graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Insert the denoise stage on the beauty branch.
    pub denoise: bool,

    /// Quality requested from the denoiser when the host exposes it.
    pub denoise_quality: String,

    /// Socket index linked positionally when the by-name link is missing.
    pub positional_fallback: Option<usize>,

    /// Enable holdout on a bucket while preparing the alpha branch.
    pub holdout: bool,

    /// View layer activated for the holdout step.
    pub holdout_view_layer: String,

    /// Bucket whose render visibility is held out.
    pub holdout_bucket: String,
}

/// Active camera adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub use_dof: bool,
    pub clip_end: f64,
}

/// Scene render settings applied before saving the lighting file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderPreset {
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub resolution_percentage: u32,
    pub fps: u32,
    pub file_format: String,
    pub exr_codec: String,
    pub film_transparent: bool,
    pub view_transform: String,

    /// View layer whose passes are switched on.
    pub beauty_view_layer: String,

    /// Pass toggles enabled on `beauty_view_layer`.
    pub beauty_passes: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "shotline=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            volume_root: "/mnt".to_string(),
            default_volume: "K".to_string(),
            projects: vec![
                ProjectEntry {
                    prefix: "jgt".to_string(),
                    volume: "K".to_string(),
                    title: "jgt".to_string(),
                },
                ProjectEntry {
                    prefix: "rmb".to_string(),
                    volume: "O".to_string(),
                    title: "rmb".to_string(),
                },
            ],
            frame_placeholder: "####".to_string(),
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        let rule = |bucket: &str, prefix: Option<&str>| BucketRuleConfig {
            bucket: bucket.to_string(),
            prefix: prefix.map(str::to_string),
            required: false,
        };
        Self {
            rules: vec![
                rule("CHAR", Some("c-")),
                rule("PROP", Some("p-")),
                rule("SET", Some("s-")),
                rule("VEH", Some("v-")),
                rule("CAM", None),
            ],
            camera_collection: "CAM".to_string(),
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            denoise: true,
            denoise_quality: "HIGH".to_string(),
            positional_fallback: Some(7),
            holdout: true,
            holdout_view_layer: "alpha_char".to_string(),
            holdout_bucket: "SET".to_string(),
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            use_dof: false,
            clip_end: 1000.0,
        }
    }
}

impl Default for RenderPreset {
    fn default() -> Self {
        Self {
            resolution_x: 1920,
            resolution_y: 1080,
            resolution_percentage: 100,
            fps: 24,
            file_format: "OPEN_EXR_MULTILAYER".to_string(),
            exr_codec: "PIZ".to_string(),
            film_transparent: true,
            view_transform: "ARRI K1S1".to_string(),
            beauty_view_layer: "beauty".to_string(),
            beauty_passes: [
                "combined",
                "z",
                "mist",
                "emit",
                "shadow",
                "ambient_occlusion",
                "transparent",
                "cryptomatte_object",
                "cryptomatte_material",
                "cryptomatte_asset",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Unlike [`AppConfig::load`], errors
    /// are returned to the caller.
    pub fn load_from(path: &Path) -> ShotlineResult<Self> {
        if !path.exists() {
            return Err(ShotlineError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> ShotlineResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        let mut exact: Option<&str> = None;
        for rule in &self.buckets.rules {
            if rule.bucket.is_empty() {
                return Err(ShotlineError::config("bucket name must not be empty"));
            }
            if !seen.insert(rule.bucket.as_str()) {
                return Err(ShotlineError::config(format!(
                    "bucket '{}' declared twice",
                    rule.bucket
                )));
            }
            if matches!(rule.prefix.as_deref(), Some("")) {
                return Err(ShotlineError::config(format!(
                    "bucket '{}' has an empty prefix",
                    rule.bucket
                )));
            }
            if rule.prefix.is_none() {
                // The exact rule claims the camera collection; only one may.
                if let Some(first) = exact {
                    return Err(ShotlineError::config(format!(
                        "buckets '{first}' and '{}' both match the camera collection exactly",
                        rule.bucket
                    )));
                }
                exact = Some(&rule.bucket);
            }
        }
        if self.paths.default_volume.is_empty() {
            return Err(ShotlineError::config("default volume must not be empty"));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("shotline").join("config.json")
}
