//! Shot identity parsing.
//!
//! Artists name files freely (`JGT_Ep012-layout_SQ03_v2_sh0040_anm`), so the
//! lenient parser only looks for the three `ep`/`sq`/`sh` tokens in order and
//! falls back to a fixed placeholder identity when they are absent. The strict
//! [`ShotCode`] variant is used where a canonical `epNNN_sqNNNN_shNNNN`
//! substring is expected, e.g. when keying the frame range table.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use shotline_common::config::{PathConfig, ProjectEntry};

static LENIENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(ep\d+).*?(sq\d+).*?(sh\d+)").expect("lenient shot pattern is valid")
});

static STRICT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ep\d{3}_sq\d{4}_sh\d{4}").expect("strict shot pattern is valid")
});

/// Episode/sequence/shot codes of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShotIdentity {
    /// Lowercase episode token, e.g. `ep012`.
    pub episode: String,
    /// Lowercase sequence token, e.g. `sq03`.
    pub sequence: String,
    /// Lowercase shot token, e.g. `sh0040`.
    pub shot: String,
    /// Project prefix the filename starts with, empty when unknown.
    pub prefix_token: String,
}

impl ShotIdentity {
    pub const FALLBACK_EPISODE: &'static str = "ep000";
    pub const FALLBACK_SEQUENCE: &'static str = "sq00";
    pub const FALLBACK_SHOT: &'static str = "sh0000";

    /// Identity used when a filename carries no shot tokens.
    pub fn fallback() -> Self {
        Self {
            episode: Self::FALLBACK_EPISODE.to_string(),
            sequence: Self::FALLBACK_SEQUENCE.to_string(),
            shot: Self::FALLBACK_SHOT.to_string(),
            prefix_token: String::new(),
        }
    }

    /// Parse a filename stem using the default project table.
    pub fn parse(stem: &str) -> Self {
        Self::parse_with(stem, &ProjectTable::default())
    }

    /// Parse a filename stem, resolving the prefix token against `projects`.
    ///
    /// Never fails: a stem without `ep…sq…sh…` tokens yields
    /// [`ShotIdentity::fallback`].
    pub fn parse_with(stem: &str, projects: &ProjectTable) -> Self {
        let Some(caps) = LENIENT_PATTERN.captures(stem) else {
            tracing::debug!(stem, "No shot tokens in filename, using fallback identity");
            return Self::fallback();
        };

        Self {
            episode: caps[1].to_lowercase(),
            sequence: caps[2].to_lowercase(),
            shot: caps[3].to_lowercase(),
            prefix_token: projects
                .match_prefix(stem)
                .map(|entry| entry.prefix.clone())
                .unwrap_or_default(),
        }
    }

    /// Parse the file stem of `path`. An empty or missing stem gives the
    /// fallback identity.
    pub fn from_path(path: &Path, projects: &ProjectTable) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse_with(&stem, projects)
    }

    /// Whether the shot tokens are the placeholder ones.
    pub fn is_fallback(&self) -> bool {
        self.episode == Self::FALLBACK_EPISODE
            && self.sequence == Self::FALLBACK_SEQUENCE
            && self.shot == Self::FALLBACK_SHOT
    }

    /// `episode_sequence_shot`, the key used by the range table.
    pub fn shot_key(&self) -> String {
        format!("{}_{}_{}", self.episode, self.sequence, self.shot)
    }
}

impl std::fmt::Display for ShotIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.prefix_token.is_empty() {
            write!(f, "{}", self.shot_key())
        } else {
            write!(f, "{}:{}", self.prefix_token, self.shot_key())
        }
    }
}

/// A canonical `epNNN_sqNNNN_shNNNN` shot code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShotCode(String);

/// The input did not contain a canonical shot code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no shot code of the form epNNN_sqNNNN_shNNNN in '{input}'")]
pub struct NoShotCode {
    pub input: String,
}

impl ShotCode {
    /// Find the first canonical shot code anywhere in `input`.
    pub fn find(input: &str) -> Result<Self, NoShotCode> {
        STRICT_PATTERN
            .find(input)
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| NoShotCode {
                input: input.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShotCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Project prefixes and the storage volume each project lives on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTable {
    entries: Vec<ProjectEntry>,
    default_volume: String,
}

impl ProjectTable {
    pub fn new(entries: Vec<ProjectEntry>, default_volume: impl Into<String>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| ProjectEntry {
                prefix: e.prefix.to_lowercase(),
                ..e
            })
            .collect();
        Self {
            entries,
            default_volume: default_volume.into(),
        }
    }

    pub fn from_config(config: &PathConfig) -> Self {
        Self::new(config.projects.clone(), config.default_volume.clone())
    }

    /// Entry whose prefix the stem starts with (case-insensitive).
    pub fn match_prefix(&self, stem: &str) -> Option<&ProjectEntry> {
        let lower = stem.to_lowercase();
        self.entries
            .iter()
            .find(|e| !e.prefix.is_empty() && lower.starts_with(&e.prefix))
    }

    /// Entry registered under a prefix token.
    pub fn entry(&self, token: &str) -> Option<&ProjectEntry> {
        if token.is_empty() {
            return None;
        }
        self.entries.iter().find(|e| e.prefix == token)
    }

    /// Volume code for a prefix token; unknown tokens use the default volume.
    pub fn volume_for(&self, token: &str) -> &str {
        self.entry(token)
            .map(|e| e.volume.as_str())
            .unwrap_or(&self.default_volume)
    }

    /// Display title for a prefix token; unknown tokens have an empty title.
    pub fn title_for(&self, token: &str) -> &str {
        self.entry(token).map(|e| e.title.as_str()).unwrap_or("")
    }

    pub fn entries(&self) -> &[ProjectEntry] {
        &self.entries
    }
}

impl Default for ProjectTable {
    fn default() -> Self {
        Self::from_config(&PathConfig::default())
    }
}
