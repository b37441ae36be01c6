//! Output path derivation.
//!
//! Rendered layers land in a fixed hierarchy on the project's storage volume:
//!
//! ```text
//! <root>/<vol>/<ep>/<ep>_<sq>/<ep>_<sq>_<sh>/exr/<layer>/<title>_<ep>_<sq>_<sh>_<layer>_####
//! ```
//!
//! The trailing `####` is a frame-number wildcard expanded by the render
//! output, never here. Paths are built as `/`-joined strings because they are
//! consumed verbatim by the host, whatever platform generated them.

use std::path::{Path, PathBuf};

use shotline_common::config::PathConfig;

use crate::identity::{ProjectTable, ShotIdentity};

/// Builds canonical output locations for a shot.
#[derive(Debug, Clone)]
pub struct PathResolver {
    volume_root: String,
    frame_placeholder: String,
    projects: ProjectTable,
}

impl PathResolver {
    pub fn new(config: &PathConfig) -> Self {
        Self {
            volume_root: config.volume_root.trim_end_matches('/').to_string(),
            frame_placeholder: config.frame_placeholder.clone(),
            projects: ProjectTable::from_config(config),
        }
    }

    pub fn projects(&self) -> &ProjectTable {
        &self.projects
    }

    /// Storage volume for the identity's project.
    pub fn volume_code(&self, identity: &ShotIdentity) -> &str {
        self.projects.volume_for(&identity.prefix_token)
    }

    /// Directory holding every layer of the shot:
    /// `<root>/<vol>/<ep>/<ep>_<sq>/<ep>_<sq>_<sh>`.
    pub fn shot_root(&self, identity: &ShotIdentity) -> String {
        let ShotIdentity {
            episode: ep,
            sequence: sq,
            shot: sh,
            ..
        } = identity;
        format!(
            "{}/{}/{ep}/{ep}_{sq}/{ep}_{sq}_{sh}",
            self.volume_root,
            self.volume_code(identity)
        )
    }

    /// Full output path (directory plus filename stub) for one layer or pass.
    pub fn resolve(&self, identity: &ShotIdentity, layer: &str) -> String {
        let title = self.projects.title_for(&identity.prefix_token);
        format!(
            "{}/exr/{layer}/{title}_{}_{layer}_{}",
            self.shot_root(identity),
            identity.shot_key(),
            self.frame_placeholder
        )
    }

    /// Root directory of a project on the volume root.
    pub fn project_root(&self, project_code: &str) -> PathBuf {
        Path::new(&self.volume_root).join(project_code)
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(&PathConfig::default())
    }
}

/// Per-shot working directory inside a department (`division`) of a project:
/// `<project>/<division>/ep<ep>/ep<ep>_sq<sq>/ep<ep>_sq<sq>_sh<sh>`.
///
/// Takes bare numbers (`"012"`, not `"ep012"`), as typed in the shot list.
pub fn shot_dir(project_root: &Path, division: &str, ep: &str, sq: &str, sh: &str) -> PathBuf {
    project_root
        .join(division)
        .join(format!("ep{ep}"))
        .join(format!("ep{ep}_sq{sq}"))
        .join(format!("ep{ep}_sq{sq}_sh{sh}"))
}
