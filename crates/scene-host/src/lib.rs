//! Shotline scene host contract.
//!
//! The pipeline never talks to a 3D application directly. Everything it needs
//! from one (files, collections, libraries, compositor nodes, cameras, view
//! layers) goes through the [`SceneHost`] trait, passed explicitly as
//! `&mut impl SceneHost`. Optional controls are discovered with
//! [`SceneHost::supports`] rather than by probing attributes.
//!
//! [`MemoryScene`] is a complete in-process host backed by JSON documents,
//! used for tests and for applying a shot setup offline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use shotline_common::config::{CameraSettings, RenderPreset};
use shotline_common::error::ShotlineError;

pub mod memory;

pub use memory::*;

/// Handle to a collection datablock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub u64);

/// Handle to a compositor node. Invalidated by [`SceneHost::clear_nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Where a collection hangs in the scene hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    /// The scene's master collection.
    SceneRoot,
    Collection(CollectionId),
}

/// A collection datablock as enumerated by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: CollectionId,
    pub name: String,
    /// Library file the collection was linked from; `None` for local data.
    pub library: Option<String>,
}

/// How collections are brought in from a library file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Reference the library data; edits stay in the library.
    Link,
    /// Copy the data into the current file.
    Append,
}

/// Compositor node types the pipeline creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    RenderLayers,
    Denoise,
    OutputFile,
}

impl NodeKind {
    /// Type identifier of the node in the host application.
    pub fn host_type(self) -> &'static str {
        match self {
            NodeKind::RenderLayers => "CompositorNodeRLayers",
            NodeKind::Denoise => "CompositorNodeDenoise",
            NodeKind::OutputFile => "CompositorNodeOutputFile",
        }
    }
}

/// Optional controls a host may or may not expose on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Quality selector on a denoise node.
    DenoiseQuality,
}

/// Errors reported by a scene host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid scene data in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Library not available: {path}")]
    LibraryMissing { path: String },

    #[error("Unknown collection {0:?}")]
    UnknownCollection(CollectionId),

    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("Node '{node}' has no {side} socket at index {index}")]
    SocketOutOfRange {
        node: String,
        side: &'static str,
        index: usize,
    },

    #[error("Node '{node}' has {slots} file slots but {paths} paths were given")]
    SlotPathCount {
        node: String,
        slots: usize,
        paths: usize,
    },

    #[error("Node '{node}' is not a {expected:?} node")]
    WrongNodeKind { node: String, expected: NodeKind },

    #[error("Node '{node}' does not expose {capability:?}")]
    Unsupported {
        node: String,
        capability: Capability,
    },

    #[error("View layer '{name}' not found in the current scene")]
    ViewLayerNotFound { name: String },

    #[error("No camera object named '{name}'")]
    CameraNotFound { name: String },

    #[error("Linking '{child}' under '{parent}' would create a cycle")]
    Cycle { parent: String, child: String },
}

impl From<HostError> for ShotlineError {
    fn from(err: HostError) -> Self {
        if matches!(err, HostError::ViewLayerNotFound { .. }) {
            ShotlineError::missing_resource(err.to_string())
        } else {
            ShotlineError::host(err.to_string())
        }
    }
}

/// Result type alias using HostError.
pub type HostResult<T> = Result<T, HostError>;

/// Operations the pipeline needs from a scene/graph host.
pub trait SceneHost {
    /// Replace the current scene with the file at `path`.
    fn open_file(&mut self, path: &Path) -> HostResult<()>;

    /// Write the current scene to `path` and make it the current file.
    fn save_as(&mut self, path: &Path) -> HostResult<()>;

    /// Rewrite absolute external paths relative to the current file.
    fn make_paths_relative(&mut self) -> HostResult<()>;

    /// Terminate the host. No further calls are expected.
    fn quit(&mut self);

    /// Every collection datablock called `name`, in host enumeration order.
    fn collections_named(&self, name: &str) -> Vec<CollectionInfo>;

    fn collection_info(&self, id: CollectionId) -> HostResult<CollectionInfo>;

    fn create_collection(&mut self, name: &str) -> CollectionId;

    /// Unlink `id` from every parent in the scene, then delete it.
    fn remove_collection(&mut self, id: CollectionId) -> HostResult<()>;

    fn children(&self, parent: Parent) -> HostResult<Vec<CollectionId>>;

    fn link_collection(&mut self, parent: Parent, child: CollectionId) -> HostResult<()>;

    /// Names of the collections a library file offers.
    fn library_collections(&mut self, library: &str) -> HostResult<Vec<String>>;

    /// Bring `names` in from `library`. Unknown names are skipped.
    fn load_collections(
        &mut self,
        library: &str,
        names: &[String],
        mode: LinkMode,
    ) -> HostResult<Vec<CollectionId>>;

    /// Camera objects directly inside a collection.
    fn cameras_in(&self, collection: CollectionId) -> HostResult<Vec<String>>;

    fn active_camera(&self) -> Option<String>;

    fn set_active_camera(&mut self, name: &str) -> HostResult<()>;

    fn configure_camera(&mut self, name: &str, settings: &CameraSettings) -> HostResult<()>;

    fn set_frame_range(&mut self, start: i64, end: i64);

    fn set_frame_step(&mut self, step: i64);

    fn apply_render_preset(&mut self, preset: &RenderPreset) -> HostResult<()>;

    fn set_active_view_layer(&mut self, name: &str) -> HostResult<()>;

    /// Set the holdout flag of `collection` in the active view layer.
    ///
    /// Returns how many layer collections were changed; `0` means the
    /// collection is not part of the active view layer.
    fn set_holdout(
        &mut self,
        collection: CollectionId,
        enabled: bool,
        recursive: bool,
    ) -> HostResult<usize>;

    /// Remove every node and link from the compositor tree.
    fn clear_nodes(&mut self);

    fn add_node(&mut self, kind: NodeKind, name: &str) -> NodeId;

    fn set_node_label(&mut self, node: NodeId, label: &str) -> HostResult<()>;

    fn set_node_location(&mut self, node: NodeId, location: [f32; 2]) -> HostResult<()>;

    /// Bind a render-layers node to a view layer.
    fn set_render_layer(&mut self, node: NodeId, layer: &str) -> HostResult<()>;

    fn supports(&self, node: NodeId, capability: Capability) -> bool;

    fn set_denoise_quality(&mut self, node: NodeId, quality: &str) -> HostResult<()>;

    /// Clear the slots of a file-output node and create `slots` in order.
    fn set_file_slots(&mut self, node: NodeId, slots: &[String]) -> HostResult<()>;

    /// Set the base path of a file-output node and one path per slot, in
    /// slot order.
    fn set_output_paths(&mut self, node: NodeId, base_path: &str, slot_paths: &[&str])
        -> HostResult<()>;

    fn output_sockets(&self, node: NodeId) -> HostResult<Vec<String>>;

    fn input_sockets(&self, node: NodeId) -> HostResult<Vec<String>>;

    /// Link an output socket to an input socket, both by index.
    fn connect(&mut self, from: NodeId, output: usize, to: NodeId, input: usize)
        -> HostResult<()>;

    fn is_input_linked(&self, node: NodeId, input: usize) -> HostResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_layer_error_is_missing_resource() {
        let err: ShotlineError = HostError::ViewLayerNotFound {
            name: "alpha_char".to_string(),
        }
        .into();
        assert!(err.is_fatal_resource());

        let err: ShotlineError = HostError::UnknownNode(NodeId(3)).into();
        assert!(matches!(err, ShotlineError::Host { .. }));
    }

    #[test]
    fn test_node_kind_host_types() {
        assert_eq!(NodeKind::Denoise.host_type(), "CompositorNodeDenoise");
    }
}
