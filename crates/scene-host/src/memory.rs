//! In-memory scene host.
//!
//! Scenes and libraries are plain JSON documents ([`SceneDocument`],
//! [`LibraryDocument`]). Libraries can be registered up front or are read
//! from disk the first time they are referenced.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use shotline_common::config::{CameraSettings, RenderPreset};

use crate::{
    Capability, CollectionId, CollectionInfo, HostError, HostResult, LinkMode, NodeId, NodeKind,
    Parent, SceneHost,
};

/// Serialized state of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDocument {
    /// Every collection datablock, local or linked.
    pub collections: BTreeMap<u64, CollectionData>,
    pub next_collection_id: u64,

    /// Children of the scene's master collection.
    pub scene_children: Vec<CollectionId>,

    pub active_camera: Option<String>,

    pub view_layers: Vec<ViewLayerData>,
    /// Defaults to the first view layer when unset.
    pub active_view_layer: Option<String>,

    pub nodes: Vec<NodeData>,
    pub links: Vec<NodeLink>,

    pub frame_start: i64,
    pub frame_end: i64,
    pub frame_step: i64,

    pub render: Option<RenderPreset>,
    pub relative_paths: bool,

    pub capabilities: HostCapabilities,
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self {
            collections: BTreeMap::new(),
            next_collection_id: 0,
            scene_children: Vec::new(),
            active_camera: None,
            view_layers: Vec::new(),
            active_view_layer: None,
            nodes: Vec::new(),
            links: Vec::new(),
            frame_start: 1,
            frame_end: 250,
            frame_step: 1,
            render: None,
            relative_paths: false,
            capabilities: HostCapabilities::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionData {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub children: Vec<CollectionId>,
    #[serde(default)]
    pub objects: Vec<ObjectData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub camera: Option<CameraData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Mesh,
    Camera,
    Light,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraData {
    pub use_dof: bool,
    pub clip_end: f64,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            use_dof: false,
            clip_end: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewLayerData {
    pub name: String,
    /// Output sockets a render-layers node bound to this layer exposes.
    #[serde(default)]
    pub passes: Vec<String>,
    /// Pass toggles switched on by a render preset.
    #[serde(default)]
    pub enabled_passes: BTreeSet<String>,
    #[serde(default)]
    pub holdout: BTreeSet<CollectionId>,
    #[serde(default)]
    pub excluded: BTreeSet<CollectionId>,
}

impl ViewLayerData {
    pub fn new(name: impl Into<String>, passes: &[&str]) -> Self {
        Self {
            name: name.into(),
            passes: passes.iter().map(|p| p.to_string()).collect(),
            enabled_passes: BTreeSet::new(),
            holdout: BTreeSet::new(),
            excluded: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub name: String,
    pub label: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub location: [f32; 2],
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub slots: Vec<FileSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSlot {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeLink {
    pub from_node: NodeId,
    pub from_socket: usize,
    pub to_node: NodeId,
    pub to_socket: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCapabilities {
    pub denoise_quality: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            denoise_quality: true,
        }
    }
}

/// Serialized contents of a library file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryDocument {
    pub collections: Vec<LibraryCollection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryCollection {
    pub name: String,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub objects: Vec<ObjectData>,
}

impl LibraryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            objects: Vec::new(),
        }
    }
}

/// A [`SceneHost`] holding the whole scene in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    doc: SceneDocument,
    current_file: Option<PathBuf>,
    libraries: BTreeMap<String, LibraryDocument>,
    quit: bool,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: SceneDocument) -> Self {
        Self {
            doc,
            ..Self::default()
        }
    }

    pub fn document(&self) -> &SceneDocument {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut SceneDocument {
        &mut self.doc
    }

    /// Make a library available under `path` without touching the disk.
    pub fn register_library(&mut self, path: impl Into<String>, library: LibraryDocument) {
        self.libraries.insert(path.into(), library);
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn has_quit(&self) -> bool {
        self.quit
    }

    /// Node looked up by name.
    pub fn node_named(&self, name: &str) -> Option<(NodeId, &NodeData)> {
        self.doc
            .nodes
            .iter()
            .enumerate()
            .find(|(_, n)| n.name == name)
            .map(|(i, n)| (NodeId(i), n))
    }

    /// Links ending at `node`, as `(from node name, from socket, to socket)`.
    pub fn links_into(&self, node: NodeId) -> Vec<(String, usize, usize)> {
        self.doc
            .links
            .iter()
            .filter(|l| l.to_node == node)
            .filter_map(|l| {
                self.doc
                    .nodes
                    .get(l.from_node.0)
                    .map(|from| (from.name.clone(), l.from_socket, l.to_socket))
            })
            .collect()
    }

    /// Add a local collection under the scene root (scene authoring helper).
    pub fn add_scene_collection(&mut self, name: &str) -> CollectionId {
        let id = self.create_collection(name);
        self.doc.scene_children.push(id);
        id
    }

    fn collection(&self, id: CollectionId) -> HostResult<&CollectionData> {
        self.doc
            .collections
            .get(&id.0)
            .ok_or(HostError::UnknownCollection(id))
    }

    fn collection_mut(&mut self, id: CollectionId) -> HostResult<&mut CollectionData> {
        self.doc
            .collections
            .get_mut(&id.0)
            .ok_or(HostError::UnknownCollection(id))
    }

    fn node(&self, id: NodeId) -> HostResult<&NodeData> {
        self.doc.nodes.get(id.0).ok_or(HostError::UnknownNode(id))
    }

    fn node_of_kind(&mut self, id: NodeId, expected: NodeKind) -> HostResult<&mut NodeData> {
        let node = self
            .doc
            .nodes
            .get_mut(id.0)
            .ok_or(HostError::UnknownNode(id))?;
        if node.kind != expected {
            return Err(HostError::WrongNodeKind {
                node: node.name.clone(),
                expected,
            });
        }
        Ok(node)
    }

    fn library(&mut self, path: &str) -> HostResult<&LibraryDocument> {
        if !self.libraries.contains_key(path) {
            let file = Path::new(path);
            if !file.exists() {
                return Err(HostError::LibraryMissing {
                    path: path.to_string(),
                });
            }
            let content = std::fs::read_to_string(file).map_err(|e| HostError::Io {
                path: file.to_path_buf(),
                source: e,
            })?;
            let library: LibraryDocument =
                serde_json::from_str(&content).map_err(|e| HostError::Parse {
                    path: file.to_path_buf(),
                    source: e,
                })?;
            tracing::debug!(library = path, collections = library.collections.len(), "Read library");
            self.libraries.insert(path.to_string(), library);
        }
        self.libraries
            .get(path)
            .ok_or_else(|| HostError::LibraryMissing {
                path: path.to_string(),
            })
    }

    /// Local name not yet used, following the `name.001` convention.
    fn unique_local_name(&self, name: &str) -> String {
        let taken = |candidate: &str| {
            self.doc
                .collections
                .values()
                .any(|c| c.library.is_none() && c.name == candidate)
        };
        if !taken(name) {
            return name.to_string();
        }
        (1..)
            .map(|n| format!("{name}.{n:03}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    fn instantiate(
        &mut self,
        library: &LibraryDocument,
        library_path: &str,
        name: &str,
        mode: LinkMode,
        visiting: &mut BTreeSet<String>,
    ) -> HostResult<Option<CollectionId>> {
        if mode == LinkMode::Link {
            if let Some(existing) = self
                .collections_named(name)
                .into_iter()
                .find(|c| c.library.as_deref() == Some(library_path))
            {
                return Ok(Some(existing.id));
            }
        }
        let Some(source) = library.collections.iter().find(|c| c.name == name) else {
            return Ok(None);
        };
        if !visiting.insert(name.to_string()) {
            return Ok(None);
        }

        let (local_name, library_tag) = match mode {
            LinkMode::Link => (name.to_string(), Some(library_path.to_string())),
            LinkMode::Append => (self.unique_local_name(name), None),
        };
        let id = self.insert_collection(CollectionData {
            name: local_name,
            library: library_tag,
            children: Vec::new(),
            objects: source.objects.clone(),
        });

        let mut children = Vec::new();
        for child in &source.children {
            if let Some(child_id) = self.instantiate(library, library_path, child, mode, visiting)? {
                children.push(child_id);
            }
        }
        self.collection_mut(id)?.children = children;
        visiting.remove(name);
        Ok(Some(id))
    }

    fn insert_collection(&mut self, data: CollectionData) -> CollectionId {
        let id = CollectionId(self.doc.next_collection_id);
        self.doc.next_collection_id += 1;
        self.doc.collections.insert(id.0, data);
        id
    }

    /// `id` plus every collection below it.
    fn subtree(&self, id: CollectionId) -> Vec<CollectionId> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            if let Some(data) = self.doc.collections.get(&current.0) {
                stack.extend(data.children.iter().rev().copied());
            }
        }
        out
    }

    fn active_layer_index(&self) -> Option<usize> {
        match &self.doc.active_view_layer {
            Some(name) => self.doc.view_layers.iter().position(|l| &l.name == name),
            None if !self.doc.view_layers.is_empty() => Some(0),
            None => None,
        }
    }

    /// Whether `target` is part of the layer collection tree of `layer`.
    fn in_view_layer(&self, layer: &ViewLayerData, target: CollectionId) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<CollectionId> = self.doc.scene_children.clone();
        while let Some(current) = stack.pop() {
            if layer.excluded.contains(&current) || !seen.insert(current) {
                continue;
            }
            if current == target {
                return true;
            }
            if let Some(data) = self.doc.collections.get(&current.0) {
                stack.extend(data.children.iter().copied());
            }
        }
        false
    }

    fn check_socket(&self, node: NodeId, index: usize, side: &'static str) -> HostResult<()> {
        let sockets = if side == "output" {
            self.output_sockets(node)?
        } else {
            self.input_sockets(node)?
        };
        if index >= sockets.len() {
            return Err(HostError::SocketOutOfRange {
                node: self.node(node)?.name.clone(),
                side,
                index,
            });
        }
        Ok(())
    }

    /// Re-express `//`-relative library paths against `new_dir`, as saving
    /// under another directory with relative paths on does.
    fn rebase_libraries(&mut self, new_dir: &Path) {
        let old_dir = self
            .current_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        for collection in self.doc.collections.values_mut() {
            let Some(library) = collection.library.as_mut() else {
                continue;
            };
            let absolute = match (library.strip_prefix("//"), &old_dir) {
                (Some(rest), Some(old_dir)) => old_dir.join(rest),
                (Some(_), None) => continue,
                (None, _) => PathBuf::from(library.as_str()),
            };
            *library = match absolute.strip_prefix(new_dir) {
                Ok(rest) => format!("//{}", rest.display()),
                Err(_) => absolute.display().to_string(),
            };
        }
    }

    fn camera_object_mut(&mut self, name: &str) -> Option<&mut ObjectData> {
        self.doc
            .collections
            .values_mut()
            .flat_map(|c| c.objects.iter_mut())
            .find(|o| o.kind == ObjectKind::Camera && o.name == name)
    }
}

impl SceneHost for MemoryScene {
    fn open_file(&mut self, path: &Path) -> HostResult<()> {
        let content = std::fs::read_to_string(path).map_err(|e| HostError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.doc = serde_json::from_str(&content).map_err(|e| HostError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.current_file = Some(path.to_path_buf());
        self.quit = false;
        tracing::info!(path = %path.display(), "Opened scene");
        Ok(())
    }

    fn save_as(&mut self, path: &Path) -> HostResult<()> {
        if self.doc.relative_paths {
            if let Some(new_dir) = path.parent() {
                self.rebase_libraries(new_dir);
            }
        }
        let json = serde_json::to_string_pretty(&self.doc).map_err(|e| HostError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| HostError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.current_file = Some(path.to_path_buf());
        tracing::info!(path = %path.display(), "Saved scene");
        Ok(())
    }

    fn make_paths_relative(&mut self) -> HostResult<()> {
        self.doc.relative_paths = true;
        let Some(dir) = self
            .current_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
        else {
            return Ok(());
        };
        for collection in self.doc.collections.values_mut() {
            if let Some(library) = collection.library.as_mut() {
                if let Ok(rest) = Path::new(library.as_str()).strip_prefix(&dir) {
                    *library = format!("//{}", rest.display());
                }
            }
        }
        Ok(())
    }

    fn quit(&mut self) {
        self.quit = true;
    }

    fn collections_named(&self, name: &str) -> Vec<CollectionInfo> {
        self.doc
            .collections
            .iter()
            .filter(|(_, c)| c.name == name)
            .map(|(id, c)| CollectionInfo {
                id: CollectionId(*id),
                name: c.name.clone(),
                library: c.library.clone(),
            })
            .collect()
    }

    fn collection_info(&self, id: CollectionId) -> HostResult<CollectionInfo> {
        let c = self.collection(id)?;
        Ok(CollectionInfo {
            id,
            name: c.name.clone(),
            library: c.library.clone(),
        })
    }

    fn create_collection(&mut self, name: &str) -> CollectionId {
        let name = self.unique_local_name(name);
        self.insert_collection(CollectionData {
            name,
            library: None,
            children: Vec::new(),
            objects: Vec::new(),
        })
    }

    fn remove_collection(&mut self, id: CollectionId) -> HostResult<()> {
        self.collection(id)?;
        self.doc.scene_children.retain(|c| *c != id);
        for collection in self.doc.collections.values_mut() {
            collection.children.retain(|c| *c != id);
        }
        for layer in &mut self.doc.view_layers {
            layer.holdout.remove(&id);
            layer.excluded.remove(&id);
        }
        self.doc.collections.remove(&id.0);
        Ok(())
    }

    fn children(&self, parent: Parent) -> HostResult<Vec<CollectionId>> {
        match parent {
            Parent::SceneRoot => Ok(self.doc.scene_children.clone()),
            Parent::Collection(id) => Ok(self.collection(id)?.children.clone()),
        }
    }

    fn link_collection(&mut self, parent: Parent, child: CollectionId) -> HostResult<()> {
        self.collection(child)?;
        match parent {
            Parent::SceneRoot => {
                if !self.doc.scene_children.contains(&child) {
                    self.doc.scene_children.push(child);
                }
            }
            Parent::Collection(id) => {
                if self.subtree(child).contains(&id) {
                    return Err(HostError::Cycle {
                        parent: self.collection(id)?.name.clone(),
                        child: self.collection(child)?.name.clone(),
                    });
                }
                let parent = self.collection_mut(id)?;
                if !parent.children.contains(&child) {
                    parent.children.push(child);
                }
            }
        }
        Ok(())
    }

    fn library_collections(&mut self, library: &str) -> HostResult<Vec<String>> {
        Ok(self
            .library(library)?
            .collections
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    fn load_collections(
        &mut self,
        library: &str,
        names: &[String],
        mode: LinkMode,
    ) -> HostResult<Vec<CollectionId>> {
        let source = self.library(library)?.clone();
        let mut loaded = Vec::new();
        for name in names {
            match self.instantiate(&source, library, name, mode, &mut BTreeSet::new())? {
                Some(id) => loaded.push(id),
                None => tracing::warn!(library, collection = %name, "Collection not in library"),
            }
        }
        Ok(loaded)
    }

    fn cameras_in(&self, collection: CollectionId) -> HostResult<Vec<String>> {
        Ok(self
            .collection(collection)?
            .objects
            .iter()
            .filter(|o| o.kind == ObjectKind::Camera)
            .map(|o| o.name.clone())
            .collect())
    }

    fn active_camera(&self) -> Option<String> {
        self.doc.active_camera.clone()
    }

    fn set_active_camera(&mut self, name: &str) -> HostResult<()> {
        if self.camera_object_mut(name).is_none() {
            return Err(HostError::CameraNotFound {
                name: name.to_string(),
            });
        }
        self.doc.active_camera = Some(name.to_string());
        Ok(())
    }

    fn configure_camera(&mut self, name: &str, settings: &CameraSettings) -> HostResult<()> {
        let object = self
            .camera_object_mut(name)
            .ok_or_else(|| HostError::CameraNotFound {
                name: name.to_string(),
            })?;
        let camera = object.camera.get_or_insert_with(CameraData::default);
        camera.use_dof = settings.use_dof;
        camera.clip_end = settings.clip_end;
        Ok(())
    }

    fn set_frame_range(&mut self, start: i64, end: i64) {
        self.doc.frame_start = start;
        self.doc.frame_end = end;
    }

    fn set_frame_step(&mut self, step: i64) {
        self.doc.frame_step = step;
    }

    fn apply_render_preset(&mut self, preset: &RenderPreset) -> HostResult<()> {
        self.doc.render = Some(preset.clone());
        match self
            .doc
            .view_layers
            .iter_mut()
            .find(|l| l.name == preset.beauty_view_layer)
        {
            Some(layer) => layer
                .enabled_passes
                .extend(preset.beauty_passes.iter().cloned()),
            None => tracing::debug!(
                layer = %preset.beauty_view_layer,
                "No beauty view layer, pass toggles left unchanged"
            ),
        }
        Ok(())
    }

    fn set_active_view_layer(&mut self, name: &str) -> HostResult<()> {
        if !self.doc.view_layers.iter().any(|l| l.name == name) {
            return Err(HostError::ViewLayerNotFound {
                name: name.to_string(),
            });
        }
        self.doc.active_view_layer = Some(name.to_string());
        Ok(())
    }

    fn set_holdout(
        &mut self,
        collection: CollectionId,
        enabled: bool,
        recursive: bool,
    ) -> HostResult<usize> {
        self.collection(collection)?;
        let index = self
            .active_layer_index()
            .ok_or_else(|| HostError::ViewLayerNotFound {
                name: self.doc.active_view_layer.clone().unwrap_or_default(),
            })?;
        if !self.in_view_layer(&self.doc.view_layers[index], collection) {
            return Ok(0);
        }

        let targets = if recursive {
            self.subtree(collection)
        } else {
            vec![collection]
        };
        let layer = &mut self.doc.view_layers[index];
        for target in &targets {
            if enabled {
                layer.holdout.insert(*target);
            } else {
                layer.holdout.remove(target);
            }
        }
        Ok(targets.len())
    }

    fn clear_nodes(&mut self) {
        self.doc.nodes.clear();
        self.doc.links.clear();
    }

    fn add_node(&mut self, kind: NodeKind, name: &str) -> NodeId {
        self.doc.nodes.push(NodeData {
            name: name.to_string(),
            label: String::new(),
            kind,
            location: [0.0, 0.0],
            layer: None,
            quality: None,
            base_path: String::new(),
            slots: Vec::new(),
        });
        NodeId(self.doc.nodes.len() - 1)
    }

    fn set_node_label(&mut self, node: NodeId, label: &str) -> HostResult<()> {
        let node = self
            .doc
            .nodes
            .get_mut(node.0)
            .ok_or(HostError::UnknownNode(node))?;
        node.label = label.to_string();
        Ok(())
    }

    fn set_node_location(&mut self, node: NodeId, location: [f32; 2]) -> HostResult<()> {
        let node = self
            .doc
            .nodes
            .get_mut(node.0)
            .ok_or(HostError::UnknownNode(node))?;
        node.location = location;
        Ok(())
    }

    fn set_render_layer(&mut self, node: NodeId, layer: &str) -> HostResult<()> {
        self.node_of_kind(node, NodeKind::RenderLayers)?.layer = Some(layer.to_string());
        Ok(())
    }

    fn supports(&self, node: NodeId, capability: Capability) -> bool {
        match (self.doc.nodes.get(node.0), capability) {
            (Some(n), Capability::DenoiseQuality) => {
                n.kind == NodeKind::Denoise && self.doc.capabilities.denoise_quality
            }
            (None, _) => false,
        }
    }

    fn set_denoise_quality(&mut self, node: NodeId, quality: &str) -> HostResult<()> {
        if !self.supports(node, Capability::DenoiseQuality) {
            return Err(HostError::Unsupported {
                node: self.node(node)?.name.clone(),
                capability: Capability::DenoiseQuality,
            });
        }
        self.node_of_kind(node, NodeKind::Denoise)?.quality = Some(quality.to_string());
        Ok(())
    }

    fn set_file_slots(&mut self, node: NodeId, slots: &[String]) -> HostResult<()> {
        let data = self.node_of_kind(node, NodeKind::OutputFile)?;
        data.slots = slots
            .iter()
            .map(|name| FileSlot {
                name: name.clone(),
                path: name.clone(),
            })
            .collect();
        self.doc.links.retain(|l| l.to_node != node);
        Ok(())
    }

    fn set_output_paths(
        &mut self,
        node: NodeId,
        base_path: &str,
        slot_paths: &[&str],
    ) -> HostResult<()> {
        let data = self.node_of_kind(node, NodeKind::OutputFile)?;
        if data.slots.len() != slot_paths.len() {
            return Err(HostError::SlotPathCount {
                node: data.name.clone(),
                slots: data.slots.len(),
                paths: slot_paths.len(),
            });
        }
        data.base_path = base_path.to_string();
        for (slot, path) in data.slots.iter_mut().zip(slot_paths) {
            slot.path = path.to_string();
        }
        Ok(())
    }

    fn output_sockets(&self, node: NodeId) -> HostResult<Vec<String>> {
        let data = self.node(node)?;
        Ok(match data.kind {
            NodeKind::RenderLayers => data
                .layer
                .as_ref()
                .and_then(|name| self.doc.view_layers.iter().find(|l| &l.name == name))
                .map(|l| l.passes.clone())
                .unwrap_or_default(),
            NodeKind::Denoise => vec!["Image".to_string()],
            NodeKind::OutputFile => Vec::new(),
        })
    }

    fn input_sockets(&self, node: NodeId) -> HostResult<Vec<String>> {
        let data = self.node(node)?;
        Ok(match data.kind {
            NodeKind::RenderLayers => Vec::new(),
            NodeKind::Denoise => ["Image", "Normal", "Albedo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            NodeKind::OutputFile => data.slots.iter().map(|s| s.name.clone()).collect(),
        })
    }

    fn connect(
        &mut self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    ) -> HostResult<()> {
        self.check_socket(from, output, "output")?;
        self.check_socket(to, input, "input")?;
        // An input accepts a single link; a new one replaces it.
        self.doc
            .links
            .retain(|l| !(l.to_node == to && l.to_socket == input));
        self.doc.links.push(NodeLink {
            from_node: from,
            from_socket: output,
            to_node: to,
            to_socket: input,
        });
        Ok(())
    }

    fn is_input_linked(&self, node: NodeId, input: usize) -> HostResult<bool> {
        self.node(node)?;
        Ok(self
            .doc
            .links
            .iter()
            .any(|l| l.to_node == node && l.to_socket == input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> LibraryDocument {
        let mut set = LibraryCollection::new("s-house");
        set.children.push("s-house-props".to_string());
        let mut cam = LibraryCollection::new("CAM");
        cam.objects.push(ObjectData {
            name: "shot_cam".to_string(),
            kind: ObjectKind::Camera,
            camera: Some(CameraData {
                use_dof: true,
                clip_end: 250.0,
            }),
        });
        LibraryDocument {
            collections: vec![
                LibraryCollection::new("c-hero"),
                set,
                LibraryCollection::new("s-house-props"),
                cam,
            ],
        }
    }

    #[test]
    fn test_link_reuses_existing_datablock() {
        let mut scene = MemoryScene::new();
        scene.register_library("/lib/anim.json", library());

        let names = vec!["c-hero".to_string()];
        let first = scene
            .load_collections("/lib/anim.json", &names, LinkMode::Link)
            .unwrap();
        let second = scene
            .load_collections("/lib/anim.json", &names, LinkMode::Link)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(scene.collections_named("c-hero").len(), 1);
    }

    #[test]
    fn test_load_brings_children_and_skips_unknown() {
        let mut scene = MemoryScene::new();
        scene.register_library("/lib/anim.json", library());

        let loaded = scene
            .load_collections(
                "/lib/anim.json",
                &["s-house".to_string(), "ghost".to_string()],
                LinkMode::Link,
            )
            .unwrap();
        assert_eq!(loaded.len(), 1);
        let children = scene.children(Parent::Collection(loaded[0])).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(
            scene.collection_info(children[0]).unwrap().name,
            "s-house-props"
        );
    }

    #[test]
    fn test_append_renames_on_local_collision() {
        let mut scene = MemoryScene::new();
        scene.register_library("/lib/anim.json", library());
        scene.add_scene_collection("CAM");

        let ids = scene
            .load_collections("/lib/anim.json", &["CAM".to_string()], LinkMode::Append)
            .unwrap();
        let info = scene.collection_info(ids[0]).unwrap();
        assert_eq!(info.name, "CAM.001");
        assert_eq!(info.library, None);
    }

    #[test]
    fn test_missing_library_is_an_error() {
        let mut scene = MemoryScene::new();
        let err = scene.library_collections("/no/such/lib.json").unwrap_err();
        assert!(matches!(err, HostError::LibraryMissing { .. }));
    }

    #[test]
    fn test_remove_collection_unlinks_everywhere() {
        let mut scene = MemoryScene::new();
        let parent = scene.add_scene_collection("SET");
        let child = scene.create_collection("s-tree");
        scene
            .link_collection(Parent::Collection(parent), child)
            .unwrap();

        scene.remove_collection(child).unwrap();
        assert!(scene.children(Parent::Collection(parent)).unwrap().is_empty());
        scene.remove_collection(parent).unwrap();
        assert!(scene.children(Parent::SceneRoot).unwrap().is_empty());
        assert!(scene.collections_named("SET").is_empty());
    }

    #[test]
    fn test_link_rejects_cycles() {
        let mut scene = MemoryScene::new();
        let a = scene.add_scene_collection("A");
        let b = scene.create_collection("B");
        scene.link_collection(Parent::Collection(a), b).unwrap();
        let err = scene.link_collection(Parent::Collection(b), a).unwrap_err();
        assert!(matches!(err, HostError::Cycle { .. }));
    }

    #[test]
    fn test_holdout_recursive_in_active_layer() {
        let mut scene = MemoryScene::new();
        scene.register_library("/lib/anim.json", library());
        scene
            .document_mut()
            .view_layers
            .extend([ViewLayerData::new("beauty", &[]), ViewLayerData::new("alpha_char", &[])]);
        let set = scene.add_scene_collection("SET");
        let house = scene
            .load_collections("/lib/anim.json", &["s-house".to_string()], LinkMode::Link)
            .unwrap()[0];
        scene.link_collection(Parent::Collection(set), house).unwrap();

        scene.set_active_view_layer("alpha_char").unwrap();
        assert_eq!(scene.set_holdout(set, true, true).unwrap(), 3);

        let doc = scene.document();
        assert!(doc.view_layers[0].holdout.is_empty());
        assert_eq!(doc.view_layers[1].holdout.len(), 3);
    }

    #[test]
    fn test_holdout_outside_layer_reports_zero() {
        let mut scene = MemoryScene::new();
        scene
            .document_mut()
            .view_layers
            .push(ViewLayerData::new("alpha_char", &[]));
        let orphan = scene.create_collection("SET");
        assert_eq!(scene.set_holdout(orphan, true, true).unwrap(), 0);

        let linked = scene.add_scene_collection("PROP");
        scene.document_mut().view_layers[0].excluded.insert(linked);
        assert_eq!(scene.set_holdout(linked, true, false).unwrap(), 0);
    }

    #[test]
    fn test_unknown_view_layer() {
        let mut scene = MemoryScene::new();
        let err = scene.set_active_view_layer("alpha_char").unwrap_err();
        assert!(matches!(err, HostError::ViewLayerNotFound { .. }));
    }

    #[test]
    fn test_render_layer_sockets_follow_view_layer() {
        let mut scene = MemoryScene::new();
        scene
            .document_mut()
            .view_layers
            .push(ViewLayerData::new("beauty", &["Image", "Alpha", "Depth"]));
        let node = scene.add_node(NodeKind::RenderLayers, "beauty_layer");
        assert!(scene.output_sockets(node).unwrap().is_empty());
        scene.set_render_layer(node, "beauty").unwrap();
        assert_eq!(scene.output_sockets(node).unwrap(), ["Image", "Alpha", "Depth"]);
    }

    #[test]
    fn test_connect_replaces_existing_input_link() {
        let mut scene = MemoryScene::new();
        scene
            .document_mut()
            .view_layers
            .push(ViewLayerData::new("beauty", &["Image", "Alpha"]));
        let layer = scene.add_node(NodeKind::RenderLayers, "layer");
        scene.set_render_layer(layer, "beauty").unwrap();
        let out = scene.add_node(NodeKind::OutputFile, "out");
        scene.set_file_slots(out, &["Image".to_string()]).unwrap();

        scene.connect(layer, 0, out, 0).unwrap();
        scene.connect(layer, 1, out, 0).unwrap();
        assert_eq!(scene.document().links.len(), 1);
        assert_eq!(scene.links_into(out), vec![("layer".to_string(), 1, 0)]);

        let err = scene.connect(layer, 5, out, 0).unwrap_err();
        assert!(matches!(err, HostError::SocketOutOfRange { side: "output", .. }));
    }

    #[test]
    fn test_output_paths_need_one_path_per_slot() {
        let mut scene = MemoryScene::new();
        let out = scene.add_node(NodeKind::OutputFile, "out");
        scene
            .set_file_slots(out, &["Image".to_string(), "Alpha".to_string()])
            .unwrap();

        let err = scene.set_output_paths(out, "/out/x_####", &["/out/x_####"]).unwrap_err();
        assert!(matches!(err, HostError::SlotPathCount { slots: 2, paths: 1, .. }));

        scene
            .set_output_paths(out, "/out/x_####", &["/out/a_####", "/out/b_####"])
            .unwrap();
        let node = &scene.document().nodes[out.0];
        assert_eq!(node.base_path, "/out/x_####");
        assert_eq!(node.slots[1].path, "/out/b_####");
    }

    #[test]
    fn test_denoise_quality_capability() {
        let mut scene = MemoryScene::new();
        let node = scene.add_node(NodeKind::Denoise, "denoise");
        assert!(scene.supports(node, Capability::DenoiseQuality));
        scene.set_denoise_quality(node, "HIGH").unwrap();

        scene.document_mut().capabilities.denoise_quality = false;
        assert!(!scene.supports(node, Capability::DenoiseQuality));
        assert!(scene.set_denoise_quality(node, "HIGH").is_err());
    }

    #[test]
    fn test_camera_configuration() {
        let mut scene = MemoryScene::new();
        scene.register_library("/lib/anim.json", library());
        let cam = scene
            .load_collections("/lib/anim.json", &["CAM".to_string()], LinkMode::Link)
            .unwrap()[0];
        assert_eq!(scene.cameras_in(cam).unwrap(), ["shot_cam"]);

        scene.set_active_camera("shot_cam").unwrap();
        scene
            .configure_camera(
                "shot_cam",
                &CameraSettings {
                    use_dof: false,
                    clip_end: 1000.0,
                },
            )
            .unwrap();
        let object = &scene.document().collections[&cam.0].objects[0];
        assert_eq!(
            object.camera,
            Some(CameraData {
                use_dof: false,
                clip_end: 1000.0
            })
        );
        assert!(scene.set_active_camera("nope").is_err());
    }

    #[test]
    fn test_save_open_and_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let lib_path = dir.path().join("anim.json");
        std::fs::write(&lib_path, serde_json::to_string(&library()).unwrap()).unwrap();
        let lib = lib_path.to_string_lossy().into_owned();

        let mut scene = MemoryScene::new();
        let hero = scene
            .load_collections(&lib, &["c-hero".to_string()], LinkMode::Link)
            .unwrap()[0];
        scene.link_collection(Parent::SceneRoot, hero).unwrap();

        let out = dir.path().join("lighting.json");
        scene.save_as(&out).unwrap();
        scene.make_paths_relative().unwrap();
        assert_eq!(
            scene.collection_info(hero).unwrap().library.as_deref(),
            Some("//anim.json")
        );

        let moved = dir.path().join("publish");
        std::fs::create_dir(&moved).unwrap();
        scene.save_as(&moved.join("lighting.json")).unwrap();
        let expected = lib_path.display().to_string();
        assert_eq!(
            scene.collection_info(hero).unwrap().library.as_deref(),
            Some(expected.as_str())
        );

        let mut reopened = MemoryScene::new();
        reopened.open_file(&out).unwrap();
        assert_eq!(reopened.collections_named("c-hero").len(), 1);
        assert_eq!(reopened.current_file(), Some(out.as_path()));
    }
}
