//! Compositor graph assembly.
//!
//! The graph has a fixed topology with two branches:
//!
//! ```text
//! beauty_layer ──Image──▶ beauty_denoise ──Image──▶ beauty_output (17 slots)
//!      └──────────── every other pass, by name ───────────▲
//!
//! alpha_chr_layer ──Image, Alpha──▶ alpha_chr_output (2 slots)
//! ```
//!
//! [`CompositeGraphAssembler::assemble`] describes the graph without touching
//! a scene; [`apply`] rebuilds it on a host. Links are made by socket name
//! when both sides exist. One designated pass is additionally linked by
//! index when its destination input is still unlinked, which covers hosts
//! that name a render output differently from the slot (`Transp` vs
//! `Transparent`).

use serde::{Deserialize, Serialize};

use shotline_common::config::{AppConfig, CompositorConfig};
use shotline_common::error::{ShotlineError, ShotlineResult};
use shotline_scene_host::{Capability, NodeId, NodeKind, SceneHost};
use shotline_shot_model::identity::ShotIdentity;
use shotline_shot_model::passes::{alpha_passes, beauty_passes, OutputTarget, PassSpec};
use shotline_shot_model::paths::PathResolver;

/// View layer rendered by the beauty branch.
pub const BEAUTY_LAYER: &str = "beauty";
/// View layer rendered by the alpha-matte branch.
pub const ALPHA_LAYER: &str = "alpha_char";

/// Denoiser sockets.
const DENOISE_IMAGE: &str = "Image";
const DENOISE_OUTPUT: &str = "Image";

/// Render-layer guide outputs and the denoiser inputs they feed.
pub const GUIDE_LINKS: [(&str, &str); 2] = [
    ("Denoising Normal", "Normal"),
    ("Denoising Albedo", "Albedo"),
];

/// Feature flags of the assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblerOptions {
    /// Beauty slot linked by index when its by-name link is missing.
    pub positional_fallback: Option<usize>,
    pub denoise: bool,
    pub denoise_quality: String,
    /// Run the holdout step after building the graph.
    pub holdout: bool,
    pub holdout_view_layer: String,
    pub holdout_bucket: String,
}

impl From<&CompositorConfig> for AssemblerOptions {
    fn from(config: &CompositorConfig) -> Self {
        Self {
            positional_fallback: config.positional_fallback,
            denoise: config.denoise,
            denoise_quality: config.denoise_quality.clone(),
            holdout: config.holdout,
            holdout_view_layer: config.holdout_view_layer.clone(),
            holdout_bucket: config.holdout_bucket.clone(),
        }
    }
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self::from(&CompositorConfig::default())
    }
}

/// A node to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    pub label: String,
    pub location: [f32; 2],
}

impl NodeSpec {
    fn new(kind: NodeKind, name: &str, location: [f32; 2]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            label: name.to_string(),
            location,
        }
    }
}

/// Description of one render-layer → (denoise) → file-output chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSpec {
    /// View layer the render-layers node reads.
    pub view_layer: String,
    pub layer_node: NodeSpec,
    pub denoise_node: Option<NodeSpec>,
    pub denoise_quality: Option<String>,
    pub output_node: NodeSpec,
    pub target: OutputTarget,
    pub positional_fallback: Option<usize>,
}

/// The full graph for one shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeGraph {
    pub beauty: BranchSpec,
    pub alpha: BranchSpec,
    pub options: AssemblerOptions,
}

impl CompositeGraph {
    pub fn branches(&self) -> [&BranchSpec; 2] {
        [&self.beauty, &self.alpha]
    }
}

/// Builds [`CompositeGraph`]s for shots.
#[derive(Debug, Clone)]
pub struct CompositeGraphAssembler {
    resolver: PathResolver,
    options: AssemblerOptions,
}

impl CompositeGraphAssembler {
    pub fn new(resolver: PathResolver, options: AssemblerOptions) -> Self {
        Self { resolver, options }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            PathResolver::new(&config.paths),
            AssemblerOptions::from(&config.compositor),
        )
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn assemble(&self, identity: &ShotIdentity) -> ShotlineResult<CompositeGraph> {
        let beauty = BranchSpec {
            view_layer: BEAUTY_LAYER.to_string(),
            layer_node: NodeSpec::new(NodeKind::RenderLayers, "beauty_layer", [-600.0, 300.0]),
            denoise_node: self
                .options
                .denoise
                .then(|| NodeSpec::new(NodeKind::Denoise, "beauty_denoise", [-350.0, 300.0])),
            denoise_quality: self
                .options
                .denoise
                .then(|| self.options.denoise_quality.clone()),
            output_node: NodeSpec::new(NodeKind::OutputFile, "beauty_output", [100.0, 300.0]),
            target: target(self.resolver.resolve(identity, BEAUTY_LAYER), beauty_passes())?,
            positional_fallback: self.options.positional_fallback,
        };

        let alpha = BranchSpec {
            view_layer: ALPHA_LAYER.to_string(),
            layer_node: NodeSpec::new(NodeKind::RenderLayers, "alpha_chr_layer", [-600.0, -120.0]),
            denoise_node: None,
            denoise_quality: None,
            output_node: NodeSpec::new(NodeKind::OutputFile, "alpha_chr_output", [100.0, -120.0]),
            target: target(self.resolver.resolve(identity, ALPHA_LAYER), alpha_passes())?,
            positional_fallback: None,
        };

        tracing::debug!(shot = %identity, "Assembled compositor graph");
        Ok(CompositeGraph {
            beauty,
            alpha,
            options: self.options.clone(),
        })
    }
}

fn target(base_path: String, slots: Vec<PassSpec>) -> ShotlineResult<OutputTarget> {
    OutputTarget::new(base_path, slots).map_err(|e| ShotlineError::compositor(e.to_string()))
}

/// Host handles of one built branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphBranch {
    pub layer_node: NodeId,
    pub denoise_node: Option<NodeId>,
    pub output_node: NodeId,
    pub target: OutputTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedGraph {
    pub beauty: GraphBranch,
    pub alpha: GraphBranch,
}

/// Clear the compositor tree and build `graph` on `host`.
///
/// Does not run the holdout step; see [`crate::holdout::apply_holdout`].
pub fn apply(host: &mut impl SceneHost, graph: &CompositeGraph) -> ShotlineResult<AppliedGraph> {
    host.clear_nodes();
    let beauty = build_branch(host, &graph.beauty)?;
    let alpha = build_branch(host, &graph.alpha)?;
    tracing::info!("Compositor graph rebuilt");
    Ok(AppliedGraph { beauty, alpha })
}

fn add_node(host: &mut impl SceneHost, spec: &NodeSpec) -> ShotlineResult<NodeId> {
    let id = host.add_node(spec.kind, &spec.name);
    host.set_node_label(id, &spec.label)?;
    host.set_node_location(id, spec.location)?;
    Ok(id)
}

fn position(sockets: &[String], name: &str) -> Option<usize> {
    sockets.iter().position(|s| s == name)
}

fn build_branch(host: &mut impl SceneHost, branch: &BranchSpec) -> ShotlineResult<GraphBranch> {
    let layer = add_node(host, &branch.layer_node)?;
    host.set_render_layer(layer, &branch.view_layer)?;

    let denoise = match &branch.denoise_node {
        Some(spec) => {
            let id = add_node(host, spec)?;
            if let Some(quality) = &branch.denoise_quality {
                if host.supports(id, Capability::DenoiseQuality) {
                    host.set_denoise_quality(id, quality)?;
                } else {
                    tracing::info!(node = %spec.name, "Denoise quality not exposed by host, skipped");
                }
            }
            Some(id)
        }
        None => None,
    };

    let output = add_node(host, &branch.output_node)?;
    let target = &branch.target;
    let slot_names: Vec<String> = target.slots().iter().map(|s| s.name.clone()).collect();
    host.set_file_slots(output, &slot_names)?;
    let slot_paths: Vec<&str> = target.slots().iter().map(|s| target.slot_path(s)).collect();
    host.set_output_paths(output, target.base_path(), &slot_paths)?;

    let layer_outputs = host.output_sockets(layer)?;
    let output_inputs = host.input_sockets(output)?;

    for slot in branch.target.slots() {
        let Some(input) = position(&output_inputs, &slot.name) else {
            continue;
        };
        if let Some(denoise) = denoise.filter(|_| slot.is_primary) {
            link_denoised(host, layer, &layer_outputs, denoise, output, input, &slot.name)?;
            continue;
        }
        let Some(source) = position(&layer_outputs, &slot.name) else {
            tracing::debug!(pass = %slot.name, layer = %branch.view_layer, "Render layer has no such output");
            continue;
        };
        host.connect(layer, source, output, input)?;
    }

    if let Some(denoise) = denoise {
        link_guides(host, layer, &layer_outputs, denoise)?;
    }

    if let Some(index) = branch.positional_fallback {
        link_positional(host, layer, &layer_outputs, output, &output_inputs, index)?;
    }

    Ok(GraphBranch {
        layer_node: layer,
        denoise_node: denoise,
        output_node: output,
        target: branch.target.clone(),
    })
}

/// Route the primary pass through the denoiser. Each half is linked on its
/// own when both of its sockets exist.
fn link_denoised(
    host: &mut impl SceneHost,
    layer: NodeId,
    layer_outputs: &[String],
    denoise: NodeId,
    output: NodeId,
    input: usize,
    pass: &str,
) -> ShotlineResult<()> {
    let denoise_inputs = host.input_sockets(denoise)?;
    match (position(layer_outputs, pass), position(&denoise_inputs, DENOISE_IMAGE)) {
        (Some(source), Some(d_in)) => host.connect(layer, source, denoise, d_in)?,
        _ => tracing::info!(pass, "Render layer pass not available for denoising, skipped"),
    }

    let denoise_outputs = host.output_sockets(denoise)?;
    match position(&denoise_outputs, DENOISE_OUTPUT) {
        Some(d_out) => host.connect(denoise, d_out, output, input)?,
        None => tracing::info!(pass, "Denoise node has no image output, skipped"),
    }
    Ok(())
}

fn link_guides(
    host: &mut impl SceneHost,
    layer: NodeId,
    layer_outputs: &[String],
    denoise: NodeId,
) -> ShotlineResult<()> {
    let denoise_inputs = host.input_sockets(denoise)?;
    for (from, to) in GUIDE_LINKS {
        match (position(layer_outputs, from), position(&denoise_inputs, to)) {
            (Some(out), Some(inp)) => host.connect(layer, out, denoise, inp)?,
            _ => tracing::info!(guide = from, "Denoise guide channel not available, skipped"),
        }
    }
    Ok(())
}

fn link_positional(
    host: &mut impl SceneHost,
    layer: NodeId,
    layer_outputs: &[String],
    output: NodeId,
    output_inputs: &[String],
    index: usize,
) -> ShotlineResult<()> {
    if index >= layer_outputs.len() || index >= output_inputs.len() {
        tracing::debug!(index, "Positional fallback socket out of range, skipped");
        return Ok(());
    }
    if host.is_input_linked(output, index)? {
        return Ok(());
    }
    host.connect(layer, index, output, index)?;
    tracing::info!(
        output = %layer_outputs[index],
        slot = %output_inputs[index],
        index,
        "Linked pass by position"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotline_shot_model::passes::BEAUTY_PASSES;

    #[test]
    fn test_assemble_describes_both_branches() {
        let assembler = CompositeGraphAssembler::new(PathResolver::default(), AssemblerOptions::default());
        let identity = ShotIdentity::parse("jgt_ep012_sq03_sh0040_lgt");
        let graph = assembler.assemble(&identity).unwrap();

        assert_eq!(graph.beauty.layer_node.name, "beauty_layer");
        assert_eq!(graph.beauty.layer_node.label, "beauty_layer");
        assert_eq!(graph.beauty.layer_node.location, [-600.0, 300.0]);
        assert_eq!(graph.beauty.denoise_node.as_ref().unwrap().location, [-350.0, 300.0]);
        assert_eq!(graph.beauty.denoise_quality.as_deref(), Some("HIGH"));
        assert_eq!(graph.beauty.target.slot_names(), BEAUTY_PASSES);
        assert_eq!(graph.beauty.positional_fallback, Some(7));
        assert_eq!(
            graph.beauty.target.base_path(),
            "/mnt/K/ep012/ep012_sq03/ep012_sq03_sh0040/exr/beauty/jgt_ep012_sq03_sh0040_beauty_####"
        );

        assert_eq!(graph.alpha.view_layer, "alpha_char");
        assert_eq!(graph.alpha.output_node.name, "alpha_chr_output");
        assert_eq!(graph.alpha.output_node.location, [100.0, -120.0]);
        assert_eq!(graph.alpha.target.slot_names(), ["Image", "Alpha"]);
        assert!(graph.alpha.denoise_node.is_none());
        assert!(graph.alpha.target.base_path().contains("/exr/alpha_char/"));
    }

    #[test]
    fn test_options_disable_denoise_and_fallback() {
        let options = AssemblerOptions {
            denoise: false,
            positional_fallback: None,
            ..AssemblerOptions::default()
        };
        let graph = CompositeGraphAssembler::new(PathResolver::default(), options)
            .assemble(&ShotIdentity::fallback())
            .unwrap();
        assert!(graph.beauty.denoise_node.is_none());
        assert!(graph.beauty.denoise_quality.is_none());
        assert!(graph.beauty.positional_fallback.is_none());
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let assembler = CompositeGraphAssembler::new(PathResolver::default(), AssemblerOptions::default());
        let identity = ShotIdentity::parse("rmb_ep002_sq03_sh0040");
        assert_eq!(
            assembler.assemble(&identity).unwrap(),
            assembler.assemble(&identity).unwrap()
        );
    }

    #[test]
    fn test_apply_writes_each_slot_path_from_target() {
        use shotline_scene_host::{MemoryScene, ViewLayerData};

        let mut host = MemoryScene::new();
        host.document_mut().view_layers = vec![
            ViewLayerData::new(BEAUTY_LAYER, &BEAUTY_PASSES),
            ViewLayerData::new(ALPHA_LAYER, &["Image", "Alpha"]),
        ];
        let graph = CompositeGraphAssembler::new(PathResolver::default(), AssemblerOptions::default())
            .assemble(&ShotIdentity::parse("jgt_ep001_sq0001_sh0010"))
            .unwrap();
        let applied = apply(&mut host, &graph).unwrap();

        for branch in [&applied.beauty, &applied.alpha] {
            let node = &host.document().nodes[branch.output_node.0];
            assert_eq!(node.base_path, branch.target.base_path());
            assert_eq!(node.slots.len(), branch.target.slots().len());
            for (written, slot) in node.slots.iter().zip(branch.target.slots()) {
                assert_eq!(written.name, slot.name);
                assert_eq!(written.path, branch.target.slot_path(slot));
            }
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_outputs_follow_identity(ep in 0u32..1000, sq in 0u32..100, sh in 0u32..10000) {
            let identity = ShotIdentity::parse(&format!("ep{ep:03}_sq{sq:02}_sh{sh:04}"));
            let graph = CompositeGraphAssembler::new(PathResolver::default(), AssemblerOptions::default())
                .assemble(&identity)
                .unwrap();
            for branch in graph.branches() {
                let base = branch.target.base_path();
                proptest::prop_assert!(base.contains(&identity.shot_key()));
                proptest::prop_assert!(base.ends_with("_####"));
            }
            proptest::prop_assert_eq!(graph.beauty.target.slots().len(), 17);
        }
    }
}
