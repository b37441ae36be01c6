//! Holdout step for the alpha-matte layer.

use shotline_common::error::{ShotlineError, ShotlineResult};
use shotline_scene_host::SceneHost;

/// Activate `view_layer`, then hold out every collection named `bucket` and
/// everything below them.
///
/// Both must exist: a missing view layer, a missing collection, or a
/// collection that is not part of the view layer stops the run.
pub fn apply_holdout(
    host: &mut impl SceneHost,
    view_layer: &str,
    bucket: &str,
) -> ShotlineResult<usize> {
    host.set_active_view_layer(view_layer)?;
    tracing::info!(view_layer, "Switched view layer");

    let candidates = host.collections_named(bucket);
    if candidates.is_empty() {
        return Err(ShotlineError::missing_resource(format!(
            "No collection named '{bucket}'"
        )));
    }

    let mut changed = 0;
    for candidate in &candidates {
        changed += host.set_holdout(candidate.id, true, true)?;
    }
    if changed == 0 {
        return Err(ShotlineError::missing_resource(format!(
            "Collection '{bucket}' is not part of view layer '{view_layer}'; \
             make sure it is linked into the scene and not excluded"
        )));
    }

    tracing::info!(collection = bucket, view_layer, changed, "Holdout enabled");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotline_scene_host::{
        LibraryCollection, LibraryDocument, LinkMode, MemoryScene, Parent, ViewLayerData,
    };

    fn scene_with_layers() -> MemoryScene {
        let mut scene = MemoryScene::new();
        scene.document_mut().view_layers = vec![
            ViewLayerData::new("beauty", &[]),
            ViewLayerData::new("alpha_char", &[]),
        ];
        scene
    }

    #[test]
    fn test_holdout_applies_recursively() {
        let mut scene = scene_with_layers();
        let set = scene.add_scene_collection("SET");
        let house = scene.create_collection("s-house");
        scene.link_collection(Parent::Collection(set), house).unwrap();

        assert_eq!(apply_holdout(&mut scene, "alpha_char", "SET").unwrap(), 2);
        assert_eq!(scene.document().active_view_layer.as_deref(), Some("alpha_char"));
        assert!(scene.document().view_layers[0].holdout.is_empty());
    }

    #[test]
    fn test_holdout_covers_every_collection_with_the_name() {
        let mut scene = scene_with_layers();
        scene.add_scene_collection("SET");
        scene.register_library(
            "/lib/anim.json",
            LibraryDocument {
                collections: vec![LibraryCollection::new("SET")],
            },
        );
        let linked = scene
            .load_collections("/lib/anim.json", &["SET".to_string()], LinkMode::Link)
            .unwrap();
        scene.link_collection(Parent::SceneRoot, linked[0]).unwrap();
        assert_eq!(scene.collections_named("SET").len(), 2);

        assert_eq!(apply_holdout(&mut scene, "alpha_char", "SET").unwrap(), 2);
        assert_eq!(scene.document().view_layers[1].holdout.len(), 2);
    }

    #[test]
    fn test_missing_view_layer_is_fatal() {
        let mut scene = MemoryScene::new();
        scene.add_scene_collection("SET");
        let err = apply_holdout(&mut scene, "alpha_char", "SET").unwrap_err();
        assert!(err.is_fatal_resource());
    }

    #[test]
    fn test_missing_collection_is_fatal() {
        let mut scene = scene_with_layers();
        let err = apply_holdout(&mut scene, "alpha_char", "SET").unwrap_err();
        assert!(err.is_fatal_resource());
    }

    #[test]
    fn test_unlinked_collection_is_fatal() {
        let mut scene = scene_with_layers();
        scene.create_collection("SET");
        let err = apply_holdout(&mut scene, "alpha_char", "SET").unwrap_err();
        assert!(err.is_fatal_resource());
    }
}
