//! Applying bucket plans to a live scene.
//!
//! # Steps
//!
//! 1. **Recreate** every prefix bucket as an empty collection under the scene
//!    root, destroying any collection of the same name first. The camera
//!    collection is destroyed but not recreated.
//! 2. **Load** every planned member from the library with link semantics.
//! 3. **Resolve** each member name to one collection datablock, preferring
//!    the one linked from the plan's library.
//! 4. **Parent** it under its bucket, or under the scene root for the camera.

use serde::Serialize;

use shotline_common::error::{ShotlineError, ShotlineResult};
use shotline_scene_host::{CollectionId, CollectionInfo, LinkMode, Parent, SceneHost};
use shotline_shot_model::buckets::{
    plan, BucketAction, BucketMapping, BucketPlacement, BucketPlan, PlannedBucket,
};

/// One collection parented by [`apply_plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedCollection {
    pub bucket: String,
    pub name: String,
    pub id: CollectionId,
    pub library: Option<String>,
    /// Already under the target parent before this run.
    pub already_linked: bool,
}

/// Outcome of [`apply_plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub linked: Vec<LinkedCollection>,
    /// Planned names no collection could be found for.
    pub missing: Vec<String>,
}

impl LinkReport {
    pub fn members_of(&self, bucket: &str) -> Vec<&str> {
        self.linked
            .iter()
            .filter(|l| l.bucket == bucket)
            .map(|l| l.name.as_str())
            .collect()
    }
}

/// Pick one datablock out of several sharing a name.
///
/// The candidate linked from `source_library` wins; otherwise the first in
/// host enumeration order is taken.
pub fn resolve_candidate<'a>(
    candidates: &'a [CollectionInfo],
    source_library: &str,
) -> Option<&'a CollectionInfo> {
    if let Some(exact) = candidates
        .iter()
        .find(|c| c.library.as_deref() == Some(source_library))
    {
        return Some(exact);
    }

    let first = candidates.first()?;
    tracing::info!(
        collection = %first.name,
        candidates = candidates.len(),
        library = ?first.library,
        "No candidate from the source library, taking the first one"
    );
    Some(first)
}

/// Build a plan from what the host reports for `library`.
pub fn plan_for_host(
    host: &mut impl SceneHost,
    mapping: &BucketMapping,
    library: &str,
) -> ShotlineResult<BucketPlan> {
    let source_names = host.library_collections(library)?;
    let existing: Vec<String> = mapping
        .rules()
        .iter()
        .map(|rule| match rule.prefix {
            Some(_) => rule.bucket.as_str(),
            None => mapping.camera_collection(),
        })
        .filter(|name| !host.collections_named(name).is_empty())
        .map(str::to_string)
        .collect();

    tracing::debug!(
        library,
        sources = source_names.len(),
        existing = existing.len(),
        "Planning buckets"
    );
    Ok(plan(&source_names, mapping, library, &existing))
}

/// Unlink every collection called `name` from the scene and delete it.
fn force_remove(host: &mut impl SceneHost, name: &str) -> ShotlineResult<()> {
    for info in host.collections_named(name) {
        host.remove_collection(info.id)?;
        tracing::info!(collection = name, "Removed existing collection");
    }
    Ok(())
}

fn prepare_parent(
    host: &mut impl SceneHost,
    bucket: &PlannedBucket,
    camera_collection: &str,
) -> ShotlineResult<Parent> {
    match bucket.placement {
        BucketPlacement::Bucket => {
            if bucket.action == BucketAction::Recreate {
                force_remove(host, &bucket.name)?;
            }
            let id = host.create_collection(&bucket.name);
            host.link_collection(Parent::SceneRoot, id)?;
            tracing::info!(bucket = %bucket.name, "Created parent collection");
            Ok(Parent::Collection(id))
        }
        BucketPlacement::SceneRoot => {
            if bucket.action == BucketAction::Recreate {
                force_remove(host, camera_collection)?;
            }
            Ok(Parent::SceneRoot)
        }
    }
}

/// Perform `plan` against `host`.
///
/// Missing members are logged and skipped. A `required` bucket that ends up
/// without members is a [`ShotlineError::MissingResource`].
pub fn apply_plan(host: &mut impl SceneHost, plan: &BucketPlan) -> ShotlineResult<LinkReport> {
    let mut parents = Vec::with_capacity(plan.buckets.len());
    for bucket in &plan.buckets {
        parents.push(prepare_parent(host, bucket, &plan.camera_collection)?);
    }

    let names: Vec<String> = plan.assigned().map(str::to_string).collect();
    if !names.is_empty() {
        host.load_collections(&plan.source_library, &names, LinkMode::Link)?;
    }

    let mut report = LinkReport::default();
    for (bucket, parent) in plan.buckets.iter().zip(parents) {
        let mut resolved = 0usize;
        for name in &bucket.members {
            let candidates = host.collections_named(name);
            let Some(found) = resolve_candidate(&candidates, &plan.source_library) else {
                tracing::warn!(bucket = %bucket.name, collection = %name, "Expected linked collection missing");
                report.missing.push(name.clone());
                continue;
            };

            let already_linked = host.children(parent)?.contains(&found.id);
            if already_linked {
                tracing::info!(bucket = %bucket.name, collection = %name, "Already linked");
            } else {
                host.link_collection(parent, found.id)?;
                tracing::info!(bucket = %bucket.name, collection = %name, "Linked collection");
            }
            resolved += 1;
            report.linked.push(LinkedCollection {
                bucket: bucket.name.clone(),
                name: name.clone(),
                id: found.id,
                library: found.library.clone(),
                already_linked,
            });
        }

        if bucket.placement == BucketPlacement::SceneRoot && bucket.members.is_empty() {
            tracing::warn!(
                collection = %plan.camera_collection,
                "Camera collection not found in library"
            );
        }
        if bucket.required && resolved == 0 {
            return Err(ShotlineError::missing_resource(format!(
                "Required bucket '{}' is empty",
                bucket.name
            )));
        }
    }

    Ok(report)
}
