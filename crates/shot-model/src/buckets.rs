//! Asset bucket mapping and planning.
//!
//! Library collections are sorted into fixed parent "buckets" by name prefix
//! (`c-hero` goes under `CHAR`). One rule without a prefix names the camera
//! collection, which is linked exactly by name and placed at the scene root
//! instead of under a bucket.
//!
//! Planning is pure; applying a plan to a scene lives in the pipeline crate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use shotline_common::config::{BucketConfig, BucketRuleConfig};

/// One bucket of the mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRule {
    pub bucket: String,
    /// Name prefix claimed by this bucket. `None` makes this the exact-name
    /// rule: only the source named like the mapping's camera collection is
    /// taken.
    pub prefix: Option<String>,
    /// Fail the run when nothing ends up in this bucket.
    pub required: bool,
}

impl BucketRule {
    pub fn prefixed(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: Some(prefix.into()),
            required: false,
        }
    }

    pub fn exact(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn is_exact(&self) -> bool {
        self.prefix.is_none()
    }

    fn claims(&self, name: &str, camera_collection: &str) -> bool {
        match &self.prefix {
            Some(prefix) => name.starts_with(prefix.as_str()),
            None => name == camera_collection,
        }
    }
}

impl From<&BucketRuleConfig> for BucketRule {
    fn from(cfg: &BucketRuleConfig) -> Self {
        Self {
            bucket: cfg.bucket.clone(),
            prefix: cfg.prefix.clone(),
            required: cfg.required,
        }
    }
}

/// Ordered bucket rules. Earlier rules win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMapping {
    rules: Vec<BucketRule>,
    camera_collection: String,
}

impl BucketMapping {
    /// Rules whose exact-name rule (if any) takes the collection named like
    /// its bucket.
    pub fn new(rules: Vec<BucketRule>) -> Self {
        let camera_collection = rules
            .iter()
            .find(|r| r.is_exact())
            .map(|r| r.bucket.clone())
            .unwrap_or_default();
        Self {
            rules,
            camera_collection,
        }
    }

    pub fn from_config(config: &BucketConfig) -> Self {
        Self {
            rules: config.rules.iter().map(BucketRule::from).collect(),
            camera_collection: config.camera_collection.clone(),
        }
    }

    /// Name the exact-name rule looks for.
    pub fn camera_collection(&self) -> &str {
        &self.camera_collection
    }

    /// `CHAR c-`, `PROP p-`, `SET s-`, `VEH v-`, then the exact `CAM` rule.
    pub fn standard() -> Self {
        Self::from_config(&BucketConfig::default())
    }

    pub fn rules(&self) -> &[BucketRule] {
        &self.rules
    }

    pub fn rule(&self, bucket: &str) -> Option<&BucketRule> {
        self.rules.iter().find(|r| r.bucket == bucket)
    }
}

impl Default for BucketMapping {
    fn default() -> Self {
        Self::standard()
    }
}

/// What happens to a bucket before its members are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketAction {
    /// Nothing by that name exists yet.
    Create,
    /// A collection by that name exists and is destroyed first. For the
    /// scene-root bucket this is the camera collection itself.
    Recreate,
}

/// Where the members of a bucket are parented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketPlacement {
    /// Under a freshly created parent collection named after the bucket.
    Bucket,
    /// Directly under the scene root; no parent collection is created.
    SceneRoot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedBucket {
    pub name: String,
    pub action: BucketAction,
    pub placement: BucketPlacement,
    pub required: bool,
    /// Source collection names, in source enumeration order.
    pub members: Vec<String>,
}

/// The full bucketing decision for one library, buckets in mapping order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketPlan {
    pub source_library: String,
    /// Collection taken by the exact-name rule.
    pub camera_collection: String,
    pub buckets: Vec<PlannedBucket>,
}

impl BucketPlan {
    pub fn bucket(&self, name: &str) -> Option<&PlannedBucket> {
        self.buckets.iter().find(|b| b.name == name)
    }

    pub fn members_of(&self, name: &str) -> &[String] {
        self.bucket(name).map(|b| b.members.as_slice()).unwrap_or(&[])
    }

    /// Every assigned source name, bucket by bucket.
    pub fn assigned(&self) -> impl Iterator<Item = &str> {
        self.buckets
            .iter()
            .flat_map(|b| b.members.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.members.is_empty())
    }
}

/// Decide which source collections go into which bucket.
///
/// Exact-name rules take their name first, whatever their position. Prefix
/// rules then claim names in mapping order; a name claimed once is never
/// offered to a later bucket. `existing_names` are the collection names
/// already present in the target scene.
pub fn plan(
    source_names: &[String],
    mapping: &BucketMapping,
    source_library: &str,
    existing_names: &[String],
) -> BucketPlan {
    let existing: HashSet<&str> = existing_names.iter().map(String::as_str).collect();
    let camera = mapping.camera_collection.as_str();
    let mut claimed: HashSet<&str> = HashSet::new();
    if mapping.rules.iter().any(BucketRule::is_exact) && source_names.iter().any(|n| n == camera) {
        claimed.insert(camera);
    }

    let mut buckets = Vec::with_capacity(mapping.rules.len());
    for rule in &mapping.rules {
        let members: Vec<String> = if rule.is_exact() {
            source_names
                .iter()
                .find(|n| rule.claims(n, camera))
                .cloned()
                .into_iter()
                .collect()
        } else {
            let mut taken = Vec::new();
            for name in source_names {
                if rule.claims(name, camera) && claimed.insert(name.as_str()) {
                    taken.push(name.clone());
                }
            }
            taken
        };

        let scene_name = if rule.is_exact() {
            camera
        } else {
            rule.bucket.as_str()
        };
        let action = if existing.contains(scene_name) {
            BucketAction::Recreate
        } else {
            BucketAction::Create
        };
        let placement = if rule.is_exact() {
            BucketPlacement::SceneRoot
        } else {
            BucketPlacement::Bucket
        };

        tracing::debug!(
            bucket = %rule.bucket,
            members = members.len(),
            ?action,
            "Planned bucket"
        );
        buckets.push(PlannedBucket {
            name: rule.bucket.clone(),
            action,
            placement,
            required: rule.required,
            members,
        });
    }

    BucketPlan {
        source_library: source_library.to_string(),
        camera_collection: camera.to_string(),
        buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_standard_mapping() {
        let source = names(&["c-hero", "p-chair", "CAM"]);
        let plan = plan(&source, &BucketMapping::standard(), "/lib/anim.blend", &[]);

        let order: Vec<&str> = plan.buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(order, ["CHAR", "PROP", "SET", "VEH", "CAM"]);
        assert_eq!(plan.members_of("CHAR"), ["c-hero"]);
        assert_eq!(plan.members_of("PROP"), ["p-chair"]);
        assert!(plan.members_of("SET").is_empty());
        assert!(plan.members_of("VEH").is_empty());
        assert_eq!(plan.members_of("CAM"), ["CAM"]);
        assert_eq!(
            plan.bucket("CAM").unwrap().placement,
            BucketPlacement::SceneRoot
        );
        assert!(plan
            .buckets
            .iter()
            .all(|b| b.action == BucketAction::Create));
    }

    #[test]
    fn test_existing_buckets_are_recreated() {
        let source = names(&["s-house"]);
        let plan = plan(
            &source,
            &BucketMapping::standard(),
            "/lib/anim.blend",
            &names(&["SET", "CAM", "Lights"]),
        );
        assert_eq!(plan.bucket("SET").unwrap().action, BucketAction::Recreate);
        assert_eq!(plan.bucket("CAM").unwrap().action, BucketAction::Recreate);
        assert_eq!(plan.bucket("CHAR").unwrap().action, BucketAction::Create);
    }

    #[test]
    fn test_first_bucket_wins_on_overlapping_prefixes() {
        let mapping = BucketMapping::new(vec![
            BucketRule::prefixed("CHAR", "c-"),
            BucketRule::prefixed("CROWD", "c-crowd"),
        ]);
        let plan = plan(&names(&["c-crowd01", "c-hero"]), &mapping, "", &[]);
        assert_eq!(plan.members_of("CHAR"), ["c-crowd01", "c-hero"]);
        assert!(plan.members_of("CROWD").is_empty());
    }

    #[test]
    fn test_camera_rule_is_exact_and_takes_precedence() {
        let mapping = BucketMapping::new(vec![
            BucketRule::prefixed("MISC", "CA"),
            BucketRule::exact("CAM"),
        ]);
        let plan = plan(&names(&["CAM", "CAM_backup", "CAMERA"]), &mapping, "", &[]);
        assert_eq!(plan.members_of("CAM"), ["CAM"]);
        assert_eq!(plan.members_of("MISC"), ["CAM_backup", "CAMERA"]);
    }

    #[test]
    fn test_camera_collection_name_from_config() {
        let config = BucketConfig {
            camera_collection: "SHOTCAM".to_string(),
            ..BucketConfig::default()
        };
        let mapping = BucketMapping::from_config(&config);
        let plan = plan(&names(&["CAM", "SHOTCAM"]), &mapping, "", &[]);
        assert_eq!(plan.members_of("CAM"), ["SHOTCAM"]);
    }

    #[test]
    fn test_prefix_is_case_sensitive_and_unmatched_names_are_ignored() {
        let plan = plan(
            &names(&["C-hero", "lights", "cam"]),
            &BucketMapping::standard(),
            "",
            &[],
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_required_flag_from_config() {
        let mut config = BucketConfig::default();
        config.rules[0].required = true;
        let mapping = BucketMapping::from_config(&config);
        assert!(mapping.rule("CHAR").unwrap().required);
        let plan = plan(&[], &mapping, "", &[]);
        assert!(plan.bucket("CHAR").unwrap().required);
    }

    proptest! {
        #[test]
        fn prop_no_name_assigned_twice(raw in proptest::collection::vec("(c-|p-|s-|v-|CAM|x)[a-z]{0,3}", 0..20)) {
            let plan = plan(&raw, &BucketMapping::standard(), "", &[]);
            let assigned: Vec<&str> = plan.assigned().collect();
            let unique: HashSet<&str> = assigned.iter().copied().collect();
            prop_assert_eq!(assigned.len(), unique.len());
            for name in &assigned {
                prop_assert!(raw.iter().any(|r| r == name));
            }
        }
    }
}
