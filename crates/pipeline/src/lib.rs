//! Shotline Pipeline
//!
//! Prepares a lighting file for a shot on any [`SceneHost`]:
//! - **Bucketing:** sort linked library collections into parent buckets
//! - **Compositor:** rebuild the beauty and alpha-matte output graph
//! - **Holdout:** hide the set from the alpha-matte layer
//! - **Shot run:** the full open → setup → save sequence
//!
//! Graph and bucket descriptions are pure data; only the `apply` steps talk
//! to the host.
//!
//! [`SceneHost`]: shotline_scene_host::SceneHost

pub mod bucketer;
pub mod compositor;
pub mod holdout;
pub mod shot;

pub use bucketer::{apply_plan, plan_for_host, resolve_candidate, LinkReport};
pub use compositor::{AssemblerOptions, CompositeGraph, CompositeGraphAssembler};
pub use holdout::apply_holdout;
pub use shot::{run_shot, ShotContext, ShotJob, ShotReport};
