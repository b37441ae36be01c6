//! Shotline Script
//!
//! Turns a prepared shot into a self-contained Python script the host
//! application runs unattended.
//!
//! ```text
//! ShotJob ──┐
//!           ├── ShotContext (identity, range, buckets, graph)
//! config ───┘         │
//!                     ▼
//!          template variables (Python literals)
//!                     │
//! shot_setup.py ──────┤ @@NAME@@ substitution
//!                     ▼
//!               setup script
//! ```

pub mod emitter;
pub mod literal;
pub mod template;

pub use emitter::{emit, variables, ScriptEmitter, SHOT_SETUP_TEMPLATE};
pub use literal::PyValue;
pub use template::{Template, TemplateError, DELIMITER};
