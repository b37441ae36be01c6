//! Render passes and multi-slot output targets.

use serde::{Deserialize, Serialize};

/// Passes written by the beauty branch, in slot order.
///
/// Order matters: the positional fallback link addresses a slot by index.
pub const BEAUTY_PASSES: [&str; 17] = [
    "Image",
    "Alpha",
    "Depth",
    "Mist",
    "Emit",
    "Shadow",
    "AO",
    "Transparent",
    "CryptoObject00",
    "CryptoObject01",
    "CryptoObject02",
    "CryptoAsset00",
    "CryptoAsset01",
    "CryptoAsset02",
    "CryptoMaterial00",
    "CryptoMaterial01",
    "CryptoMaterial02",
];

/// Passes written by the alpha-matte branch.
pub const ALPHA_PASSES: [&str; 2] = ["Image", "Alpha"];

/// Name of the primary image channel.
pub const PRIMARY_PASS: &str = "Image";

/// One named image channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PassSpec {
    pub name: String,
    /// The main colour output; routed through the denoiser when present.
    pub is_primary: bool,
}

impl PassSpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let is_primary = name == PRIMARY_PASS;
        Self { name, is_primary }
    }
}

/// Build pass specs from a list of names.
pub fn pass_list(names: &[&str]) -> Vec<PassSpec> {
    names.iter().map(|n| PassSpec::new(*n)).collect()
}

pub fn beauty_passes() -> Vec<PassSpec> {
    pass_list(&BEAUTY_PASSES)
}

pub fn alpha_passes() -> Vec<PassSpec> {
    pass_list(&ALPHA_PASSES)
}

/// A file-output destination: one base path shared by every slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    base_path: String,
    slots: Vec<PassSpec>,
}

/// Two slots of one target share a name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate output slot '{0}'")]
pub struct DuplicateSlot(pub String);

impl OutputTarget {
    pub fn new(base_path: impl Into<String>, slots: Vec<PassSpec>) -> Result<Self, DuplicateSlot> {
        let mut seen = std::collections::HashSet::new();
        for slot in &slots {
            if !seen.insert(slot.name.as_str()) {
                return Err(DuplicateSlot(slot.name.clone()));
            }
        }
        Ok(Self {
            base_path: base_path.into(),
            slots,
        })
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn slots(&self) -> &[PassSpec] {
        &self.slots
    }

    pub fn slot_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }

    /// Path written into a slot. Every slot uses the target's base path.
    pub fn slot_path(&self, _slot: &PassSpec) -> &str {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beauty_pass_order() {
        let passes = beauty_passes();
        assert_eq!(passes.len(), BEAUTY_PASSES.len());
        assert_eq!(passes[0].name, "Image");
        assert!(passes[0].is_primary);
        assert_eq!(passes[7].name, "Transparent");
        assert!(passes.iter().skip(1).all(|p| !p.is_primary));
    }

    #[test]
    fn test_output_target_rejects_duplicates() {
        let err = OutputTarget::new("/out", pass_list(&["Image", "Alpha", "Image"])).unwrap_err();
        assert_eq!(err, DuplicateSlot("Image".to_string()));
    }

    #[test]
    fn test_output_target_uniform_paths() {
        let target = OutputTarget::new("/out/beauty_####", beauty_passes()).unwrap();
        assert!(target
            .slots()
            .iter()
            .all(|slot| target.slot_path(slot) == "/out/beauty_####"));
    }
}
