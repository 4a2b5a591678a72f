use lantern_types::Hash;
use serde::{Deserialize, Serialize};

/// Persisted record of one sealed section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMeta {
    /// Section root.
    pub root: Hash,
    /// Chain head number when the section was sealed.
    pub sealed_at_block: u64,
    /// Hash of the section's last block.
    pub head_hash: Hash,
}

/// Storage key of section `index`.
pub fn section_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}
