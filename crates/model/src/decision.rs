use crate::record::BugRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemoryAction {
    Create,
    Update,
}

impl MemoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryAction::Create => "CREATE",
            MemoryAction::Update => "UPDATE",
        }
    }
}

impl std::fmt::Display for MemoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instruction for the report writer, produced once per record per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDecision {
    pub action: MemoryAction,
    pub bug_id: String,
    /// Sorted, deduplicated
    pub merged_lines: Vec<usize>,
    pub record: BugRecord,
}
