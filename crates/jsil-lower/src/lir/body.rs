//! Lowered method body
//!
//! Everything the emission stage needs for one function: the instruction sequence and the
//! side tables describing temps, slots, labels, protected regions and resume points.

use super::instr::LirInstr;
use super::value::{LabelId, SlotId, TempId, ValueStorage};
use crate::hir::BindingId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A stable variable slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotInfo {
    /// Binding name, or a `$`-prefixed name for anonymous slots
    pub name: String,
    pub storage: ValueStorage,
    /// Source binding held by this slot
    pub binding: Option<BindingId>,
}

impl SlotInfo {
    pub fn is_anonymous(&self) -> bool {
        self.binding.is_none()
    }
}

/// Kind of a native protected region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegionKind {
    Catch,
    Finally,
}

/// A native protected region, delimited by labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionRegion {
    pub kind: RegionKind,
    pub try_start: LabelId,
    pub try_end: LabelId,
    pub handler_start: LabelId,
    pub handler_end: LabelId,
    /// Caught type for catch regions; `None` catches every exception
    pub catch_type: Option<String>,
}

/// Why a resume state exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResumeKind {
    Await,
    Yield,
    /// Re-entry after a rejected await inside a routed try region
    Reject,
}

/// Registered re-entry point of a generator or async function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumePoint {
    pub resume_state: u32,
    pub resume_label: LabelId,
    /// Temp defined on re-entry (the awaited value or the sent value)
    pub result: Option<TempId>,
    pub kind: ResumeKind,
}

/// Shared exit used by returns that cross a protected region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReturnEpilogue {
    pub label: LabelId,
    pub slot: SlotId,
}

/// Lowered function body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodBody {
    pub name: String,
    pub is_async: bool,
    pub is_generator: bool,
    pub instructions: Vec<LirInstr>,
    /// Storage descriptor per temp, indexed by temp id
    pub temps: Vec<Option<ValueStorage>>,
    pub slots: Vec<SlotInfo>,
    /// Slots written exactly once
    pub single_assignment_slots: BTreeSet<SlotId>,
    pub label_count: u32,
    pub exception_regions: Vec<ExceptionRegion>,
    pub resume_points: Vec<ResumePoint>,
    /// Synthetic fields the capture object of a resumable function must declare
    pub state_fields: Vec<String>,
    pub return_epilogue: Option<ReturnEpilogue>,
}

impl MethodBody {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_async: false,
            is_generator: false,
            instructions: Vec::new(),
            temps: Vec::new(),
            slots: Vec::new(),
            single_assignment_slots: BTreeSet::new(),
            label_count: 0,
            exception_regions: Vec::new(),
            resume_points: Vec::new(),
            state_fields: Vec::new(),
            return_epilogue: None,
        }
    }

    pub fn is_resumable(&self) -> bool {
        self.is_async || self.is_generator
    }

    pub fn temp_count(&self) -> usize {
        self.temps.len()
    }

    /// Storage of a temp; `Unknown` when the temp has none
    pub fn storage_of(&self, temp: TempId) -> ValueStorage {
        self.temps
            .get(temp.index())
            .and_then(|storage| storage.clone())
            .unwrap_or_else(ValueStorage::unknown)
    }

    pub fn slot(&self, slot: SlotId) -> Option<&SlotInfo> {
        self.slots.get(slot.index())
    }

    /// Instruction index of every label
    pub fn label_positions(&self) -> BTreeMap<LabelId, usize> {
        self.instructions
            .iter()
            .enumerate()
            .filter_map(|(index, instr)| match instr {
                LirInstr::Label { label } => Some((*label, index)),
                _ => None,
            })
            .collect()
    }

    /// Number of instructions reading each temp
    pub fn use_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.temps.len()];
        for instr in &self.instructions {
            for temp in instr.used_temps() {
                if let Some(count) = counts.get_mut(temp.index()) {
                    *count += 1;
                }
            }
        }
        counts
    }
}
