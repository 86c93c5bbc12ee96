//! Low-level Intermediate Representation (LIR)
//!
//! The flat form produced by lowering: a single instruction sequence per function body,
//! built around write-once temps and stable variable slots, plus the side tables the
//! emission stage consumes.
//!
//! # Structure
//!
//! - `MethodBody` - One lowered function and its temp/slot/region/resume tables
//! - `LirInstr` - Flat instructions with declared operands and results
//! - `ValueStorage` - Storage descriptor (unboxed, boxed, reference, unknown)

pub mod body;
pub mod instr;
pub mod pretty;
pub mod value;

pub use body::{
    ExceptionRegion, MethodBody, RegionKind, ResumeKind, ResumePoint, ReturnEpilogue, SlotInfo,
};
pub use instr::{
    AwaitReject, BuiltInError, CompareOp, DynamicOp, LirInstr, NumericOp, NumericUnaryOp,
    RuntimeHelper, ScopeSlotSource, StateLabel, SuspendKind,
};
pub use pretty::PrettyPrint;
pub use value::{
    CallableId, FieldRef, LabelId, SlotId, StorageKind, TempId, ValueStorage, ValueType,
};
