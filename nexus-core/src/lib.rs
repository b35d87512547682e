//! Shared data model for the Nexus 5001 trace decoder.
//!
//! This crate has no decoding logic of its own; it only defines the types
//! that the parser, reconstruction state machine, instruction oracle, and
//! stream dispatcher crates pass between each other.

mod config;
mod counts;
mod error;
mod message;
mod per_core_state;
mod section;
mod symbol;

pub use config::{AddrDispFlags, ArchSize, PathRewrite, PathStyle, SessionConfig, TraceType};
pub use counts::{BranchOutcome, Counts, HistoryBits};
pub use error::{CoreError, Error};
pub use message::{
    BType, HistoryField, IctSource, NexusMessage, NexusPayload, SyncReason, TCode,
};
pub use per_core_state::{CallStack, DirectBranchSnapshot, PerCoreState, RetirementState, CALL_STACK_DEPTH};
pub use section::{CachedDecode, Section, SectionFlags};
pub use symbol::{symbol_sort_key, Symbol, SymbolFlags};

/// A RISC-V virtual address.
pub type Address = u64;

/// A free-running (XOR-reconstructed) Nexus timestamp.
pub type Timestamp = u64;
