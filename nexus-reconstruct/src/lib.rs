//! Per-core PC-reconstruction state machine: drives
//! `GetFirstSyncMsg` → `GetSecondMsg` → `GetNextInstruction` ⇄
//! `RetireMessage` → `GetNextMsg` off of a stream of already-parsed
//! [`nexus_core::NexusMessage`]s, consulting an [`nexus_oracle::InstructionOracle`]
//! for instruction sizes, classes, and statically-known branch targets.

mod error;
mod machine;

pub use error::{ReconstructError, Result};
pub use machine::Reconstructor;
