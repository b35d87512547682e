use crate::counts::Counts;
use crate::{Address, Timestamp};

/// Maximum depth of the call/return inference hint stack. A bounded LIFO,
/// not authoritative.
pub const CALL_STACK_DEPTH: usize = 64;

/// The per-core decode state machine's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetirementState {
    GetFirstSyncMsg,
    GetSecondMsg,
    /// Only entered when skipping ahead to a specific message number; the
    /// default entry path goes straight from `GetFirstSyncMsg` to
    /// `GetSecondMsg`.
    GetStartTraceMsg,
    ComputeStartingAddress,
    GetNextMsg,
    GetNextInstruction,
    RetireMessage,
    Done,
    Error,
}

/// A snapshot of the counters in effect when a direct-branch message was
/// retired, so a later `RepeatBranch` can replay the same branch `b_cnt`
/// additional times, in response to a later `RetireMessage` / `RepeatBranch`.
#[derive(Debug, Clone, Copy)]
pub struct DirectBranchSnapshot {
    pub branch_address: Address,
    pub target_address: Address,
}

/// Bounded LIFO of return addresses used for call/return classification.
/// On overflow, further pushes are silently dropped, and the stack never
/// alters `current_address` by itself.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Vec<Address>,
}

impl CallStack {
    pub fn push(&mut self, return_address: Address) {
        if self.frames.len() < CALL_STACK_DEPTH {
            self.frames.push(return_address);
        } else {
            log::warn!(
                "call-stack hint overflowed at depth {}; dropping push of {:#x}",
                CALL_STACK_DEPTH,
                return_address
            );
        }
    }

    /// Pop iff the top of the stack matches `target`; returns whether this
    /// indirect branch should be classified as a return.
    pub fn pop_if_return(&mut self, target: Address) -> bool {
        match self.frames.last() {
            Some(&top) if top == target => {
                self.frames.pop();
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Mutable per-core decode context.
#[derive(Debug, Clone)]
pub struct PerCoreState {
    pub core_id: u32,
    pub current_address: Address,
    pub last_faddr: Address,
    pub last_time: Timestamp,
    pub counts: Counts,
    pub call_stack: CallStack,
    pub state: RetirementState,
    pub last_direct_branch: Option<DirectBranchSnapshot>,
}

impl PerCoreState {
    pub fn new(core_id: u32) -> PerCoreState {
        PerCoreState {
            core_id,
            current_address: 0,
            last_faddr: 0,
            last_time: 0,
            counts: Counts::new(),
            call_stack: CallStack::default(),
            state: RetirementState::GetFirstSyncMsg,
            last_direct_branch: None,
        }
    }
}
