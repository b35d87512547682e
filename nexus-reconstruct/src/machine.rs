use nexus_core::{
    Address, BranchOutcome, HistoryField, IctSource, NexusMessage, NexusPayload, PerCoreState,
    RetirementState, TCode,
};
use nexus_oracle::InstructionOracle;

use crate::error::{ReconstructError, Result};

/// The TCode/payload pair awaiting `RetireMessage` once `i_cnt_remaining`
/// reaches zero.
#[derive(Debug, Clone)]
struct PendingMessage {
    payload: NexusPayload,
}

/// Drives one core's PC reconstruction.
///
/// One `Reconstructor` exists per traced core; the dispatcher routes each
/// incoming [`NexusMessage`] to the `Reconstructor` selected by the
/// message's `core_id`.
pub struct Reconstructor<'o> {
    pub state: PerCoreState,
    oracle: &'o InstructionOracle,
    pending: Option<PendingMessage>,
}

impl<'o> Reconstructor<'o> {
    pub fn new(core_id: u32, oracle: &'o InstructionOracle) -> Reconstructor<'o> {
        Reconstructor {
            state: PerCoreState::new(core_id),
            oracle,
            pending: None,
        }
    }

    /// Feed one message to this core's state machine. Returns the PCs
    /// retired as a result, in emission order. Once the core enters
    /// `Error`, further calls are no-ops that return an empty list.
    pub fn on_message(&mut self, msg: &NexusMessage) -> Vec<Address> {
        if matches!(
            self.state.state,
            RetirementState::Error | RetirementState::Done
        ) {
            return Vec::new();
        }
        let mut emitted = Vec::new();
        if let Err(e) = self.step(msg, &mut emitted) {
            log::error!(
                "core {}: session-terminating reconstruction error, core stopped: {e}",
                self.state.core_id
            );
            self.state.state = RetirementState::Error;
        }
        emitted
    }

    fn step(&mut self, msg: &NexusMessage, emitted: &mut Vec<Address>) -> Result<()> {
        match self.state.state {
            RetirementState::GetFirstSyncMsg
            | RetirementState::GetStartTraceMsg
            | RetirementState::ComputeStartingAddress => {
                if is_ws_sync_class(msg) {
                    self.establish_sync(msg);
                    self.state.state = RetirementState::GetSecondMsg;
                } else {
                    log::trace!(
                        "core {}: {:?} seen before first sync; surfaced but ignored",
                        self.state.core_id,
                        msg.tcode
                    );
                }
                Ok(())
            }
            RetirementState::GetSecondMsg => self.dispatch_counted_message(msg, emitted),
            RetirementState::GetNextMsg => match msg.tcode {
                TCode::AuxAccessWrite
                | TCode::DataAcquisition
                | TCode::OwnershipTrace
                | TCode::Error => {
                    log::debug!(
                        "core {}: retiring side-effect message {:?} inline",
                        self.state.core_id,
                        msg.tcode
                    );
                    Ok(())
                }
                TCode::RepeatBranch | TCode::InCircuitTrace | TCode::InCircuitTraceWS | TCode::TrapInfo => {
                    self.retire_immediate(msg, emitted)
                }
                TCode::ResourceFull if msg.payload.i_cnt().is_none() => {
                    load_counts(&mut self.state, msg)?;
                    Ok(())
                }
                _ => self.dispatch_counted_message(msg, emitted),
            },
            RetirementState::GetNextInstruction | RetirementState::RetireMessage => {
                Err(ReconstructError::ImpossibleTransition(
                    "on_message invoked while a walk was already in progress",
                ))
            }
            RetirementState::Done | RetirementState::Error => Ok(()),
        }
    }

    fn establish_sync(&mut self, msg: &NexusMessage) {
        let addr = match &msg.payload {
            NexusPayload::Sync { f_addr, .. }
            | NexusPayload::DirectBranchWS { f_addr, .. }
            | NexusPayload::IndirectBranchWS { f_addr, .. }
            | NexusPayload::IndirectBranchHistoryWS { f_addr, .. } => f_addr << 1,
            // The ICT-with-sync variant carries the starting PC directly,
            // unshifted, in ckdata[0] rather than a separate f_addr field.
            NexusPayload::InCircuitTrace { ckdata, .. } => ckdata[0],
            _ => 0,
        };
        self.state.last_faddr = addr;
        self.state.current_address = addr;
        if msg.have_timestamp {
            self.state.last_time = msg.timestamp;
        }
    }

    fn dispatch_counted_message(&mut self, msg: &NexusMessage, emitted: &mut Vec<Address>) -> Result<()> {
        if msg.payload.i_cnt().is_none() {
            log::trace!(
                "core {}: {:?} carries no i_cnt; ignored in {:?}",
                self.state.core_id,
                msg.tcode,
                self.state.state
            );
            return Ok(());
        }
        load_counts(&mut self.state, msg)?;
        self.pending = Some(PendingMessage {
            payload: msg.payload.clone(),
        });
        self.state.state = RetirementState::GetNextInstruction;
        self.run_instruction_walk(emitted)
    }

    /// The `GetNextInstruction` / `RetireMessage` loop.
    fn run_instruction_walk(&mut self, emitted: &mut Vec<Address>) -> Result<()> {
        loop {
            if self.state.counts.i_cnt_remaining == 0 {
                // i_cnt == 0 is legal: the pending message retires with no
                // PC emitted. A DirectBranch
                // still needs the decode at current_address to learn its
                // target; other payload kinds ignore it.
                let decoded = self.oracle.decode(self.state.current_address)?;
                return self.retire(decoded, emitted);
            }

            let addr = self.state.current_address;
            let decoded = self.oracle.decode(addr)?;
            emitted.push(addr);

            if decoded.is_inferable_call() {
                self.state
                    .call_stack
                    .push(addr + decoded.size as u64);
            }

            self.state.counts.i_cnt_remaining -= 1;
            if self.state.counts.i_cnt_remaining > 0 {
                if decoded.class.is_conditional_branch() {
                    match self.state.counts.resolve_branch() {
                        BranchOutcome::Taken => {
                            self.state.current_address = decoded.target.ok_or(
                                ReconstructError::ImpossibleTransition(
                                    "conditional branch resolved taken but has no static target",
                                ),
                            )?;
                        }
                        BranchOutcome::NotTaken | BranchOutcome::DeferredToNextMessage => {
                            self.state.current_address = addr + decoded.size as u64;
                        }
                    }
                } else if decoded.class.is_direct_jump() {
                    self.state.current_address = decoded.target.ok_or(
                        ReconstructError::ImpossibleTransition(
                            "direct jump mid-count has no static target",
                        ),
                    )?;
                } else {
                    self.state.current_address = addr + decoded.size as u64;
                }
                continue;
            }

            return self.retire(decoded, emitted);
        }
    }

    fn retire(&mut self, decoded: nexus_oracle::DecodedInstruction, emitted: &mut Vec<Address>) -> Result<()> {
        let pending = self.pending.take().ok_or(ReconstructError::ImpossibleTransition(
            "RetireMessage reached with no pending message",
        ))?;

        match pending.payload {
            NexusPayload::DirectBranch { .. } => {
                let target = decoded.target.ok_or(ReconstructError::ImpossibleTransition(
                    "direct-branch message's retiring instruction has no static target",
                ))?;
                self.state.last_direct_branch = Some(nexus_core::DirectBranchSnapshot {
                    branch_address: decoded.address,
                    target_address: target,
                });
                self.state.current_address = target;
            }
            NexusPayload::IndirectBranch { u_addr, .. }
            | NexusPayload::IndirectBranchHistory { u_addr, .. } => {
                let new_addr = self.state.last_faddr ^ (u_addr << 1);
                if decoded.is_inferable_return() {
                    self.state.call_stack.pop_if_return(new_addr);
                }
                self.state.last_faddr = new_addr;
                self.state.current_address = new_addr;
            }
            NexusPayload::Sync { f_addr, .. }
            | NexusPayload::DirectBranchWS { f_addr, .. }
            | NexusPayload::IndirectBranchWS { f_addr, .. }
            | NexusPayload::IndirectBranchHistoryWS { f_addr, .. } => {
                let addr = f_addr << 1;
                self.state.last_faddr = addr;
                self.state.current_address = addr;
            }
            NexusPayload::Correlation { .. } => {
                self.state.state = RetirementState::GetFirstSyncMsg;
                return Ok(());
            }
            NexusPayload::ResourceFull { r_code: 0, .. } => {
                // No address change; i_cnt already loaded via load_counts.
            }
            _ => {
                return Err(ReconstructError::ImpossibleTransition(
                    "pending message type has no counted-retirement rule",
                ));
            }
        }

        self.state.state = RetirementState::GetNextMsg;
        Ok(())
    }

    /// `RepeatBranch` / `InCircuitTrace(WS)` / `TrapInfo`: these carry no
    /// `i_cnt` of their own, so they retire without an instruction walk.
    fn retire_immediate(&mut self, msg: &NexusMessage, emitted: &mut Vec<Address>) -> Result<()> {
        match &msg.payload {
            NexusPayload::RepeatBranch { b_cnt } => {
                let snap = self.state.last_direct_branch.ok_or(
                    ReconstructError::ImpossibleTransition(
                        "RepeatBranch with no preceding direct branch",
                    ),
                )?;
                for _ in 0..*b_cnt {
                    emitted.push(snap.branch_address);
                }
                self.state.current_address = snap.target_address;
            }
            NexusPayload::InCircuitTrace {
                cksrc, ckdata, ckdf, ..
            } => {
                let addr = if matches!(cksrc, IctSource::InferableCall) && *ckdf == 1 {
                    self.state.current_address ^ (ckdata[1] << 1)
                } else {
                    ckdata[0]
                };
                self.state.current_address = addr;
            }
            NexusPayload::TrapInfo { .. } => {}
            _ => {
                return Err(ReconstructError::ImpossibleTransition(
                    "retire_immediate called with an unexpected payload",
                ))
            }
        }
        Ok(())
    }
}

fn is_ws_sync_class(msg: &NexusMessage) -> bool {
    matches!(
        msg.tcode,
        TCode::Sync | TCode::DirectBranchWS | TCode::IndirectBranchWS | TCode::IndirectBranchHistoryWS
    ) || msg.tcode == TCode::InCircuitTraceWS
}

fn load_counts(state: &mut PerCoreState, msg: &NexusMessage) -> Result<()> {
    if let Some(i_cnt) = msg.payload.i_cnt() {
        state.counts.add_i_cnt(i_cnt);
    }
    match &msg.payload {
        NexusPayload::IndirectBranchHistory { history, .. }
        | NexusPayload::IndirectBranchHistoryWS { history, .. } => {
            state.counts.load_history(*history)?;
        }
        NexusPayload::Correlation {
            history: Some(h), ..
        } => {
            state.counts.load_history(*h)?;
        }
        NexusPayload::ResourceFull {
            r_code: 1,
            r_data,
            r_data_width,
        } => {
            state.counts.load_history(HistoryField {
                bits: *r_data,
                width: (*r_data_width).min(255) as u8,
            })?;
        }
        NexusPayload::ResourceFull { r_code: 9, r_data, .. } => {
            state.counts.load_taken(*r_data)?;
        }
        NexusPayload::ResourceFull { r_code: 8, r_data, .. } => {
            state.counts.load_not_taken(*r_data)?;
        }
        _ => {}
    }
    Ok(())
}
