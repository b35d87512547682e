use nexus_core::{
    BType, DirectBranchSnapshot, HistoryField, IctSource, NexusMessage, NexusPayload, PathRewrite,
    PathStyle, RetirementState, Section, SectionFlags, SyncReason, Symbol, TCode,
};
use nexus_oracle::InstructionOracle;
use nexus_reconstruct::Reconstructor;

fn msg(tcode: TCode, payload: NexusPayload) -> NexusMessage {
    NexusMessage {
        tcode,
        core_id: 0,
        offset: 0,
        raw: Vec::new(),
        have_timestamp: false,
        timestamp: 0,
        payload,
    }
}

// addi x0, x0, 0 — a plain non-branch 32-bit instruction.
const ADDI_NOP: u32 = 0x0000_0013;
// beq x0, x0, +16 (B-type, funct3=0, imm4_1 field = 8).
const BEQ_PLUS16: u32 = 0x0000_0863;
// jalr x0, x0, 0 — an indirect jump whose target is message-supplied.
const JALR_X0_X0: u32 = 0x0000_0067;

fn halfwords(words: &[u32]) -> Vec<u16> {
    let mut out = Vec::with_capacity(words.len() * 2);
    for w in words {
        out.push((*w & 0xFFFF) as u16);
        out.push((*w >> 16) as u16);
    }
    out
}

fn oracle_with(start: u64, words: &[u32]) -> InstructionOracle {
    let code = halfwords(words);
    let n = code.len();
    let section = Section::new(
        start,
        start + (n as u64) * 2,
        SectionFlags::EXEC,
        code,
        vec![String::new(); n],
        vec![None; n],
        vec![None; n],
    );
    InstructionOracle::new(
        vec![section],
        vec![Symbol {
            name: "test_fn".to_string(),
            address: start,
            size: (n as u64) * 2,
            flags: nexus_core::SymbolFlags::FUNC,
            section: Some(0),
            src_file: None,
        }],
        PathRewrite::default(),
        PathStyle::Unix,
    )
}

/// Sync then DirectBranch (i_cnt=3) over `addi; addi; beq
/// +16`.
#[test]
fn s1_sync_then_direct_branch() {
    let oracle = oracle_with(0x8000_1000, &[ADDI_NOP, ADDI_NOP, BEQ_PLUS16]);
    let mut r = Reconstructor::new(0, &oracle);

    let sync = msg(
        TCode::Sync,
        NexusPayload::Sync {
            reason: SyncReason::ExternalTrigger,
            i_cnt: 0,
            f_addr: 0x8000_1000 >> 1,
        },
    );
    assert!(r.on_message(&sync).is_empty());
    assert_eq!(r.state.state, RetirementState::GetSecondMsg);
    assert_eq!(r.state.current_address, 0x8000_1000);

    let branch = msg(TCode::DirectBranch, NexusPayload::DirectBranch { i_cnt: 3 });
    let pcs = r.on_message(&branch);
    assert_eq!(pcs, vec![0x8000_1000, 0x8000_1004, 0x8000_1008]);
    assert_eq!(r.state.current_address, 0x8000_1018);
    assert_eq!(r.state.state, RetirementState::GetNextMsg);
}

/// IndirectBranch XORs `last_faddr` with `u_addr << 1`.
#[test]
fn s2_indirect_branch_xor() {
    let oracle = oracle_with(0x8000_0000, &[JALR_X0_X0]);
    let mut r = Reconstructor::new(0, &oracle);
    r.state.last_faddr = 0x8000_0000;
    r.state.current_address = 0x8000_0000;
    r.state.state = RetirementState::GetNextMsg;

    let indirect = msg(
        TCode::IndirectBranch,
        NexusPayload::IndirectBranch {
            b_type: BType::Indirect,
            i_cnt: 1,
            u_addr: 0x0000_0800,
        },
    );
    let pcs = r.on_message(&indirect);
    assert_eq!(pcs, vec![0x8000_0000]);
    assert_eq!(r.state.current_address, 0x8000_1000);
    assert_eq!(r.state.last_faddr, 0x8000_1000);
}

/// A mid-count conditional branch resolves via a
/// history bit (not-taken -> fall through), then the second instruction's
/// retirement applies the pending message's own address effect.
#[test]
fn s3_history_resolves_mid_count_branch() {
    let oracle = oracle_with(0x2000, &[BEQ_PLUS16, ADDI_NOP]);
    let mut r = Reconstructor::new(0, &oracle);
    r.state.last_faddr = 0x3000;
    r.state.current_address = 0x2000;
    r.state.state = RetirementState::GetNextMsg;

    let history_msg = msg(
        TCode::IndirectBranchHistory,
        NexusPayload::IndirectBranchHistory {
            b_type: BType::Indirect,
            i_cnt: 2,
            u_addr: 0,
            history: HistoryField { bits: 0b10, width: 2 }, // single outcome: not-taken
        },
    );
    let pcs = r.on_message(&history_msg);
    assert_eq!(pcs, vec![0x2000, 0x2004]);
    assert_eq!(r.state.current_address, 0x3000);
}

/// i_cnt == 0 is legal and produces immediate retirement with no PC
/// emission.
#[test]
fn zero_i_cnt_retires_with_no_emission() {
    let oracle = oracle_with(0x4000, &[JALR_X0_X0]);
    let mut r = Reconstructor::new(0, &oracle);
    r.state.last_faddr = 0x4000;
    r.state.current_address = 0x4000;
    r.state.state = RetirementState::GetNextMsg;

    let indirect = msg(
        TCode::IndirectBranch,
        NexusPayload::IndirectBranch {
            b_type: BType::Indirect,
            i_cnt: 0,
            u_addr: 0x100,
        },
    );
    let pcs = r.on_message(&indirect);
    assert!(pcs.is_empty());
    assert_eq!(r.state.current_address, 0x4000 ^ 0x200);
}

/// RepeatBranch replays the previous direct-branch target `b_cnt` times
/// without consuming a fresh i_cnt.
#[test]
fn repeat_branch_replays_previous_direct_branch() {
    let oracle = oracle_with(0x8000_1000, &[ADDI_NOP, ADDI_NOP, BEQ_PLUS16]);
    let mut r = Reconstructor::new(0, &oracle);
    r.state.current_address = 0x8000_1000;
    r.state.state = RetirementState::GetNextMsg;
    r.state.last_direct_branch = Some(DirectBranchSnapshot {
        branch_address: 0x8000_1008,
        target_address: 0x8000_1018,
    });

    let repeat = msg(TCode::RepeatBranch, NexusPayload::RepeatBranch { b_cnt: 2 });
    let pcs = r.on_message(&repeat);
    assert_eq!(pcs, vec![0x8000_1008, 0x8000_1008]);
    assert_eq!(r.state.current_address, 0x8000_1018);
}

/// CorrelationEvent (TCode 33) retires by ending the trace temporarily: no
/// address change, state returns to `GetFirstSyncMsg`. TCode 10 is a
/// distinct, dead encoding (`TCODE_CORRECTION` in the reference decoder)
/// and never produces a `NexusPayload::Correlation` payload at all; see
/// the parser's grammar for that split.
#[test]
fn correlation_returns_to_get_first_sync_msg() {
    let oracle = oracle_with(0x5000, &[ADDI_NOP]);
    let mut r = Reconstructor::new(0, &oracle);
    r.state.current_address = 0x5000;
    r.state.state = RetirementState::GetNextMsg;

    let correlation = msg(
        TCode::CorrelationEvent,
        NexusPayload::Correlation {
            evcode: 0,
            cdf: 0,
            i_cnt: 1,
            history: None,
        },
    );
    let pcs = r.on_message(&correlation);
    assert_eq!(pcs, vec![0x5000]);
    assert_eq!(r.state.current_address, 0x5000);
    assert_eq!(r.state.state, RetirementState::GetFirstSyncMsg);
}

/// InCircuitTrace with InferableCall and ckdf==1 computes the destination
/// via XOR against the current address rather than taking ckdata[0] raw.
#[test]
fn in_circuit_trace_inferable_call_xors_current_address() {
    let oracle = oracle_with(0x6000, &[ADDI_NOP]);
    let mut r = Reconstructor::new(0, &oracle);
    r.state.current_address = 0x6000;
    r.state.state = RetirementState::GetNextMsg;

    let ict = msg(
        TCode::InCircuitTrace,
        NexusPayload::InCircuitTrace {
            cksrc: IctSource::InferableCall,
            ckdf: 1,
            ckdata: [0, 0x100],
            with_sync: false,
        },
    );
    let pcs = r.on_message(&ict);
    assert!(pcs.is_empty());
    assert_eq!(r.state.current_address, 0x6000 ^ 0x200);
}

/// A per-core reconstruction error (address with no mapped section)
/// terminates that core only; subsequent messages are quietly ignored
/// rather than panicking.
#[test]
fn decode_failure_stops_the_core_without_panicking() {
    let oracle = oracle_with(0x7000, &[ADDI_NOP]);
    let mut r = Reconstructor::new(0, &oracle);
    r.state.current_address = 0xDEAD_0000; // not mapped by any section
    r.state.state = RetirementState::GetNextMsg;

    let branch = msg(TCode::DirectBranch, NexusPayload::DirectBranch { i_cnt: 1 });
    let pcs = r.on_message(&branch);
    assert!(pcs.is_empty());
    assert_eq!(r.state.state, RetirementState::Error);

    // Further messages are no-ops, not panics.
    let another = msg(TCode::DirectBranch, NexusPayload::DirectBranch { i_cnt: 1 });
    assert!(r.on_message(&another).is_empty());
}
