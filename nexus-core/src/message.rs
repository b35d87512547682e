use crate::{Address, Timestamp};

/// Discriminator of a Nexus message, 6 bits wide on the wire.
///
/// Numeric discriminants match the historical Nexus/IEEE-ISTO 5001 TCode
/// assignments used by the reference SiFive decoder, so that a captured
/// byte stream round-trips against real hardware traces. TCodes the
/// reconstruction state machine never acts on (`DeviceId`, `DataWrite`,
/// `Watchpoint`, the port-replacement and extra aux-access variants, ...)
/// are still recognized by the parser and carried through as
/// [`NexusPayload::Inert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TCode {
    DebugStatus = 0,
    DeviceId = 1,
    OwnershipTrace = 2,
    DirectBranch = 3,
    IndirectBranch = 4,
    DataWrite = 5,
    DataRead = 6,
    DataAcquisition = 7,
    Error = 8,
    Sync = 9,
    /// `TCODE_CORRECTION` in the reference decoder: a dead encoding the
    /// reference decoder never assigns a grammar or state transition to.
    /// Distinct from `CorrelationEvent` (33), the real correlation TCode.
    Correlation = 10,
    DirectBranchWS = 11,
    IndirectBranchWS = 12,
    DataWriteWS = 13,
    DataReadWS = 14,
    Watchpoint = 15,
    OutputPortReplacement = 20,
    InputPortReplacement = 21,
    AuxAccessRead = 22,
    AuxAccessWrite = 23,
    AuxAccessReadNext = 24,
    AuxAccessWriteNext = 25,
    AuxAccessResponse = 26,
    ResourceFull = 27,
    IndirectBranchHistory = 28,
    IndirectBranchHistoryWS = 29,
    RepeatBranch = 30,
    RepeatInstruction = 31,
    RepeatInstructionWS = 32,
    // Note: the reference decoder's `TCODE_CORRELATION = 33` collides in
    // name with `TCODE_CORRECTION = 10`; the `Correlation` variant
    // (evcode/cdf/i_cnt[/history]) is the `33` encoding, matched here.
    CorrelationEvent = 33,
    InCircuitTrace = 34,
    InCircuitTraceWS = 35,
    TrapInfo = 36,
}

impl TCode {
    /// Decode a raw 6-bit TCode value. Returns `None` for any value the
    /// reference decoder never assigned, which the parser reports as a
    /// per-message recoverable `UnknownTCode` error.
    pub fn from_raw(raw: u8) -> Option<TCode> {
        use TCode::*;
        Some(match raw {
            0 => DebugStatus,
            1 => DeviceId,
            2 => OwnershipTrace,
            3 => DirectBranch,
            4 => IndirectBranch,
            5 => DataWrite,
            6 => DataRead,
            7 => DataAcquisition,
            8 => Error,
            9 => Sync,
            10 => Correlation,
            11 => DirectBranchWS,
            12 => IndirectBranchWS,
            13 => DataWriteWS,
            14 => DataReadWS,
            15 => Watchpoint,
            20 => OutputPortReplacement,
            21 => InputPortReplacement,
            22 => AuxAccessRead,
            23 => AuxAccessWrite,
            24 => AuxAccessReadNext,
            25 => AuxAccessWriteNext,
            26 => AuxAccessResponse,
            27 => ResourceFull,
            28 => IndirectBranchHistory,
            29 => IndirectBranchHistoryWS,
            30 => RepeatBranch,
            31 => RepeatInstruction,
            32 => RepeatInstructionWS,
            33 => CorrelationEvent,
            34 => InCircuitTrace,
            35 => InCircuitTraceWS,
            36 => TrapInfo,
            _ => return None,
        })
    }

    /// Whether the state machine assigns live PC-reconstruction semantics
    /// to this TCode. The remaining (historical / never-wired) TCodes are
    /// parsed but carried as [`NexusPayload::Inert`].
    pub fn is_load_bearing(self) -> bool {
        !matches!(
            self,
            TCode::DebugStatus
                | TCode::DeviceId
                | TCode::DataWrite
                | TCode::DataRead
                | TCode::DataWriteWS
                | TCode::DataReadWS
                | TCode::Watchpoint
                | TCode::OutputPortReplacement
                | TCode::InputPortReplacement
                | TCode::AuxAccessRead
                | TCode::AuxAccessReadNext
                | TCode::AuxAccessWriteNext
                | TCode::AuxAccessResponse
                | TCode::RepeatInstruction
                | TCode::RepeatInstructionWS
                | TCode::Correlation
        )
    }
}

/// Indirect-branch classification (`b_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BType {
    Indirect,
    Exception,
    Hardware,
}

impl BType {
    pub fn from_raw(raw: u8) -> BType {
        match raw {
            1 => BType::Exception,
            2 => BType::Hardware,
            _ => BType::Indirect,
        }
    }
}

/// Reason a Sync-class message was emitted (`reason`, 4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    ExternalTrigger,
    ExitReset,
    TCountMatch,
    ExitDebug,
    ICountOverflow,
    TraceEnable,
    Watchpoint,
    FifoOverrun,
    ExitPowerdown,
    MessageContention,
    Other(u8),
}

impl SyncReason {
    pub fn from_raw(raw: u8) -> SyncReason {
        match raw {
            0 => SyncReason::ExternalTrigger,
            1 => SyncReason::ExitReset,
            2 => SyncReason::TCountMatch,
            3 => SyncReason::ExitDebug,
            4 => SyncReason::ICountOverflow,
            5 => SyncReason::TraceEnable,
            6 => SyncReason::Watchpoint,
            7 => SyncReason::FifoOverrun,
            9 => SyncReason::ExitPowerdown,
            11 => SyncReason::MessageContention,
            other => SyncReason::Other(other),
        }
    }
}

/// In-Circuit-Trace event source (`cksrc`, 4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IctSource {
    ExtTrigger,
    Watchpoint,
    InferableCall,
    Exception,
    Interrupt,
    Context,
    PcSample,
    Control,
    Other(u8),
}

impl IctSource {
    pub fn from_raw(raw: u8) -> IctSource {
        match raw {
            0 => IctSource::ExtTrigger,
            1 => IctSource::Watchpoint,
            2 => IctSource::InferableCall,
            3 => IctSource::Exception,
            4 => IctSource::Interrupt,
            5 => IctSource::Context,
            6 => IctSource::PcSample,
            7 => IctSource::Control,
            other => IctSource::Other(other),
        }
    }
}

/// A raw history bit-vector as assembled by the parser: `bits` holds the
/// value right-aligned, `width` is the number of bits the `var()` field
/// actually produced, including the terminating stop bit at the MSB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryField {
    pub bits: u64,
    pub width: u8,
}

/// The payload fields specific to one TCode, per the per-TCode grammar
/// table. Variants the state machine does not assign address-producing
/// semantics to collapse into `Inert`.
#[derive(Debug, Clone, PartialEq)]
pub enum NexusPayload {
    DirectBranch {
        i_cnt: u64,
    },
    IndirectBranch {
        b_type: BType,
        i_cnt: u64,
        u_addr: u64,
    },
    Sync {
        reason: SyncReason,
        i_cnt: u64,
        f_addr: Address,
    },
    DirectBranchWS {
        reason: SyncReason,
        i_cnt: u64,
        f_addr: Address,
    },
    IndirectBranchWS {
        reason: SyncReason,
        b_type: BType,
        i_cnt: u64,
        f_addr: Address,
    },
    IndirectBranchHistory {
        b_type: BType,
        i_cnt: u64,
        u_addr: u64,
        history: HistoryField,
    },
    IndirectBranchHistoryWS {
        reason: SyncReason,
        b_type: BType,
        i_cnt: u64,
        f_addr: Address,
        history: HistoryField,
    },
    ResourceFull {
        r_code: u8,
        r_data: u64,
        /// Width in bits `r_data` was parsed with; needed to locate the
        /// history stop bit when `r_code == 1`.
        r_data_width: u32,
    },
    Correlation {
        evcode: u8,
        cdf: u8,
        i_cnt: u64,
        history: Option<HistoryField>,
    },
    RepeatBranch {
        b_cnt: u64,
    },
    InCircuitTrace {
        cksrc: IctSource,
        ckdf: u8,
        ckdata: [u64; 2],
        with_sync: bool,
    },
    DataAcquisition {
        id_tag: u64,
        data: u64,
    },
    AuxAccessWrite {
        addr: u64,
        data: u64,
    },
    OwnershipTrace {
        process: u64,
    },
    ErrorReport {
        etype: u8,
    },
    TrapInfo {
        trap_value: u64,
    },
    /// A recognized-but-not-load-bearing TCode (historical or unused by the
    /// state machine). Carries no address-producing effect.
    Inert,
}

impl NexusPayload {
    /// The `i_cnt` this payload carries, if any.
    pub fn i_cnt(&self) -> Option<u64> {
        match self {
            NexusPayload::DirectBranch { i_cnt }
            | NexusPayload::IndirectBranch { i_cnt, .. }
            | NexusPayload::Sync { i_cnt, .. }
            | NexusPayload::DirectBranchWS { i_cnt, .. }
            | NexusPayload::IndirectBranchWS { i_cnt, .. }
            | NexusPayload::IndirectBranchHistory { i_cnt, .. }
            | NexusPayload::IndirectBranchHistoryWS { i_cnt, .. }
            | NexusPayload::Correlation { i_cnt, .. } => Some(*i_cnt),
            NexusPayload::ResourceFull { r_code: 0, r_data, .. } => Some(*r_data),
            _ => None,
        }
    }
}

/// A fully-parsed Nexus message.
#[derive(Debug, Clone, PartialEq)]
pub struct NexusMessage {
    pub tcode: TCode,
    pub core_id: u32,
    /// Byte offset of the first framing byte of this message in the input
    /// stream, for diagnostics and UI-split bookkeeping.
    pub offset: u64,
    /// The raw framed bytes (MSEO bits included), kept for diagnostics.
    pub raw: Vec<u8>,
    pub have_timestamp: bool,
    pub timestamp: Timestamp,
    pub payload: NexusPayload,
}
