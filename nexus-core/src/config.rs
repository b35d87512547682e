use serde::{Deserialize, Serialize};

/// PC text-formatting flags. Loading these from a config file or CLI is
/// out of scope for this crate; this is only the data shape an embedder
/// fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrDispFlags {
    pub auto_width: bool,
    pub separator: bool,
}

impl Default for AddrDispFlags {
    fn default() -> Self {
        AddrDispFlags {
            auto_width: true,
            separator: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchSize {
    Bits32,
    Bits64,
    FromElf,
}

impl Default for ArchSize {
    fn default() -> Self {
        ArchSize::FromElf
    }
}

/// Branch-resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceType {
    /// Branch Trace Message: only taken branches are reported explicitly.
    Btm,
    /// Historgram/History Trace Message: history bit-vectors are used.
    Htm,
}

impl Default for TraceType {
    fn default() -> Self {
        TraceType::Btm
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStyle {
    Unix,
    Windows,
}

impl Default for PathStyle {
    fn default() -> Self {
        PathStyle::Unix
    }
}

/// A configurable path rewrite applied before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewrite {
    pub cut_prefix: Option<String>,
    pub new_root: Option<String>,
}

/// Every input the parser, state machine, oracle, and dispatcher need at
/// session start. This is plain data: nothing in this crate, or any crate
/// in this workspace, parses it from a file, environment, or CLI — that
/// remains the embedder's responsibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub num_addr_bits: Option<u32>,
    pub addr_disp_flags: AddrDispFlags,
    pub arch_size: ArchSize,
    pub ts_size_bits: u32,
    pub ts_freq_hz: u64,
    pub src_field_size_bits: u32,
    pub trace_type: TraceType,
    pub cycle_accurate_type: bool,
    pub itc_print_options: Option<String>,
    pub itc_print_channel: Option<u32>,
    pub port_no: u16,
    pub ui_file_split_size_bytes: u64,
    pub path_rewrite: PathRewrite,
    pub path_style: PathStyle,
}
