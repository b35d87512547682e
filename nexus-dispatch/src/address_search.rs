//! Optional address-search companion thread: an independent
//! decode pass over its own byte deque that looks for the first retired PC
//! within `[addr_start, addr_end)`, reporting the UI-file segment it fell
//! in rather than a raw byte offset. Shares no mutable state with the
//! session's emitting worker beyond the oracle it decodes against.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use nexus_core::Address;
use nexus_oracle::InstructionOracle;
use nexus_parser::{Parser, ParserStep};
use nexus_reconstruct::Reconstructor;

use crate::byte_queue::ByteQueue;

/// Where a search starts or must stop: a UI-file index plus an instruction
/// position within it, mirroring the bookkeeping `UiSegmenter` produces for
/// the main worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiPosition {
    pub ui_idx: u64,
    pub ins_pos: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(UiPosition),
    NotFound,
    /// The stop position was reached before any match.
    StoppedAtBound,
}

struct SearchState {
    outcome: Option<SearchOutcome>,
}

/// An independent decode pass searching for the first PC in
/// `[addr_start, addr_end)`, starting at `start` and giving up at `stop`.
pub struct AddressSearch {
    queue: Arc<ByteQueue>,
    result: Arc<Mutex<SearchState>>,
    worker: Option<JoinHandle<()>>,
}

impl AddressSearch {
    pub fn spawn(
        oracle: Arc<InstructionOracle>,
        src_field_size_bits: u32,
        ui_file_split_size_bytes: u64,
        addr_start: Address,
        addr_end: Address,
        start: UiPosition,
        stop: UiPosition,
    ) -> AddressSearch {
        let queue = Arc::new(ByteQueue::new());
        let result = Arc::new(Mutex::new(SearchState { outcome: None }));
        let worker_queue = queue.clone();
        let worker_result = result.clone();
        let worker = thread::spawn(move || {
            let outcome = run_search(
                worker_queue,
                oracle,
                src_field_size_bits,
                ui_file_split_size_bytes,
                addr_start,
                addr_end,
                start,
                stop,
            );
            worker_result.lock().unwrap().outcome = Some(outcome);
        });
        AddressSearch {
            queue,
            result,
            worker: Some(worker),
        }
    }

    pub fn push_bytes(&self, buf: &[u8]) {
        self.queue.push_bytes(buf);
    }

    pub fn set_end_of_data(&self) {
        self.queue.set_end_of_data();
    }

    pub fn abort(&self) {
        self.queue.abort();
    }

    /// Non-blocking poll; `None` while the search is still running.
    pub fn poll(&self) -> Option<SearchOutcome> {
        self.result.lock().unwrap().outcome
    }

    pub fn wait_for_completion(mut self) -> SearchOutcome {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.result
            .lock()
            .unwrap()
            .outcome
            .unwrap_or(SearchOutcome::NotFound)
    }
}

fn run_search(
    queue: Arc<ByteQueue>,
    oracle: Arc<InstructionOracle>,
    src_field_size_bits: u32,
    ui_file_split_size_bytes: u64,
    addr_start: Address,
    addr_end: Address,
    start: UiPosition,
    stop: UiPosition,
) -> SearchOutcome {
    let oracle_ref: &InstructionOracle = oracle.as_ref();
    let mut parser = Parser::new(src_field_size_bits);
    let mut cores: HashMap<u32, Reconstructor> = HashMap::new();
    let mut pos = UiPosition { ui_idx: 0, ins_pos: 0 };

    let threshold = ui_file_split_size_bytes.max(1);

    loop {
        if queue.is_aborted() {
            return SearchOutcome::NotFound;
        }
        let bytes = match queue.pop_all_available() {
            Some(b) => b,
            None => return SearchOutcome::NotFound,
        };
        parser.push_bytes(&bytes);

        loop {
            match parser.try_next() {
                ParserStep::Message(msg) => {
                    let core = cores
                        .entry(msg.core_id)
                        .or_insert_with(|| Reconstructor::new(msg.core_id, oracle_ref));
                    for pc in core.on_message(&msg) {
                        if before(pos, start) {
                            advance(&mut pos, parser.input_offset(), threshold);
                            continue;
                        }
                        if at_or_past(pos, stop) {
                            return SearchOutcome::StoppedAtBound;
                        }
                        if pc >= addr_start && pc < addr_end {
                            return SearchOutcome::Found(pos);
                        }
                        advance(&mut pos, parser.input_offset(), threshold);
                    }
                }
                ParserStep::RecoverableError(_) => continue,
                ParserStep::NeedMoreData => break,
            }
        }
    }
}

fn before(pos: UiPosition, bound: UiPosition) -> bool {
    (pos.ui_idx, pos.ins_pos) < (bound.ui_idx, bound.ins_pos)
}

fn at_or_past(pos: UiPosition, bound: UiPosition) -> bool {
    (pos.ui_idx, pos.ins_pos) >= (bound.ui_idx, bound.ins_pos)
}

fn advance(pos: &mut UiPosition, input_offset: u64, threshold: u64) {
    pos.ins_pos += 1;
    if input_offset >= (pos.ui_idx + 1) * threshold {
        pos.ui_idx += 1;
        pos.ins_pos = 0;
    }
}
