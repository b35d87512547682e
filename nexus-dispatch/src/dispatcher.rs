use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nexus_core::{Error, SessionConfig};
use nexus_oracle::InstructionOracle;
use nexus_parser::{Parser, ParserStep};
use nexus_reconstruct::Reconstructor;

use crate::byte_queue::ByteQueue;
use crate::ui_segmentation::UiSegmenter;
use crate::wire;

/// The worker's output buffer is flushed to the wire once it fills, so a
/// single session never holds more than this many samples in memory at
/// once regardless of trace length.
const OUTPUT_BUFFER_CAPACITY: usize = 128 * 1024;

/// This session always runs exactly one decode worker; its wire thread id
/// is a fixed placeholder rather than an OS thread id, since nothing on
/// the other end of the protocol distinguishes sessions by it.
const SESSION_THREAD_ID: u32 = 0;

/// Owns one decode session's worker thread: bytes pushed
/// via `push_bytes` are parsed, reconstructed into PCs per core, and
/// flushed over `transport` using the framed wire protocol. Dropping a
/// `Dispatcher` without calling `wait_for_completion` detaches the worker;
/// call `abort` first if you want it to stop promptly.
pub struct Dispatcher {
    queue: Arc<ByteQueue>,
    worker: Option<JoinHandle<Result<(), Error>>>,
}

impl Dispatcher {
    /// Spawn the worker thread. `cum_ins_cnt` is called from the worker
    /// thread itself at every UI-file segmentation boundary; it must not
    /// block on anything the caller also holds while waiting on
    /// `wait_for_completion`.
    pub fn spawn<T, F>(
        config: SessionConfig,
        oracle: Arc<InstructionOracle>,
        transport: T,
        cum_ins_cnt: F,
    ) -> Dispatcher
    where
        T: Read + Write + Send + 'static,
        F: FnMut(u64, bool) + Send + 'static,
    {
        let queue = Arc::new(ByteQueue::new());
        let worker_queue = queue.clone();
        let worker = thread::spawn(move || {
            run_worker(worker_queue, config, oracle, transport, cum_ins_cnt)
        });
        Dispatcher {
            queue,
            worker: Some(worker),
        }
    }

    pub fn push_bytes(&self, buf: &[u8]) {
        self.queue.push_bytes(buf);
    }

    pub fn set_end_of_data(&self) {
        self.queue.set_end_of_data();
    }

    /// Register an explicit UI-file flush at the given input byte offset;
    /// applied once the worker's parse position reaches it.
    pub fn add_flush_data_offset(&self, offset: u64) {
        self.queue.add_flush_data_offset(offset);
    }

    /// Request the worker stop at the next safe point. Already-buffered
    /// PCs are flushed and a final `cum_ins_cnt` pair is still emitted.
    pub fn abort(&self) {
        self.queue.abort();
    }

    /// Block until the worker thread exits, returning its terminal result.
    pub fn wait_for_completion(mut self) -> Result<(), Error> {
        match self.worker.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(Error::Err("decode worker thread panicked".to_string()))),
            None => Ok(()),
        }
    }
}

fn run_worker<T, F>(
    queue: Arc<ByteQueue>,
    config: SessionConfig,
    oracle: Arc<InstructionOracle>,
    mut transport: T,
    mut cum_ins_cnt: F,
) -> Result<(), Error>
where
    T: Read + Write,
    F: FnMut(u64, bool),
{
    wire::send_control_message(&mut transport, SESSION_THREAD_ID)?;
    wire::read_ack(&mut transport)?;

    let oracle_ref: &InstructionOracle = oracle.as_ref();
    let mut parser = Parser::new(config.src_field_size_bits);
    let mut cores: HashMap<u32, Reconstructor> = HashMap::new();
    let mut output_buffer: Vec<u64> = Vec::with_capacity(OUTPUT_BUFFER_CAPACITY);
    let mut segmenter = UiSegmenter::new(config.ui_file_split_size_bytes);
    let mut pending_flushes: VecDeque<u64> = VecDeque::new();

    loop {
        if queue.is_aborted() {
            break;
        }
        match queue.pop_all_available() {
            Some(bytes) => parser.push_bytes(&bytes),
            None => break,
        }
        pending_flushes.extend(queue.take_flush_offsets());

        loop {
            match parser.try_next() {
                ParserStep::Message(msg) => {
                    let core = cores
                        .entry(msg.core_id)
                        .or_insert_with(|| Reconstructor::new(msg.core_id, oracle_ref));
                    let pcs = core.on_message(&msg);
                    for pc in pcs {
                        output_buffer.push(pc);
                        if output_buffer.len() == output_buffer.capacity() {
                            flush_output(&mut transport, &mut output_buffer)?;
                        }
                        segmenter.on_pc_emitted(parser.input_offset(), &mut pending_flushes, &mut cum_ins_cnt);
                        // Checked per PC, not per message, so an abort during a
                        // message that walks many instructions (a large-i_cnt
                        // DirectBranch or ResourceFull) still stops promptly.
                        if queue.is_aborted() {
                            flush_output(&mut transport, &mut output_buffer)?;
                            segmenter.final_flush(&mut cum_ins_cnt);
                            return Ok(());
                        }
                    }
                }
                ParserStep::RecoverableError(_) => continue,
                ParserStep::NeedMoreData => break,
            }
        }
    }

    flush_output(&mut transport, &mut output_buffer)?;
    segmenter.final_flush(&mut cum_ins_cnt);
    Ok(())
}

fn flush_output<T: Read + Write>(transport: &mut T, buffer: &mut Vec<u64>) -> Result<(), Error> {
    if buffer.is_empty() {
        return Ok(());
    }
    let byte_count = (buffer.len() * 8) as u32;
    wire::write_length_frame(transport, byte_count)?;
    wire::read_ack(transport)?;
    wire::write_raw_samples(transport, buffer)?;
    wire::read_ack(transport)?;
    buffer.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::{PathRewrite, PathStyle, Section, SectionFlags, Symbol, SymbolFlags};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// A transport that auto-ACKs every frame it's asked to write, backed
    /// by an in-memory buffer so the dispatcher's own writes can be
    /// inspected afterward.
    struct LoopbackTransport {
        ack_source: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl LoopbackTransport {
        fn new(ack_count: usize) -> LoopbackTransport {
            let mut acks = Vec::new();
            for _ in 0..ack_count {
                wire::write_frame(&mut acks, wire::MSG_TYPE_RESPONSE, wire::OPCODE_BULK_WRITE, &wire::ACK_LITERAL.to_be_bytes()).unwrap();
            }
            LoopbackTransport {
                ack_source: Cursor::new(acks),
                written: Vec::new(),
            }
        }
    }

    impl Read for LoopbackTransport {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.ack_source.read(buf)
        }
    }

    impl Write for LoopbackTransport {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn tiny_oracle() -> InstructionOracle {
        let code = vec![0x0013u16, 0x0000u16]; // addi x0,x0,0 as two halfwords
        let section = Section::new(
            0x1000,
            0x1004,
            SectionFlags::EXEC,
            code,
            vec![String::new(); 2],
            vec![None; 2],
            vec![None; 2],
        );
        InstructionOracle::new(
            vec![section],
            vec![Symbol {
                name: "f".to_string(),
                address: 0x1000,
                size: 4,
                flags: SymbolFlags::FUNC,
                section: Some(0),
                src_file: None,
            }],
            PathRewrite::default(),
            PathStyle::Unix,
        )
    }

    #[test]
    fn worker_exits_cleanly_on_end_of_data_with_no_bytes() {
        let oracle = Arc::new(tiny_oracle());
        let config = SessionConfig {
            ui_file_split_size_bytes: 8192,
            ..SessionConfig::default()
        };
        // Control message ACK only; no data is ever pushed.
        let transport = LoopbackTransport::new(1);
        let calls: Arc<Mutex<Vec<(u64, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = calls.clone();
        let dispatcher = Dispatcher::spawn(config, oracle, transport, move |count, empty| {
            calls_clone.lock().unwrap().push((count, empty));
        });
        dispatcher.set_end_of_data();
        dispatcher.wait_for_completion().unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![(0, false), (0, true)]);
    }

    #[test]
    fn abort_stops_the_worker_and_still_flushes() {
        let oracle = Arc::new(tiny_oracle());
        let config = SessionConfig::default();
        let transport = LoopbackTransport::new(1);
        let calls: Arc<Mutex<Vec<(u64, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = calls.clone();
        let dispatcher = Dispatcher::spawn(config, oracle, transport, move |count, empty| {
            calls_clone.lock().unwrap().push((count, empty));
        });
        dispatcher.abort();
        dispatcher.wait_for_completion().unwrap();
    }
}
