//! Bit-level MSEO-framed Nexus 5001 trace message parser.

mod bitreader;
mod error;
mod framer;
mod grammar;

pub use bitreader::BitReader;
pub use error::ParseError;
pub use framer::{next_message, FrameResult};
pub use grammar::parse_message;

/// Outcome of pulling the next step out of the parser's internal buffer.
#[derive(Debug)]
pub enum ParserStep {
    Message(nexus_core::NexusMessage),
    /// A per-message recoverable error: the message was
    /// dropped and the parser has already resynchronized at the next END
    /// boundary. Decoding continues; call `try_next` again for the next
    /// message.
    RecoverableError(ParseError),
    /// Not enough buffered bytes yet to frame a complete message.
    NeedMoreData,
}

/// A stateful Nexus parser driven by repeatedly pushing raw bytes and
/// pulling framed, decoded messages back out.
///
/// This is the piece the stream dispatcher (`nexus-dispatch`) owns and
/// drives on its worker thread; it has no threading or I/O of its own.
pub struct Parser {
    src_bits: u32,
    buffer: Vec<u8>,
    pos: usize,
    base_offset: u64,
}

impl Parser {
    /// `src_bits` is the width of the multicore `core_id` field; `0`
    /// disables multicore decoding.
    pub fn new(src_bits: u32) -> Parser {
        Parser {
            src_bits,
            buffer: Vec::new(),
            pos: 0,
            base_offset: 0,
        }
    }

    /// Append freshly-arrived bytes to the parser's buffer.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Current byte offset in the overall input stream (for UI-split
    /// bookkeeping in the dispatcher).
    pub fn input_offset(&self) -> u64 {
        self.base_offset + self.pos as u64
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.base_offset += self.pos as u64;
            self.pos = 0;
        }
    }

    /// Attempt to produce the next parser step.
    pub fn try_next(&mut self) -> ParserStep {
        match next_message(&self.buffer, self.pos) {
            FrameResult::Incomplete => {
                self.compact();
                ParserStep::NeedMoreData
            }
            FrameResult::Message {
                bytes,
                next_pos,
                skipped_padding,
            } => {
                let offset = self.base_offset + self.pos as u64;
                let raw_bytes = bytes.to_vec();
                self.pos = next_pos;
                if skipped_padding > 0 {
                    log::warn!(
                        "resynchronized at offset {offset} after skipping {skipped_padding} padding byte(s)"
                    );
                }
                match parse_message(&raw_bytes, self.src_bits, offset) {
                    Ok(msg) => ParserStep::Message(msg),
                    Err(e) => {
                        log::warn!("dropping malformed message at offset {offset}: {e}");
                        ParserStep::RecoverableError(e)
                    }
                }
            }
        }
    }
}
