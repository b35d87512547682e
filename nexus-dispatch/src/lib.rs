//! Threaded stream dispatcher: owns a session's worker
//! thread, draining a mutex-guarded byte deque through
//! [`nexus_parser::Parser`] and one [`nexus_reconstruct::Reconstructor`]
//! per traced core, flushing retired PCs over the session's big-endian
//! wire protocol and driving UI-file segmentation bookkeeping.
//!
//! Cancellation follows the pattern in `samply`'s Linux profiler: an
//! `AtomicBool` the worker checks at its suspension points, flipped by
//! `Dispatcher::abort` from any thread.

mod address_search;
mod byte_queue;
mod dispatcher;
mod ui_segmentation;
mod wire;

pub use address_search::{AddressSearch, SearchOutcome, UiPosition};
pub use dispatcher::Dispatcher;
pub use ui_segmentation::UiSegmenter;
pub use wire::{
    ack_frame_bytes, ACK_LITERAL, MSG_TYPE_INTERNAL, MSG_TYPE_RESPONSE, OPCODE_BULK_WRITE, PROTOCOL_VERSION,
};
