use std::collections::VecDeque;

/// Tracks UI-file segmentation boundaries and reports, via
/// the `cum_ins_cnt(count, is_empty_file)` callback shape, how many PCs to
/// attribute to each segment.
///
/// * A natural threshold crossing makes one call: `(count, false)`.
/// * An explicit flush at a nonzero offset makes two calls with the same
///   count: `(count, false)` then `(count, true)`, and re-anchors the next
///   natural boundary at `offset + threshold`.
/// * An explicit flush at offset zero makes a single call: `(count, false)`.
/// * The final flush at end-of-stream always makes both calls.
pub struct UiSegmenter {
    threshold: u64,
    next_natural_boundary: u64,
    count_since_last: u64,
}

impl UiSegmenter {
    pub fn new(threshold: u64) -> UiSegmenter {
        UiSegmenter {
            threshold,
            next_natural_boundary: threshold,
            count_since_last: 0,
        }
    }

    /// Call once per PC retired, after updating the parser's input offset.
    /// `pending_flushes` is a FIFO of explicit offsets registered by the
    /// caller (via `Dispatcher::add_flush_data_offset`) not yet applied;
    /// entries at or below `input_offset` are consumed in order.
    pub fn on_pc_emitted(
        &mut self,
        input_offset: u64,
        pending_flushes: &mut VecDeque<u64>,
        emit: &mut dyn FnMut(u64, bool),
    ) {
        self.count_since_last += 1;

        while let Some(&next) = pending_flushes.front() {
            if input_offset < next {
                break;
            }
            pending_flushes.pop_front();
            self.explicit_flush(next, emit);
        }

        if self.threshold > 0 {
            while input_offset >= self.next_natural_boundary {
                emit(self.count_since_last, false);
                self.count_since_last = 0;
                self.next_natural_boundary += self.threshold;
            }
        }
    }

    fn explicit_flush(&mut self, offset: u64, emit: &mut dyn FnMut(u64, bool)) {
        emit(self.count_since_last, false);
        if offset != 0 {
            emit(self.count_since_last, true);
            self.next_natural_boundary = offset + self.threshold;
        }
        self.count_since_last = 0;
    }

    /// End-of-stream flush: always both calls, even if nothing was emitted
    /// since the last boundary.
    pub fn final_flush(&mut self, emit: &mut dyn FnMut(u64, bool)) {
        emit(self.count_since_last, false);
        emit(self.count_since_last, true);
        self.count_since_last = 0;
    }
}
