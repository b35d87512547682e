use crate::error::CoreError;
use crate::message::HistoryField;

/// A consumable branch-history bit-vector. `bits` is stored MSB-first order
/// with the stop bit already stripped off at construction time, so
/// `consume()` simply walks the vector front-to-back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryBits {
    outcomes: Vec<bool>,
    pos: usize,
}

impl HistoryBits {
    /// Build from a raw parsed history field. The field's MSB is a
    /// terminating stop bit and is not itself an outcome.
    pub fn from_field(field: HistoryField) -> HistoryBits {
        let n_outcomes = field.width.saturating_sub(1) as usize;
        let mut outcomes = Vec::with_capacity(n_outcomes);
        for i in 0..n_outcomes {
            let shift = field.width as u32 - 2 - i as u32;
            outcomes.push((field.bits >> shift) & 1 != 0);
        }
        HistoryBits { outcomes, pos: 0 }
    }

    /// Pop the next outcome from the MSB side. `true` = taken.
    pub fn consume(&mut self) -> Option<bool> {
        let bit = self.outcomes.get(self.pos).copied();
        if bit.is_some() {
            self.pos += 1;
        }
        bit
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.outcomes.len()
    }
}

/// The result of resolving one conditional-branch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOutcome {
    Taken,
    NotTaken,
    /// No count source had an answer; resolution is deferred to the next
    /// branch message that arrives (`i_cnt`-only case).
    DeferredToNextMessage,
}

/// Pending decode credits consumed by subsequent instructions.
///
/// At most one of `history` / `taken_count` / `not_taken_count` may be live
/// at a time; attempting to load a second while one is already set is a
/// decode error.
#[derive(Debug, Clone, Default)]
pub struct Counts {
    pub i_cnt_remaining: u64,
    history: Option<HistoryBits>,
    taken_count: u64,
    not_taken_count: u64,
}

impl Counts {
    pub fn new() -> Counts {
        Counts::default()
    }

    pub fn add_i_cnt(&mut self, n: u64) {
        self.i_cnt_remaining += n;
    }

    fn other_count_source_live(&self, skip_history: bool, skip_taken: bool, skip_not_taken: bool) -> bool {
        (!skip_history && self.history.is_some())
            || (!skip_taken && self.taken_count > 0)
            || (!skip_not_taken && self.not_taken_count > 0)
    }

    pub fn load_history(&mut self, field: HistoryField) -> Result<(), CoreError> {
        if self.other_count_source_live(true, false, false) {
            return Err(CoreError::MultipleLiveCountSources);
        }
        self.history = Some(HistoryBits::from_field(field));
        Ok(())
    }

    pub fn load_taken(&mut self, n: u64) -> Result<(), CoreError> {
        if self.other_count_source_live(false, true, false) {
            return Err(CoreError::MultipleLiveCountSources);
        }
        self.taken_count = n;
        Ok(())
    }

    pub fn load_not_taken(&mut self, n: u64) -> Result<(), CoreError> {
        if self.other_count_source_live(false, false, true) {
            return Err(CoreError::MultipleLiveCountSources);
        }
        self.not_taken_count = n;
        Ok(())
    }

    /// Resolve one conditional-branch outcome, consuming from whichever
    /// source is live in priority order: history > taken > not-taken > i_cnt.
    pub fn resolve_branch(&mut self) -> BranchOutcome {
        if let Some(history) = &mut self.history {
            if let Some(taken) = history.consume() {
                if history.is_exhausted() {
                    self.history = None;
                }
                return if taken {
                    BranchOutcome::Taken
                } else {
                    BranchOutcome::NotTaken
                };
            }
            self.history = None;
        }
        if self.taken_count > 0 {
            self.taken_count -= 1;
            return BranchOutcome::Taken;
        }
        if self.not_taken_count > 0 {
            self.not_taken_count -= 1;
            return BranchOutcome::NotTaken;
        }
        BranchOutcome::DeferredToNextMessage
    }

    pub fn has_live_count_source(&self) -> bool {
        self.history.is_some() || self.taken_count > 0 || self.not_taken_count > 0
    }
}
