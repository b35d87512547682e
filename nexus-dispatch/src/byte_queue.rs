use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// The mutex-guarded byte deque a decode session's worker thread drains.
/// Producers call `push_bytes` from whatever thread is
/// receiving trace data; the worker suspends on the condvar only when the
/// deque is empty and neither end-of-data nor abort has been signaled.
pub struct ByteQueue {
    bytes: Mutex<VecDeque<u8>>,
    not_empty: Condvar,
    end_of_data: AtomicBool,
    abort: AtomicBool,
    flush_offsets: Mutex<VecDeque<u64>>,
}

impl ByteQueue {
    pub fn new() -> ByteQueue {
        ByteQueue {
            bytes: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            end_of_data: AtomicBool::new(false),
            abort: AtomicBool::new(false),
            flush_offsets: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_bytes(&self, buf: &[u8]) {
        let mut guard = self.bytes.lock().unwrap();
        guard.extend(buf.iter().copied());
        self.not_empty.notify_one();
    }

    pub fn set_end_of_data(&self) {
        self.end_of_data.store(true, Ordering::Release);
        self.not_empty.notify_all();
    }

    pub fn abort(&self) {
        self.abort.store(true, Ordering::Release);
        self.not_empty.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    pub fn add_flush_data_offset(&self, offset: u64) {
        self.flush_offsets.lock().unwrap().push_back(offset);
    }

    pub fn take_flush_offsets(&self) -> VecDeque<u64> {
        std::mem::take(&mut *self.flush_offsets.lock().unwrap())
    }

    /// Blocks until bytes are available, returning them drained from the
    /// deque, or returns `None` once end-of-data (or abort) has been
    /// signaled and the deque is empty — the signal the worker is done.
    pub fn pop_all_available(&self) -> Option<Vec<u8>> {
        let mut guard = self.bytes.lock().unwrap();
        loop {
            if !guard.is_empty() {
                return Some(guard.drain(..).collect());
            }
            if self.end_of_data.load(Ordering::Acquire) || self.abort.load(Ordering::Acquire) {
                return None;
            }
            guard = self.not_empty.wait(guard).unwrap();
        }
    }
}

impl Default for ByteQueue {
    fn default() -> Self {
        ByteQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pop_all_available_drains_and_blocks_until_pushed() {
        let q = Arc::new(ByteQueue::new());
        let producer = q.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push_bytes(&[1, 2, 3]);
        });
        let got = q.pop_all_available().expect("bytes should arrive");
        assert_eq!(got, vec![1, 2, 3]);
        handle.join().unwrap();
    }

    #[test]
    fn pop_all_available_returns_none_once_end_of_data_and_drained() {
        let q = ByteQueue::new();
        q.push_bytes(&[9]);
        assert_eq!(q.pop_all_available(), Some(vec![9]));
        q.set_end_of_data();
        assert_eq!(q.pop_all_available(), None);
    }

    #[test]
    fn abort_wakes_a_blocked_pop() {
        let q = Arc::new(ByteQueue::new());
        let aborter = q.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            aborter.abort();
        });
        assert_eq!(q.pop_all_available(), None);
        handle.join().unwrap();
    }
}
