use parking_lot::{Condvar, Mutex};

/// Tracks which feature blocks are finished, thread safe.
///
/// Unlike a barrier, each block has its own one-way `pending -> done` flag, a
/// worker waits only on the blocks it depends on.
#[derive(Debug)]
pub struct BlockTracker {
    done: Mutex<Box<[bool]>>,
    cond: Condvar,
}

impl BlockTracker {
    /// Creates a new `BlockTracker` with every block pending.
    ///
    /// # Arguments
    /// * `nblocks` - The amount of blocks to track.
    pub fn new(nblocks: usize) -> Self {
        Self {
            done: Mutex::new(vec![false; nblocks].into_boxed_slice()),
            cond: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.done.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks block `id` as finished and wakes up every waiter.
    ///
    /// # Panics
    /// If `id` is out of range.
    pub fn finish(&self, id: usize) {
        self.done.lock()[id] = true;
        self.cond.notify_all();
    }

    /// Blocks the calling thread until block `id` is finished.
    ///
    /// There's no timeout, waiting on a block nobody finishes blocks forever.
    ///
    /// # Panics
    /// If `id` is out of range.
    pub fn wait(&self, id: usize) {
        let mut done = self.done.lock();

        while !done[id] {
            self.cond.wait(&mut done);
        }
    }

    /// Whether block `id` is already finished, without blocking.
    pub fn is_finished(&self, id: usize) -> bool {
        self.done.lock()[id]
    }
}
