//! Sequential lock
//!
//! Writers take a snapshot of the protected state together with a sequence
//! number, mutate the private copy outside the critical section and commit it
//! only if no other writer committed in between. Readers copy the state under
//! the critical section and never touch the sequence number.

use core::cell::Cell;

use crate::CriticalSection;

/// Retry-based writer discipline over a small `Copy` state
pub struct SeqLock<T, C> {
    cs: C,
    sequence: Cell<u32>,
    state: Cell<T>,
}

// SAFETY: both cells are only accessed inside `cs`.
unsafe impl<T: Copy + Send, C: CriticalSection + Sync> Sync for SeqLock<T, C> {}

impl<T: Copy, C: CriticalSection> SeqLock<T, C> {
    pub const fn new(cs: C, state: T) -> Self {
        Self {
            cs,
            sequence: Cell::new(0),
            state: Cell::new(state),
        }
    }

    /// Apply `mutator` to the state and commit the result
    ///
    /// `mutator` runs outside the critical section and may run several times
    /// if another context commits concurrently; it must only depend on the
    /// state it is handed. The value it returns on the committed attempt is
    /// returned.
    pub fn write<R>(&self, mut mutator: impl FnMut(&mut T) -> R) -> R {
        loop {
            let (seq, mut next) = self.cs.with(|| (self.sequence.get(), self.state.get()));
            let result = mutator(&mut next);
            let committed = self.cs.with(|| {
                if self.sequence.get() == seq {
                    self.state.set(next);
                    self.sequence.set(seq.wrapping_add(1));
                    true
                } else {
                    false
                }
            });
            if committed {
                return result;
            }
        }
    }

    /// Run a bounded `accessor` on the state with the critical section held
    pub fn read_with_lock<R>(&self, accessor: impl FnOnce(&T) -> R) -> R {
        self.cs.with(|| accessor(&self.state.get()))
    }

    /// Copy of the current state
    pub fn read(&self) -> T {
        self.read_with_lock(|s| *s)
    }

    /// Number of committed writes (wrapping)
    pub fn sequence(&self) -> u32 {
        self.cs.with(|| self.sequence.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IrqFree;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Cursor {
        head: u16,
        len: u16,
    }

    #[test]
    fn test_write_commits_and_bumps_sequence() {
        let lock = SeqLock::new(IrqFree::new(), Cursor { head: 0, len: 0 });
        let old = lock.write(|c| {
            let old = c.len;
            c.len += 4;
            c.head = 4;
            old
        });
        assert_eq!(old, 0);
        assert_eq!(lock.read(), Cursor { head: 4, len: 4 });
        assert_eq!(lock.sequence(), 1);
    }

    #[test]
    fn test_reader_leaves_sequence_alone() {
        let lock = SeqLock::new(IrqFree::new(), Cursor { head: 1, len: 2 });
        let sum = lock.read_with_lock(|c| c.head + c.len);
        assert_eq!(sum, 3);
        assert_eq!(lock.sequence(), 0);
    }

    #[test]
    fn test_interrupted_writer_retries_on_fresh_state() {
        let lock = SeqLock::new(IrqFree::new(), Cursor { head: 0, len: 0 });
        let mut attempts = 0;
        lock.write(|c| {
            attempts += 1;
            if attempts == 1 {
                // Another context commits between snapshot and commit
                lock.write(|other| other.len += 10);
            }
            c.len += 1;
        });
        assert_eq!(attempts, 2);
        assert_eq!(lock.read().len, 11);
        assert_eq!(lock.sequence(), 2);
    }
}
