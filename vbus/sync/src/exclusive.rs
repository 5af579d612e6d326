//! Value shared between interrupt and foreground code

use core::cell::RefCell;

use crate::CriticalSection;

/// A value that can only be touched inside the critical section `C`
///
/// This is the `Mutex<RefCell<T>>` pattern with the critical section bound
/// to the cell instead of passed at every access.
pub struct Exclusive<T, C> {
    cs: C,
    value: RefCell<T>,
}

// SAFETY: `value` is only reachable through `lock`, which serializes every
// access inside `cs`.
unsafe impl<T: Send, C: CriticalSection + Sync> Sync for Exclusive<T, C> {}

impl<T, C: CriticalSection> Exclusive<T, C> {
    pub const fn new(cs: C, value: T) -> Self {
        Self {
            cs,
            value: RefCell::new(value),
        }
    }

    /// Run `f` on the value with the critical section held
    ///
    /// `f` must not call back into code that locks the same cell.
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.cs.with(|| f(&mut self.value.borrow_mut()))
    }

    /// Direct access when the cell is not shared yet
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// Critical section guarding this cell
    pub fn critical_section(&self) -> &C {
        &self.cs
    }
}

impl<T: Copy, C: CriticalSection> Exclusive<T, C> {
    /// Copy of the current value
    pub fn get(&self) -> T {
        self.lock(|v| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IrqFree;

    #[test]
    fn test_lock_mutates_value() {
        let cell = Exclusive::new(IrqFree::new(), 10u32);
        cell.lock(|v| *v += 5);
        assert_eq!(cell.get(), 15);
    }

    #[test]
    fn test_static_cell() {
        static COUNTER: Exclusive<u16, IrqFree> = Exclusive::new(IrqFree, 0);
        for _ in 0..3 {
            COUNTER.lock(|v| *v += 1);
        }
        assert_eq!(COUNTER.get(), 3);
    }

    #[test]
    fn test_get_mut_and_into_inner() {
        let mut cell = Exclusive::new(IrqFree::new(), [0u8; 4]);
        cell.get_mut()[2] = 9;
        assert_eq!(cell.into_inner(), [0, 0, 9, 0]);
    }
}
