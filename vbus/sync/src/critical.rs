//! Critical section implementations
//!
//! A critical section here is always scoped to a closure, so it is released
//! on every exit path of the protected code. Implementations are not
//! reentrant unless their name says so; device callbacks must never run
//! inside one.

use core::sync::atomic::{AtomicU8, Ordering};

/// Scoped mutual exclusion between interrupt and foreground contexts
///
/// # Safety
///
/// While `f` runs, no other execution context that enters the same
/// implementation may run. Shared cells in this crate rely on that to
/// implement `Sync`.
pub unsafe trait CriticalSection {
    /// Run `f` with every competing context masked out
    fn with<R>(&self, f: impl FnOnce() -> R) -> R;
}

unsafe impl<C: CriticalSection + ?Sized> CriticalSection for &C {
    fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        (**self).with(f)
    }
}

/// Nesting depth of [`IrqFree`]; only touched with interrupts masked
static IRQ_FREE_DEPTH: AtomicU8 = AtomicU8::new(0);

/// Global interrupt masking through the `critical-section` crate
///
/// Nesting is a contract violation and is caught in debug builds. Use
/// [`IrqFreeNested`] where nesting is intended.
#[derive(Debug, Clone, Copy, Default)]
pub struct IrqFree;

impl IrqFree {
    pub const fn new() -> Self {
        Self
    }
}

/// Puts [`IRQ_FREE_DEPTH`] back on every exit path, unwinding included
struct RestoreDepth(u8);

impl Drop for RestoreDepth {
    fn drop(&mut self) {
        IRQ_FREE_DEPTH.store(self.0, Ordering::Relaxed);
    }
}

unsafe impl CriticalSection for IrqFree {
    fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        critical_section::with(|_| {
            let depth = IRQ_FREE_DEPTH.load(Ordering::Relaxed);
            debug_assert_eq!(depth, 0, "critical sections must not nest");
            IRQ_FREE_DEPTH.store(depth.wrapping_add(1), Ordering::Relaxed);
            let _restore = RestoreDepth(depth);
            f()
        })
    }
}

/// Recursive variant of [`IrqFree`]
#[derive(Debug, Clone, Copy, Default)]
pub struct IrqFreeNested;

impl IrqFreeNested {
    pub const fn new() -> Self {
        Self
    }
}

unsafe impl CriticalSection for IrqFreeNested {
    fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        critical_section::with(|_| f())
    }
}

#[cfg(feature = "basepri")]
pub use basepri::BasePri;

#[cfg(feature = "basepri")]
mod basepri {
    use super::CriticalSection;
    use core::sync::atomic::{compiler_fence, Ordering};
    use cortex_m::register::{basepri, basepri_max};

    /// Masks only interrupts at or below the `CEILING` priority
    ///
    /// Interrupts more urgent than the ceiling keep running, so they must not
    /// touch anything protected by this critical section. `CEILING` is the
    /// raw BASEPRI value (priority already shifted into the implemented bits).
    /// Raising BASEPRI only ever increases masking, so nesting is allowed.
    #[derive(Debug, Clone, Copy)]
    pub struct BasePri<const CEILING: u8>(());

    impl<const CEILING: u8> BasePri<CEILING> {
        /// # Safety
        ///
        /// Every interrupt that touches data protected by this instance must
        /// run at a priority no more urgent than `CEILING`.
        pub const unsafe fn new() -> Self {
            assert!(CEILING != 0, "BASEPRI ceiling 0 disables masking");
            Self(())
        }
    }

    struct Raised {
        previous: u8,
    }

    impl Raised {
        fn raise(ceiling: u8) -> Self {
            let previous = basepri::read();
            basepri_max::write(ceiling);
            compiler_fence(Ordering::SeqCst);
            Self { previous }
        }
    }

    impl Drop for Raised {
        fn drop(&mut self) {
            compiler_fence(Ordering::SeqCst);
            // SAFETY: restores the value read on entry, which never unmasks
            // anything the enclosing context had masked.
            unsafe { basepri::write(self.previous) };
        }
    }

    unsafe impl<const CEILING: u8> CriticalSection for BasePri<CEILING> {
        fn with<R>(&self, f: impl FnOnce() -> R) -> R {
            let _raised = Raised::raise(CEILING);
            f()
        }
    }
}
