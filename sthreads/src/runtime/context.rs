//! Execution contexts.
//!
//! An [`ExecutionContext`] is the saved machine state of one green thread:
//! registers, signal mask, and (for spawned threads) the stack it runs on.
//! Contexts are captured, created and switched with the `ucontext` family
//! from `libc`.
//!
//! A `ucontext_t` holds pointers into itself once captured, so contexts
//! live behind a `Box` and are never moved after the first capture.

use super::stack::Stack;
use crate::error::{Error, Result};

use libc::{getcontext, makecontext, setcontext, swapcontext, ucontext_t};
use std::{mem, ptr};

pub(crate) struct ExecutionContext {
    ucontext: ucontext_t,

    /// `None` for the bootstrap thread, which runs on the OS thread's stack.
    stack: Option<Stack>,
}

impl ExecutionContext {
    /// An empty context, filled by a later capture or switch.
    pub(crate) fn blank() -> Self {
        Self {
            ucontext: unsafe { mem::zeroed() },
            stack: None,
        }
    }

    /// Saves the calling execution state into this context.
    pub(crate) fn capture(&mut self) -> Result<()> {
        if unsafe { getcontext(&mut self.ucontext) } == -1 {
            return Err(Error::resource("execution context"));
        }

        Ok(())
    }

    /// Creates a context that starts executing `entry` on `stack`.
    ///
    /// The signal mask in effect at the call is the mask `entry` starts
    /// with. `entry` must never return: there is no successor context.
    pub(crate) fn with_entry(stack: Stack, entry: extern "C" fn()) -> Result<Box<Self>> {
        let mut context = Box::new(Self::blank());
        context.capture()?;

        context.ucontext.uc_stack.ss_sp = stack.base();
        context.ucontext.uc_stack.ss_size = stack.len();
        context.ucontext.uc_stack.ss_flags = 0;
        context.ucontext.uc_link = ptr::null_mut();

        unsafe {
            makecontext(&mut context.ucontext, entry, 0);
        }

        context.stack = Some(stack);
        Ok(context)
    }

    pub(crate) fn has_own_stack(&self) -> bool {
        self.stack.is_some()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ucontext_t {
        &mut self.ucontext
    }
}

/// A pending transfer of control between two contexts.
///
/// Built while the scheduler is borrowed, performed after the borrow ends:
/// the switched-to thread must be free to enter the scheduler itself.
pub(crate) struct Switch {
    from: *mut ucontext_t,
    to: *const ucontext_t,
}

impl Switch {
    pub(crate) fn new(from: *mut ucontext_t, to: *const ucontext_t) -> Self {
        Self { from, to }
    }

    /// Saves the current state into `from` and resumes `to`.
    ///
    /// Returns when some later switch resumes `from`.
    ///
    /// # Safety
    ///
    /// Both contexts must still be alive, which holds as long as the
    /// runtime that produced this switch is.
    pub(crate) unsafe fn perform(self) -> Result<()> {
        if unsafe { swapcontext(self.from, self.to) } == -1 {
            return Err(Error::resource("context switch"));
        }

        Ok(())
    }
}

/// A one-way transfer of control: the current state is discarded.
pub(crate) struct Resume {
    to: *const ucontext_t,
}

impl Resume {
    pub(crate) fn new(to: *const ucontext_t) -> Self {
        Self { to }
    }

    /// Resumes the target context. Never returns.
    ///
    /// # Safety
    ///
    /// Same as [`Switch::perform`]. Nothing on the current stack is dropped.
    pub(crate) unsafe fn perform(self) -> ! {
        unsafe {
            setcontext(self.to);
        }

        // setcontext only returns on failure, and there is no caller left to
        // report to.
        crate::log::sterror!("setcontext failed, aborting");
        std::process::abort()
    }
}
