//! Termination and join.
//!
//! `done()` wakes every thread joined on the caller before giving up the
//! processor; `terminate()` skips the wake-up, leaving such joiners blocked.
//! A body that returns or panics is treated like `done()` except that its
//! joiners receive an error instead of the id.

use super::context::{Resume, Switch};
use super::scheduler::Scheduler;
use super::tcb::{ThreadExit, ThreadId, ThreadState};
use crate::error::{Error, Result};
use crate::log::{sterror, stinfo, sttrace};

/// Next step of a `join` call.
pub(crate) enum JoinStep {
    /// The target had already terminated.
    Complete(ThreadId),
    /// The caller is now Waiting; perform the switch and call
    /// [`Scheduler::joined`] once resumed.
    Block(Switch),
}

/// What happens after a thread terminates.
pub(crate) enum Departure {
    /// Hand the processor to another thread for good.
    Resume(Resume),
    /// Nothing is left to run: end the process.
    Exit(ExitStatus),
}

/// Process exit status once no thread is runnable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub(crate) fn code(self) -> i32 {
        match self {
            ExitStatus::Success => libc::EXIT_SUCCESS,
            ExitStatus::Failure => libc::EXIT_FAILURE,
        }
    }
}

impl Scheduler {
    /// Starts waiting for `target`.
    pub(crate) fn join(&mut self, target: ThreadId) -> Result<JoinStep> {
        let caller = self.running;
        let state = self
            .registry
            .state(target)
            .ok_or(Error::UnknownThread(target))?;

        if state == ThreadState::Terminated {
            return self.joined(target).map(JoinStep::Complete);
        }

        if self.registry.wait_chain_reaches(target, caller) {
            return Err(Error::JoinCycleDetected { caller, target });
        }

        // Blocking with nobody left to run would never return.
        let next = self
            .registry
            .next_ready_after(caller)
            .ok_or(Error::NoRunnableThread)?;

        sttrace!("blocking on thread ", target.as_u64());
        self.registry.wait_on(caller, target);

        Ok(JoinStep::Block(self.switch_to(next)))
    }

    /// Result of a join on a terminated `target`.
    pub(crate) fn joined(&self, target: ThreadId) -> Result<ThreadId> {
        let exit = self.registry.get(target).and_then(|t| t.exit);
        debug_assert!(exit.is_some(), "joined thread has not terminated");

        match exit {
            Some(ThreadExit::Returned) => Err(Error::ThreadBodyReturnedWithoutTermination(target)),
            Some(ThreadExit::Panicked) => Err(Error::ThreadPanicked(target)),
            _ => Ok(target),
        }
    }

    /// Terminates the running thread and picks who runs next.
    ///
    /// Every exit except [`ThreadExit::Aborted`] wakes the joiners first.
    pub(crate) fn finish(&mut self, exit: ThreadExit) -> Departure {
        let caller = self.running;

        if exit != ThreadExit::Aborted {
            let woken = self.registry.wake_joiners(caller);
            if woken > 0 {
                sttrace!("woken joiners: ", woken);
            }
        }

        self.registry.set_state(caller, ThreadState::Terminated);
        if let Some(tcb) = self.registry.get_mut(caller) {
            tcb.exit = Some(exit);
            tcb.waiting_for = None;
        }

        match self.registry.next_ready_after(caller) {
            Some(next) => {
                self.promote(next);
                let to = self.context_ptr(next);
                Departure::Resume(Resume::new(to))
            }
            None => Departure::Exit(self.exit_status(exit)),
        }
    }

    /// Exit status when the last runnable thread ends with `exit`.
    fn exit_status(&self, exit: ThreadExit) -> ExitStatus {
        let stranded = self.registry.waiting_count();

        if stranded > 0 {
            sterror!("deadlock: threads still blocked in join: ", stranded);
            return ExitStatus::Failure;
        }

        if exit.is_fault() {
            return ExitStatus::Failure;
        }

        stinfo!("all threads finished, total spawned: ", self.registry.len() - 1);
        ExitStatus::Success
    }
}
