//! Core runtime components.
//!
//! This module holds everything needed to run green threads on one OS
//! thread:
//! - execution contexts and their stacks,
//! - thread control blocks and the registry,
//! - the round-robin scheduler and the join/termination protocol,
//! - timer-driven preemption.
//!
//! Most users only touch [`RuntimeBuilder`](builder::RuntimeBuilder) and the
//! free functions of [`thread`].

mod context;
mod join;
mod preempt;
mod registry;
mod scheduler;
mod stack;

pub(crate) mod builder;
pub(crate) mod core;
pub(crate) mod tcb;

pub mod thread;

pub use stack::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE};

use crate::error::{Error, Result};
use preempt::CriticalSection;
use scheduler::Scheduler;

use std::cell::RefCell;

thread_local! {
    /// Scheduler of the runtime running on this OS thread.
    ///
    /// Installed by [`core::Runtime`] for its lifetime. Green threads reach
    /// it from their bodies without any handle being passed around, and the
    /// preemption handler reaches it from signal context.
    static SCHEDULER: RefCell<Option<Box<Scheduler>>> = const { RefCell::new(None) };
}

/// Runs `f` against this OS thread's scheduler.
///
/// The caller must hold a [`CriticalSection`]; the borrow never outlives
/// `f`, so no context switch may happen inside it.
fn borrow<R>(f: impl FnOnce(&mut Scheduler) -> R) -> Result<R> {
    SCHEDULER.with(|slot| {
        let mut slot = slot.borrow_mut();
        let scheduler = slot.as_deref_mut().ok_or(Error::NotInitialized)?;
        Ok(f(scheduler))
    })
}

/// Runs `f` against this OS thread's scheduler with preemption masked.
fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> Result<R> {
    let _section = CriticalSection::enter();
    borrow(f)
}
