//! The green thread API.
//!
//! Every function here acts on the runtime installed on the calling OS
//! thread and fails with [`Error::NotInitialized`] when there is none
//! (`done()` and `terminate()` panic instead, having no way to return).

use super::join::{Departure, JoinStep};
use super::preempt::{self, CriticalSection};
use super::tcb::ThreadExit;
use super::{SCHEDULER, borrow, with_scheduler};
use crate::error::Result;
#[cfg(doc)]
use crate::error::Error;
use crate::log::sterror;

pub use super::tcb::{ThreadId, ThreadState};

use libc::c_int;
use std::mem;
use std::panic::{self, AssertUnwindSafe};

/// Spawns a green thread running `entry` and switches to it at once.
///
/// The caller becomes Ready and resumes only when a later `yield_now`,
/// `join`, `done`, `terminate` or preemption tick selects it again.
/// Returns the id of the new thread.
///
/// `entry` is expected to finish by calling [`done`] or [`terminate`].
/// If it returns (or panics) instead, the thread is still terminated and
/// its joiners receive [`Error::ThreadBodyReturnedWithoutTermination`]
/// (or [`Error::ThreadPanicked`]).
///
/// # Errors
///
/// [`Error::Resource`] if the stack or the context cannot be created. The
/// caller keeps running and no id is consumed.
///
/// # Examples
///
/// ```rust,ignore
/// let _runtime = sthreads::init()?;
///
/// let worker = sthreads::spawn(|| {
///     println!("hello from a green thread");
///     sthreads::done();
/// })?;
///
/// assert_eq!(sthreads::join(worker)?, worker);
/// ```
pub fn spawn<F>(entry: F) -> Result<ThreadId>
where
    F: FnOnce() + 'static,
{
    let _section = CriticalSection::enter();

    let context = borrow(|s| s.new_context())??;
    let (id, switch) = borrow(|s| s.spawn(context, Box::new(entry)))?;

    unsafe { switch.perform()? };
    Ok(id)
}

/// Hands the processor to the next Ready thread, round robin.
///
/// The next thread is the first Ready one after the caller in creation
/// order, wrapping around to the bootstrap thread.
///
/// # Errors
///
/// [`Error::NoRunnableThread`] if no other thread is Ready. The caller
/// simply keeps running.
pub fn yield_now() -> Result<()> {
    let _section = CriticalSection::enter();

    let switch = borrow(|s| s.yield_now())??;
    unsafe { switch.perform() }
}

/// Waits until `target` has terminated and returns its id.
///
/// Returns immediately if `target` already terminated. Otherwise the
/// caller blocks until `target` calls [`done`].
///
/// A thread that ended with [`terminate`] counts as finished for later
/// joins, but it never wakes threads that were already blocked on it.
///
/// # Errors
///
/// - [`Error::UnknownThread`] if no such thread was spawned.
/// - [`Error::JoinCycleDetected`] if `target` is the caller or is itself
///   (transitively) waiting for the caller.
/// - [`Error::NoRunnableThread`] if blocking would leave no thread to run.
/// - [`Error::ThreadBodyReturnedWithoutTermination`] or
///   [`Error::ThreadPanicked`] if `target` ended abnormally.
pub fn join(target: ThreadId) -> Result<ThreadId> {
    let _section = CriticalSection::enter();

    match borrow(|s| s.join(target))?? {
        JoinStep::Complete(id) => Ok(id),
        JoinStep::Block(switch) => {
            unsafe { switch.perform()? };
            borrow(|s| s.joined(target))?
        }
    }
}

/// Ends the calling thread after waking every thread joined on it.
///
/// If no thread is left to run the process exits: with success when every
/// thread has terminated, with failure when some are still blocked in
/// `join`.
///
/// Values owned by the caller's stack frames are not dropped.
///
/// # Panics
///
/// Panics if no runtime is running on this OS thread.
pub fn done() -> ! {
    depart(ThreadExit::Done)
}

/// Ends the calling thread without waking its joiners.
///
/// Threads already blocked in `join` on the caller stay blocked forever.
/// Otherwise behaves like [`done`].
///
/// # Panics
///
/// Panics if no runtime is running on this OS thread.
pub fn terminate() -> ! {
    depart(ThreadExit::Aborted)
}

/// Id of the calling green thread.
pub fn current() -> Result<ThreadId> {
    with_scheduler(|s| s.current())
}

/// State of thread `id`, or `None` if it was never spawned.
pub fn state(id: ThreadId) -> Result<Option<ThreadState>> {
    with_scheduler(|s| s.state(id))
}

/// Runs `f` with preemption ticks held back.
///
/// Ticks arriving meanwhile are delivered when `f` returns. Use it around
/// code that must not be interleaved with other green threads, such as
/// console output or allocator-heavy sections, when preemption is enabled.
/// Explicit `yield_now`/`join` inside `f` still switch.
pub fn without_preemption<R>(f: impl FnOnce() -> R) -> R {
    let _section = CriticalSection::enter();
    f()
}

fn depart(exit: ThreadExit) -> ! {
    let _section = CriticalSection::enter();

    let departure = match borrow(|s| s.finish(exit)) {
        Ok(departure) => departure,
        Err(err) => panic!("cannot end thread: {err}"),
    };

    match departure {
        Departure::Resume(resume) => unsafe { resume.perform() },
        Departure::Exit(status) => exit_process(status.code()),
    }
}

/// Ends the process from whichever green thread is running.
///
/// `exit` runs this OS thread's TLS destructors, and the scheduler slot is
/// one of them: the scheduler is leaked first so the stack the caller runs
/// on stays mapped until the process is gone.
fn exit_process(code: i32) -> ! {
    let scheduler = SCHEDULER.with(|slot| slot.borrow_mut().take());
    mem::forget(scheduler);

    std::process::exit(code)
}

/// Start routine of every spawned context.
///
/// Fresh contexts start with ticks masked, inherited from `spawn`.
pub(super) extern "C" fn thread_start() {
    let started = borrow(|s| s.take_entry());
    preempt::unmask();

    let Ok(Some((id, entry))) = started else {
        sterror!("thread started without a body");
        std::process::abort();
    };

    let exit = match panic::catch_unwind(AssertUnwindSafe(entry)) {
        Ok(()) => {
            sterror!("body returned without done() or terminate(), thread ", id.as_u64());
            ThreadExit::Returned
        }
        Err(_) => {
            sterror!("body panicked, thread ", id.as_u64());
            ThreadExit::Panicked
        }
    };

    depart(exit)
}

/// Preemption tick handler.
///
/// Skips the tick if the scheduler is busy or nobody else is Ready.
pub(super) extern "C" fn on_tick(_signal: c_int) {
    preempt::preserving_errno(|| {
        let switch = SCHEDULER
            .try_with(|slot| {
                let mut slot = slot.try_borrow_mut().ok()?;
                slot.as_deref_mut()?.preempt()
            })
            .ok()
            .flatten();

        if let Some(switch) = switch {
            let _ = unsafe { switch.perform() };
        }
    });
}
