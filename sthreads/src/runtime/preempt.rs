//! Timer-driven preemption.
//!
//! A helper OS thread wakes up every interval and directs `SIGALRM` at the
//! OS thread hosting the runtime (`pthread_kill`, never process-wide). The
//! signal handler performs a yield on behalf of whichever green thread is
//! running.
//!
//! Every scheduler update runs inside a [`CriticalSection`], which blocks
//! `SIGALRM` for the OS thread. A tick can therefore only land between
//! scheduler operations, never in the middle of one.

use crate::error::{Error, Result};
use crate::log::{sterror, sttrace};

use libc::{
    SA_RESTART, SIG_BLOCK, SIG_SETMASK, SIG_UNBLOCK, SIGALRM, c_int, pthread_kill, pthread_self,
    pthread_sigmask, pthread_t, sigaction, sigaddset, sigemptyset, sigset_t,
};
use std::io;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use std::{mem, ptr};

/// Signal used for preemption ticks.
pub(crate) const PREEMPT_SIGNAL: c_int = SIGALRM;

fn preempt_set() -> sigset_t {
    unsafe {
        let mut set: sigset_t = mem::zeroed();
        sigemptyset(&mut set);
        sigaddset(&mut set, PREEMPT_SIGNAL);
        set
    }
}

/// Blocks preemption ticks until dropped.
///
/// Sections nest: dropping restores the mask that was in effect on entry.
/// A section may span a context switch; the mask travels with the saved
/// context and is restored when the thread resumes.
pub(crate) struct CriticalSection {
    previous: sigset_t,
}

impl CriticalSection {
    pub(crate) fn enter() -> Self {
        let set = preempt_set();
        let mut previous: sigset_t = unsafe { mem::zeroed() };

        unsafe {
            pthread_sigmask(SIG_BLOCK, &set, &mut previous);
        }

        Self { previous }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        unsafe {
            pthread_sigmask(SIG_SETMASK, &self.previous, ptr::null_mut());
        }
    }
}

/// Lets ticks through again.
///
/// Fresh threads start with the mask of the critical section they were
/// created in, so the trampoline calls this once it is done with the
/// scheduler.
pub(crate) fn unmask() {
    let set = preempt_set();

    unsafe {
        pthread_sigmask(SIG_UNBLOCK, &set, ptr::null_mut());
    }
}

/// Installs the process-wide tick handler. Idempotent.
///
/// The handler stays installed for the life of the process: it finds the
/// runtime through a thread-local slot and does nothing on OS threads that
/// have none.
pub(crate) fn install_handler(handler: extern "C" fn(c_int)) -> Result<()> {
    static INSTALLED: OnceLock<std::result::Result<(), i32>> = OnceLock::new();

    let outcome = INSTALLED.get_or_init(|| unsafe {
        let mut action: sigaction = mem::zeroed();
        action.sa_sigaction = handler as usize;
        action.sa_flags = SA_RESTART;
        sigemptyset(&mut action.sa_mask);

        if sigaction(PREEMPT_SIGNAL, &action, ptr::null_mut()) == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error().raw_os_error().unwrap_or(0))
        }
    });

    match outcome {
        Ok(()) => Ok(()),
        Err(code) => Err(Error::Resource {
            what: "preemption signal handler",
            source: io::Error::from_raw_os_error(*code),
        }),
    }
}

/// Preserves `errno` across a tick.
///
/// `errno` belongs to the OS thread, so every green thread shares it. The
/// interrupted thread must find it unchanged when the handler returns.
pub(crate) fn preserving_errno(f: impl FnOnce()) {
    let saved = unsafe { *libc::__errno_location() };
    f();
    unsafe {
        *libc::__errno_location() = saved;
    }
}

/// `pthread_t` of the OS thread that receives ticks.
#[derive(Clone, Copy)]
struct TickTarget(pthread_t);

/// The helper thread delivering ticks.
///
/// Dropping it stops delivery and waits for the helper to exit, so no tick
/// reaches the runtime thread afterwards.
pub(crate) struct Ticker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Starts ticking the calling OS thread every `interval`.
    pub(crate) fn start(interval: Duration) -> Result<Self> {
        let target = TickTarget(unsafe { pthread_self() });
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::Builder::new()
            .name("sthreads-preempt".into())
            .spawn(move || run_ticker(target, interval, &stop_flag))
            .map_err(|source| Error::Resource {
                what: "preemption timer thread",
                source,
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

fn run_ticker(target: TickTarget, interval: Duration, stop: &AtomicBool) {
    loop {
        let deadline = Instant::now() + interval;

        loop {
            if stop.load(Ordering::Acquire) {
                return;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }

        sttrace!("tick");
        let rc = unsafe { pthread_kill(target.0, PREEMPT_SIGNAL) };
        if rc != 0 {
            sterror!("failed to deliver preemption tick, errno ", rc);
            return;
        }
    }
}
