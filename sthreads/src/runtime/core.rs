use super::SCHEDULER;
use super::preempt::{self, CriticalSection, Ticker};
use super::scheduler::Scheduler;
use super::tcb::ThreadId;
use super::thread::{on_tick, thread_start};
use crate::error::{Error, Result};
use crate::log::{sterror, stinfo, stwarn};

use std::marker::PhantomData;
use std::mem;
use std::time::Duration;

/// Handle to the runtime running on the current OS thread.
///
/// `Runtime` is responsible for:
/// - installing the scheduler the free functions of
///   [`thread`](crate::thread) operate on,
/// - turning the caller into the bootstrap thread (id `0`),
/// - driving the preemption timer, when enabled.
///
/// Dropping the handle disarms the timer and releases every thread control
/// block and stack. Threads that have not terminated by then never run
/// again. The handle must be dropped by the bootstrap thread.
///
/// A runtime is bound to the OS thread that created it, so `Runtime` is
/// neither `Send` nor `Sync`.
pub struct Runtime {
    /// Tick source, present in the preemptive variant.
    ticker: Option<Ticker>,

    _not_send: PhantomData<*const ()>,
}

impl Runtime {
    /// Bootstraps a runtime on the calling OS thread.
    pub(crate) fn start(preemption: Option<Duration>, stack_size: usize) -> Result<Self> {
        install(Scheduler::new(stack_size, thread_start)?)?;

        let ticker = match preemption.map(arm).transpose() {
            Ok(ticker) => ticker,
            Err(err) => {
                drop(uninstall());
                return Err(err);
            }
        };

        stinfo!("runtime initialized, stack bytes: ", stack_size);
        if let Some(interval) = preemption {
            stinfo!("preemption armed, interval us: ", interval.as_micros());
        }

        Ok(Self {
            ticker,
            _not_send: PhantomData,
        })
    }

    /// Whether a preemption timer is armed.
    pub fn is_preemptive(&self) -> bool {
        self.ticker.is_some()
    }
}

impl Drop for Runtime {
    /// Shuts the runtime down.
    ///
    /// 1. Stops the timer while ticks are masked, so a late tick finds no
    ///    scheduler instead of switching away mid-shutdown
    /// 2. Removes the scheduler from the thread-local slot
    /// 3. Releases every control block and stack
    fn drop(&mut self) {
        let scheduler = {
            let _section = CriticalSection::enter();
            drop(self.ticker.take());
            uninstall()
        };

        let Some(scheduler) = scheduler else {
            return;
        };

        if scheduler.current() != ThreadId::BOOTSTRAP {
            // The caller is running on one of these stacks.
            sterror!("runtime dropped outside the bootstrap thread, leaking stacks");
            mem::forget(scheduler);
            return;
        }

        let unfinished = scheduler.registry.live_count() - 1;
        if unfinished > 0 {
            stwarn!("runtime dropped with unfinished threads: ", unfinished);
        }

        stinfo!("runtime shut down, threads created: ", scheduler.registry.len());
    }
}

fn install(scheduler: Scheduler) -> Result<()> {
    let _section = CriticalSection::enter();

    SCHEDULER.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        *slot = Some(Box::new(scheduler));
        Ok(())
    })
}

fn uninstall() -> Option<Box<Scheduler>> {
    let _section = CriticalSection::enter();
    SCHEDULER.with(|slot| slot.borrow_mut().take())
}

fn arm(interval: Duration) -> Result<Ticker> {
    preempt::install_handler(on_tick)?;
    Ticker::start(interval)
}
