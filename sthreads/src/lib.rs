//! # sthreads
//!
//! **sthreads** is a small user-space thread runtime: many green threads
//! multiplexed on the OS thread that starts it, with round-robin
//! scheduling and an optional preemption timer.
//!
//! Every green thread owns a fixed-size stack and a saved machine context.
//! Switching between them is a context swap, not a kernel scheduling
//! decision, so exactly one green thread runs at a time and all of them
//! share the same OS thread.
//!
//! The runtime offers:
//!
//! - **Spawning**: [`spawn`] creates a thread and switches to it at once
//! - **Cooperative scheduling**: [`yield_now`] hands the processor to the
//!   next Ready thread in creation order
//! - **Join**: [`join`] blocks until a thread ends with [`done`]
//! - **Termination**: [`done`] wakes joiners, [`terminate`] does not
//! - **Preemption** (optional): a timer forces a yield at a fixed interval
//! - **Macros**: `#[sthreads::main]` and `#[sthreads::test]`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! #[sthreads::main]
//! fn main() {
//!     let worker = sthreads::spawn(|| {
//!         for n in 0..3 {
//!             println!("worker: {n}");
//!             let _ = sthreads::yield_now();
//!         }
//!         sthreads::done();
//!     })
//!     .expect("spawn failed");
//!
//!     sthreads::join(worker).expect("join failed");
//!     sthreads::done();
//! }
//! ```
//!
//! ## Preemption
//!
//! ```rust,ignore
//! let _runtime = sthreads::RuntimeBuilder::new()
//!     .preemption(std::time::Duration::from_millis(10))
//!     .init()?;
//! ```
//!
//! A preempted thread may be interrupted anywhere, including inside the
//! allocator or while holding the stdout lock. Wrap such code in
//! [`without_preemption`].
//!
//! ## Platform
//!
//! Linux with glibc only: contexts are built on `getcontext`,
//! `makecontext` and `swapcontext`.

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
compile_error!("sthreads requires Linux with glibc (ucontext)");

mod log;

mod error;
mod runtime;

pub use error::{Error, Result};
pub use runtime::builder::RuntimeBuilder;
pub use runtime::core::Runtime;
pub use runtime::thread::{
    self, ThreadId, ThreadState, current, done, join, spawn, state, terminate, without_preemption,
    yield_now,
};
pub use runtime::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE};

pub use sthreads_macros::{main, test};

/// Starts a cooperative runtime with default settings on the calling OS
/// thread, which becomes thread `0`.
///
/// Equivalent to `RuntimeBuilder::new().init()`.
///
/// # Errors
///
/// See [`RuntimeBuilder::init`].
pub fn init() -> Result<Runtime> {
    RuntimeBuilder::new().init()
}
