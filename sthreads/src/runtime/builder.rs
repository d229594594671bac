use super::core::Runtime;
use super::stack::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE};
use crate::error::Result;

use std::time::Duration;

/// Builder for configuring and starting a runtime.
///
/// `RuntimeBuilder` allows customizing runtime parameters before the
/// calling OS thread becomes the bootstrap thread. By default threads get
/// [`DEFAULT_STACK_SIZE`] bytes of stack and scheduling is purely
/// cooperative.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = RuntimeBuilder::new()
///     .preemption(Duration::from_millis(10))
///     .stack_size(256 * 1024)
///     .init()?;
/// ```
pub struct RuntimeBuilder {
    /// Interval of the preemption timer, if any.
    preemption: Option<Duration>,

    /// Usable stack size of every spawned thread.
    stack_size: usize,
}

impl RuntimeBuilder {
    /// Creates a new `RuntimeBuilder` with default configuration.
    pub fn new() -> Self {
        Self {
            preemption: None,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Enables preemption: the running thread is switched away from every
    /// `interval`, as if it had called [`yield_now`](crate::yield_now).
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let builder = RuntimeBuilder::new()
    ///     .preemption(Duration::from_millis(5));
    /// ```
    pub fn preemption(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "preemption interval must be > 0");

        self.preemption = Some(interval);
        self
    }

    /// Sets the usable stack size of spawned threads, rounded up to whole
    /// pages.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is below [`MIN_STACK_SIZE`].
    pub fn stack_size(mut self, bytes: usize) -> Self {
        assert!(
            bytes >= MIN_STACK_SIZE,
            "stack_size must be at least {MIN_STACK_SIZE} bytes"
        );

        self.stack_size = bytes;
        self
    }

    /// Starts the runtime on the calling OS thread, which becomes thread
    /// `0`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyInitialized`](crate::Error::AlreadyInitialized) if
    ///   this OS thread already runs one.
    /// - [`Error::Resource`](crate::Error::Resource) if the bootstrap
    ///   context cannot be captured or the timer cannot be armed.
    pub fn init(self) -> Result<Runtime> {
        Runtime::start(self.preemption, self.stack_size)
    }
}

impl Default for RuntimeBuilder {
    /// Creates a default `RuntimeBuilder`.
    fn default() -> Self {
        Self::new()
    }
}
