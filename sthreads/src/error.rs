//! Runtime error types.

use crate::runtime::tcb::ThreadId;

use std::io;
use thiserror::Error;

/// Errors reported by the runtime.
///
/// [`Error::Resource`] means the host could not provide another execution
/// context. Every other variant is a logic error in how the API was used.
#[derive(Debug, Error)]
pub enum Error {
    /// A stack mapping or a context capture failed.
    #[error("failed to allocate {what}: {source}")]
    Resource {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// The operation needs another Ready thread and none exists.
    #[error("no other thread is ready to run")]
    NoRunnableThread,

    /// Waiting on `target` would never complete because its wait chain
    /// leads back to `caller`.
    #[error("thread {caller} joining thread {target} would deadlock")]
    JoinCycleDetected { caller: ThreadId, target: ThreadId },

    /// No thread with this id was ever spawned.
    #[error("no thread with id {0}")]
    UnknownThread(ThreadId),

    /// The thread body returned without calling `done()` or `terminate()`.
    #[error("thread {0} returned without calling done() or terminate()")]
    ThreadBodyReturnedWithoutTermination(ThreadId),

    /// The thread body panicked.
    #[error("thread {0} panicked")]
    ThreadPanicked(ThreadId),

    /// A runtime is already installed on this OS thread.
    #[error("a runtime is already running on this OS thread")]
    AlreadyInitialized,

    /// No runtime is installed on this OS thread.
    #[error("no runtime is running on this OS thread")]
    NotInitialized,
}

impl Error {
    pub(crate) fn resource(what: &'static str) -> Self {
        Self::Resource {
            what,
            source: io::Error::last_os_error(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logic_errors_name_the_threads_involved() {
        let err = Error::JoinCycleDetected {
            caller: ThreadId::from_u64(2),
            target: ThreadId::from_u64(5),
        };
        assert_eq!(err.to_string(), "thread 2 joining thread 5 would deadlock");

        let err = Error::ThreadBodyReturnedWithoutTermination(ThreadId::from_u64(3));
        assert_eq!(
            err.to_string(),
            "thread 3 returned without calling done() or terminate()"
        );
    }

    #[test]
    fn resource_error_keeps_os_source() {
        let err = Error::Resource {
            what: "thread stack",
            source: io::Error::from_raw_os_error(libc::ENOMEM),
        };

        assert!(err.to_string().starts_with("failed to allocate thread stack"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
