use super::context::ExecutionContext;

use std::fmt;

/// Identifier of a green thread.
///
/// Ids come from a per-runtime counter: the bootstrap thread is `0` and
/// every successful [`spawn`](crate::spawn) takes the next value. Ids are
/// never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u64);

impl ThreadId {
    /// Id of the thread that initialized the runtime.
    pub const BOOTSTRAP: ThreadId = ThreadId(0);

    pub const fn from_u64(id: u64) -> Self {
        ThreadId(id)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Scheduling state of a green thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadState {
    /// Currently executing. Exactly one thread is in this state.
    Running,
    /// Runnable, waiting for its round-robin turn.
    Ready,
    /// Blocked in `join` until another thread calls `done()`.
    Waiting,
    /// Finished. Terminal.
    Terminated,
}

/// How a terminated thread ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ThreadExit {
    /// Called `done()`.
    Done,
    /// Called `terminate()`.
    Aborted,
    /// The body returned without `done()` or `terminate()`.
    Returned,
    /// The body panicked.
    Panicked,
}

impl ThreadExit {
    pub(crate) fn is_fault(self) -> bool {
        matches!(self, ThreadExit::Returned | ThreadExit::Panicked)
    }
}

/// Body of a spawned thread, consumed when the thread first runs.
pub(crate) type Entry = Box<dyn FnOnce() + 'static>;

/// Thread control block.
pub(crate) struct Tcb {
    pub(crate) id: ThreadId,
    pub(crate) state: ThreadState,

    /// Saved machine state. Boxed so the `ucontext_t` never moves once
    /// captured, even when the registry grows.
    pub(crate) context: Box<ExecutionContext>,

    /// Target of the `join` this thread is blocked in.
    pub(crate) waiting_for: Option<ThreadId>,

    /// Set once the thread is Terminated.
    pub(crate) exit: Option<ThreadExit>,

    /// Taken by the trampoline on first run.
    pub(crate) entry: Option<Entry>,
}

impl Tcb {
    /// The bootstrap thread: already running, no entry of its own.
    pub(crate) fn bootstrap(context: Box<ExecutionContext>) -> Self {
        Self {
            id: ThreadId::BOOTSTRAP,
            state: ThreadState::Running,
            context,
            waiting_for: None,
            exit: None,
            entry: None,
        }
    }

    pub(crate) fn spawned(id: ThreadId, context: Box<ExecutionContext>, entry: Entry) -> Self {
        Self {
            id,
            state: ThreadState::Ready,
            context,
            waiting_for: None,
            exit: None,
            entry: Some(entry),
        }
    }
}
