use super::context::{ExecutionContext, Switch};
use super::registry::Registry;
use super::stack::Stack;
use super::tcb::{Entry, Tcb, ThreadId, ThreadState};
use crate::error::{Error, Result};
use crate::log::sttrace;

/// Round-robin scheduler for one OS thread.
///
/// Owns the registry and the running cursor. Methods never switch
/// contexts themselves: they update the bookkeeping and hand back a
/// [`Switch`] that the caller performs once the scheduler is no longer
/// borrowed.
pub(crate) struct Scheduler {
    pub(crate) registry: Registry,

    /// The thread in the Running state.
    pub(crate) running: ThreadId,

    /// Usable stack size of spawned threads.
    stack_size: usize,

    /// Start routine of every spawned context.
    start: extern "C" fn(),
}

impl Scheduler {
    /// Creates a scheduler whose only thread is the caller.
    ///
    /// `start` is the routine every spawned context begins in; it is
    /// expected to fetch its body with [`take_entry`](Self::take_entry).
    pub(crate) fn new(stack_size: usize, start: extern "C" fn()) -> Result<Self> {
        let mut context = Box::new(ExecutionContext::blank());
        context.capture()?;

        Ok(Self {
            registry: Registry::new(Tcb::bootstrap(context)),
            running: ThreadId::BOOTSTRAP,
            stack_size,
            start,
        })
    }

    pub(crate) fn current(&self) -> ThreadId {
        self.running
    }

    pub(crate) fn state(&self, id: ThreadId) -> Option<ThreadState> {
        self.registry.state(id)
    }

    /// Allocates the stack and start context for the next spawned thread.
    pub(crate) fn new_context(&self) -> Result<Box<ExecutionContext>> {
        let stack = Stack::new(self.stack_size)?;
        ExecutionContext::with_entry(stack, self.start)
    }

    /// Registers a thread for `entry` and prepares the switch into it.
    ///
    /// `context` comes from [`new_context`](Self::new_context); when that
    /// fails nothing is registered and no id is consumed.
    pub(crate) fn spawn(
        &mut self,
        context: Box<ExecutionContext>,
        entry: Entry,
    ) -> (ThreadId, Switch) {
        debug_assert!(context.has_own_stack());

        let id = self.registry.next_id();
        self.registry.push(Tcb::spawned(id, context, entry));

        let caller = self.running;
        self.registry.set_state(caller, ThreadState::Ready);
        sttrace!("spawned thread ", id.as_u64());

        (id, self.switch_to(id))
    }

    /// Gives the processor to the next Ready thread.
    ///
    /// Fails with [`Error::NoRunnableThread`] when no other thread is
    /// Ready; the caller then keeps running.
    pub(crate) fn yield_now(&mut self) -> Result<Switch> {
        let caller = self.running;
        let next = self
            .registry
            .next_ready_after(caller)
            .ok_or(Error::NoRunnableThread)?;

        self.registry.set_state(caller, ThreadState::Ready);
        Ok(self.switch_to(next))
    }

    /// Yield on behalf of the running thread, from the tick handler.
    ///
    /// `None` when there is nobody to hand over to.
    pub(crate) fn preempt(&mut self) -> Option<Switch> {
        let caller = self.running;
        let next = self.registry.next_ready_after(caller)?;

        sttrace!("preempting thread ", caller.as_u64());
        self.registry.set_state(caller, ThreadState::Ready);
        Some(self.switch_to(next))
    }

    /// Takes the body of the running thread. Called once, from the start
    /// routine of a fresh context.
    pub(crate) fn take_entry(&mut self) -> Option<(ThreadId, Entry)> {
        let id = self.running;
        let entry = self.registry.get_mut(id)?.entry.take()?;
        Some((id, entry))
    }

    /// Makes `next` the running thread and returns the switch from the
    /// previous one.
    ///
    /// The previous thread's new state must already be recorded.
    pub(crate) fn switch_to(&mut self, next: ThreadId) -> Switch {
        let previous = self.promote(next);

        let from = self.context_ptr(previous);
        let to = self.context_ptr(next);
        Switch::new(from, to)
    }

    /// Moves the running cursor to `next`. Returns the previous holder.
    pub(crate) fn promote(&mut self, next: ThreadId) -> ThreadId {
        let previous = self.running;
        debug_assert_ne!(previous, next);
        debug_assert_ne!(self.registry.state(previous), Some(ThreadState::Running));

        self.registry.set_state(next, ThreadState::Running);
        self.running = next;
        sttrace!("switching to thread ", next.as_u64());

        previous
    }

    pub(crate) fn context_ptr(&mut self, id: ThreadId) -> *mut libc::ucontext_t {
        match self.registry.get_mut(id) {
            Some(tcb) => tcb.context.as_mut_ptr(),
            None => unreachable!("thread {id} is not registered"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::runtime::stack::MIN_STACK_SIZE;

    extern "C" fn never_started() {}

    pub(crate) fn id(n: u64) -> ThreadId {
        ThreadId::from_u64(n)
    }

    pub(crate) fn scheduler() -> Scheduler {
        Scheduler::new(MIN_STACK_SIZE, never_started).unwrap()
    }

    /// Spawns a thread from the running one, dropping the switch.
    pub(crate) fn spawn_noop(scheduler: &mut Scheduler) -> ThreadId {
        let context = scheduler.new_context().unwrap();
        let (id, _switch) = scheduler.spawn(context, Box::new(|| {}));
        id
    }

    #[test]
    fn spawn_runs_the_new_thread_at_once() {
        let mut s = scheduler();
        assert_eq!(s.current(), ThreadId::BOOTSTRAP);

        let first = spawn_noop(&mut s);
        assert_eq!(first, id(1));
        assert_eq!(s.current(), first);
        assert_eq!(s.state(ThreadId::BOOTSTRAP), Some(ThreadState::Ready));

        let second = spawn_noop(&mut s);
        assert_eq!(second, id(2));
        assert_eq!(s.state(first), Some(ThreadState::Ready));
        assert_eq!(s.registry.running_count(), 1);
    }

    #[test]
    fn failed_context_leaves_the_next_id_free() {
        let mut s = Scheduler::new(1 << 62, never_started).unwrap();

        assert!(matches!(s.new_context(), Err(Error::Resource { .. })));
        assert_eq!(s.registry.next_id(), id(1));
        assert_eq!(s.registry.len(), 1);

        let stack = Stack::new(MIN_STACK_SIZE).unwrap();
        let context = ExecutionContext::with_entry(stack, never_started).unwrap();
        let (spawned, _switch) = s.spawn(context, Box::new(|| {}));
        assert_eq!(spawned, id(1));
    }

    #[test]
    fn yield_cycles_in_creation_order() {
        let mut s = scheduler();
        spawn_noop(&mut s);
        spawn_noop(&mut s);

        let mut order = Vec::new();
        for _ in 0..6 {
            let _switch = s.yield_now().unwrap();
            order.push(s.current().as_u64());
        }

        assert_eq!(order, [0, 1, 2, 0, 1, 2]);
        assert_eq!(s.registry.running_count(), 1);
    }

    #[test]
    fn yield_alone_keeps_running() {
        let mut s = scheduler();

        assert!(matches!(s.yield_now(), Err(Error::NoRunnableThread)));
        assert_eq!(s.current(), ThreadId::BOOTSTRAP);
        assert_eq!(s.state(ThreadId::BOOTSTRAP), Some(ThreadState::Running));
        assert!(s.preempt().is_none());
    }

    #[test]
    fn preempt_behaves_like_yield() {
        let mut s = scheduler();
        let worker = spawn_noop(&mut s);

        assert!(s.preempt().is_some());
        assert_eq!(s.current(), ThreadId::BOOTSTRAP);
        assert_eq!(s.state(worker), Some(ThreadState::Ready));
    }

    #[test]
    fn entry_is_taken_once() {
        let mut s = scheduler();
        let worker = spawn_noop(&mut s);

        let (taken, _entry) = s.take_entry().unwrap();
        assert_eq!(taken, worker);
        assert!(s.take_entry().is_none());
    }
}
