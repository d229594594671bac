use super::tcb::{Tcb, ThreadId, ThreadState};

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

/// Every thread control block ever created, in creation order.
///
/// Ids are dense from `0`, so the backing vector is indexed by id and
/// appending is O(1). Two indices sit next to it:
///
/// - `ready`: the Ready ids, ordered, so "first Ready thread after me,
///   wrapping to the head" is a range query instead of a ring scan;
/// - `joiners`: for each join target, the ids blocked on it.
///
/// All state changes go through [`set_state`](Self::set_state) or the join
/// helpers so the indices always agree with the blocks.
pub(crate) struct Registry {
    threads: Vec<Tcb>,
    ready: BTreeSet<ThreadId>,
    joiners: HashMap<ThreadId, Vec<ThreadId>>,
}

impl Registry {
    /// Creates a registry whose head (and tail) is the bootstrap thread.
    pub(crate) fn new(bootstrap: Tcb) -> Self {
        debug_assert_eq!(bootstrap.id, ThreadId::BOOTSTRAP);

        let mut registry = Self {
            threads: Vec::new(),
            ready: BTreeSet::new(),
            joiners: HashMap::new(),
        };
        registry.push(bootstrap);
        registry
    }

    /// Id the next appended thread must carry.
    pub(crate) fn next_id(&self) -> ThreadId {
        ThreadId::from_u64(self.threads.len() as u64)
    }

    /// Appends a block at the tail.
    ///
    /// # Panics
    ///
    /// Panics if `tcb.id` is not [`next_id`](Self::next_id).
    pub(crate) fn push(&mut self, tcb: Tcb) {
        assert_eq!(tcb.id, self.next_id(), "thread ids must be sequential");

        if tcb.state == ThreadState::Ready {
            self.ready.insert(tcb.id);
        }
        self.threads.push(tcb);
    }

    pub(crate) fn len(&self) -> usize {
        self.threads.len()
    }

    pub(crate) fn get(&self, id: ThreadId) -> Option<&Tcb> {
        self.threads.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: ThreadId) -> Option<&mut Tcb> {
        self.threads.get_mut(id.index())
    }

    pub(crate) fn state(&self, id: ThreadId) -> Option<ThreadState> {
        self.get(id).map(|t| t.state)
    }

    /// Moves a thread to `state`, keeping the ready index in sync.
    ///
    /// # Panics
    ///
    /// Panics if `id` is unknown or the thread is already Terminated.
    pub(crate) fn set_state(&mut self, id: ThreadId, state: ThreadState) {
        let tcb = &mut self.threads[id.index()];
        assert_ne!(
            tcb.state,
            ThreadState::Terminated,
            "terminated threads never change state"
        );

        tcb.state = state;

        if state == ThreadState::Ready {
            self.ready.insert(id);
        } else {
            self.ready.remove(&id);
        }
    }

    /// First Ready thread after `id` in creation order, wrapping at the
    /// tail. `id` itself is never returned.
    pub(crate) fn next_ready_after(&self, id: ThreadId) -> Option<ThreadId> {
        self.ready
            .range((Bound::Excluded(id), Bound::Unbounded))
            .next()
            .or_else(|| self.ready.range(..id).next())
            .copied()
    }

    /// Blocks `waiter` on `target`.
    pub(crate) fn wait_on(&mut self, waiter: ThreadId, target: ThreadId) {
        self.set_state(waiter, ThreadState::Waiting);
        self.threads[waiter.index()].waiting_for = Some(target);
        self.joiners.entry(target).or_default().push(waiter);
    }

    /// Moves every thread blocked on `target` back to Ready.
    ///
    /// Returns how many threads were woken.
    pub(crate) fn wake_joiners(&mut self, target: ThreadId) -> usize {
        let Some(waiters) = self.joiners.remove(&target) else {
            return 0;
        };

        let mut woken = 0;
        for waiter in waiters {
            let tcb = &mut self.threads[waiter.index()];
            if tcb.state == ThreadState::Waiting && tcb.waiting_for == Some(target) {
                tcb.waiting_for = None;
                self.set_state(waiter, ThreadState::Ready);
                woken += 1;
            }
        }

        woken
    }

    /// Whether following wait edges from `from` ends at `to`.
    ///
    /// Each thread waits on at most one other, so the edges form chains; the
    /// walk is bounded by the number of threads in case of an existing cycle.
    pub(crate) fn wait_chain_reaches(&self, from: ThreadId, to: ThreadId) -> bool {
        let mut cursor = Some(from);

        for _ in 0..self.threads.len() {
            match cursor {
                Some(id) if id == to => return true,
                Some(id) => cursor = self.get(id).and_then(|t| t.waiting_for),
                None => return false,
            }
        }

        false
    }

    /// Number of threads currently blocked in `join`.
    pub(crate) fn waiting_count(&self) -> usize {
        self.threads
            .iter()
            .filter(|t| t.state == ThreadState::Waiting)
            .count()
    }

    /// Number of threads that have not terminated.
    pub(crate) fn live_count(&self) -> usize {
        self.threads
            .iter()
            .filter(|t| t.state != ThreadState::Terminated)
            .count()
    }

    /// Number of threads in the Running state.
    #[cfg(test)]
    pub(crate) fn running_count(&self) -> usize {
        self.threads
            .iter()
            .filter(|t| t.state == ThreadState::Running)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context::ExecutionContext;

    fn id(n: u64) -> ThreadId {
        ThreadId::from_u64(n)
    }

    fn registry_with(count: u64) -> Registry {
        let mut registry = Registry::new(Tcb::bootstrap(Box::new(ExecutionContext::blank())));
        for n in 1..count {
            registry.push(Tcb::spawned(
                id(n),
                Box::new(ExecutionContext::blank()),
                Box::new(|| {}),
            ));
        }
        registry
    }

    #[test]
    fn ids_are_sequential_from_bootstrap() {
        let registry = registry_with(4);

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.next_id(), id(4));
        assert_eq!(registry.state(id(0)), Some(ThreadState::Running));
        assert_eq!(registry.state(id(3)), Some(ThreadState::Ready));
        assert_eq!(registry.state(id(4)), None);
    }

    #[test]
    #[should_panic(expected = "thread ids must be sequential")]
    fn push_rejects_out_of_order_ids() {
        let mut registry = registry_with(1);
        registry.push(Tcb::spawned(
            id(7),
            Box::new(ExecutionContext::blank()),
            Box::new(|| {}),
        ));
    }

    #[test]
    fn next_ready_wraps_around_and_skips_caller() {
        let mut registry = registry_with(4);
        registry.set_state(id(2), ThreadState::Waiting);

        assert_eq!(registry.next_ready_after(id(0)), Some(id(1)));
        assert_eq!(registry.next_ready_after(id(1)), Some(id(3)));
        assert_eq!(registry.next_ready_after(id(3)), Some(id(1)));

        registry.set_state(id(1), ThreadState::Running);
        registry.set_state(id(0), ThreadState::Ready);
        assert_eq!(registry.next_ready_after(id(3)), Some(id(0)));
    }

    #[test]
    fn next_ready_ignores_the_only_ready_thread_when_it_is_the_caller() {
        let mut registry = registry_with(2);
        registry.set_state(id(0), ThreadState::Waiting);

        assert!(registry.ready.contains(&id(1)));
        assert_eq!(registry.next_ready_after(id(1)), None);
        assert_eq!(registry.next_ready_after(id(0)), Some(id(1)));
    }

    #[test]
    fn wake_joiners_releases_every_waiter_on_target() {
        let mut registry = registry_with(4);
        registry.wait_on(id(0), id(3));
        registry.wait_on(id(1), id(3));
        registry.wait_on(id(2), id(1));

        assert_eq!(registry.waiting_count(), 3);
        assert_eq!(registry.wake_joiners(id(3)), 2);

        assert_eq!(registry.state(id(0)), Some(ThreadState::Ready));
        assert_eq!(registry.state(id(1)), Some(ThreadState::Ready));
        assert_eq!(registry.get(id(0)).unwrap().waiting_for, None);
        assert_eq!(registry.state(id(2)), Some(ThreadState::Waiting));
        assert_eq!(registry.wake_joiners(id(3)), 0);
    }

    #[test]
    fn wait_chain_detects_cycles() {
        let mut registry = registry_with(4);
        registry.wait_on(id(1), id(2));
        registry.wait_on(id(2), id(3));

        assert!(registry.wait_chain_reaches(id(1), id(3)));
        assert!(registry.wait_chain_reaches(id(2), id(2)));
        assert!(!registry.wait_chain_reaches(id(3), id(1)));
        assert!(!registry.wait_chain_reaches(id(1), id(0)));
    }

    #[test]
    fn at_most_one_thread_is_running() {
        let mut registry = registry_with(3);
        assert_eq!(registry.running_count(), 1);

        registry.set_state(id(0), ThreadState::Ready);
        registry.set_state(id(2), ThreadState::Running);
        assert_eq!(registry.running_count(), 1);
        assert!(!registry.ready.contains(&id(2)));
        assert_eq!(registry.live_count(), 3);
    }

    #[test]
    #[should_panic(expected = "terminated threads never change state")]
    fn terminated_is_absorbing() {
        let mut registry = registry_with(2);
        registry.set_state(id(1), ThreadState::Terminated);
        registry.set_state(id(1), ThreadState::Ready);
    }
}
