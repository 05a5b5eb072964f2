//! # Tick Scheduler
//!
//! Deferred work keyed on the world tick clock. Tasks are tagged values, not
//! closures, so the dispatcher decides at fire time what each one touches and
//! can check that its target still exists. Nothing is ever removed from the
//! queue early; a task whose target is gone simply does nothing when it fires.

use crate::types::{NodeId, RegionId};
use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Work item carried by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledTask {
    /// A propagating signal reaches `node`
    ActivateNode { node: NodeId, strength: u8 },
    /// The activation window of `node` is over
    DeactivateNode { node: NodeId },
    /// Release `region` if it has been idle past its lifetime
    ReleaseCheck { region: RegionId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Scheduled {
    fire_at: u64,
    seq: u64,
    task: ScheduledTask,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier tick first, then insertion order
        (self.fire_at, self.seq).cmp(&(other.fire_at, other.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    current_tick: u64,
    next_seq: u64,
    pending: BinaryHeap<Reverse<Scheduled>>,
}

/// Min-heap of tasks ordered by the tick they fire on.
///
/// Tasks scheduled for the same tick fire in the order they were scheduled.
/// Time only moves when [`advance`](Self::advance) is called.
#[derive(Debug, Default)]
pub struct TickScheduler {
    state: Mutex<SchedulerState>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_tick(&self) -> u64 {
        self.state.lock().current_tick
    }

    /// Queues `task` to fire `delay` ticks from now. Returns the firing tick.
    ///
    /// A delay of zero fires on the next call to [`advance`](Self::advance).
    pub fn schedule(&self, delay: u64, task: ScheduledTask) -> u64 {
        let mut state = self.state.lock();
        let fire_at = state.current_tick.saturating_add(delay);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(Reverse(Scheduled { fire_at, seq, task }));
        fire_at
    }

    /// Moves the clock forward one tick and hands back every task now due,
    /// in firing order. The lock is released before the caller runs them, so
    /// running a task may schedule further work.
    pub fn advance(&self) -> (u64, Vec<ScheduledTask>) {
        let mut state = self.state.lock();
        state.current_tick += 1;
        let tick = state.current_tick;

        let mut due = Vec::new();
        while state
            .pending
            .peek()
            .is_some_and(|Reverse(next)| next.fire_at <= tick)
        {
            if let Some(Reverse(entry)) = state.pending.pop() {
                due.push(entry.task);
            }
        }
        (tick, due)
    }

    /// Firing tick of the earliest pending task.
    pub fn next_due(&self) -> Option<u64> {
        self.state
            .lock()
            .pending
            .peek()
            .map(|Reverse(next)| next.fire_at)
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Drops every pending task. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activate(id: u64) -> ScheduledTask {
        ScheduledTask::ActivateNode {
            node: NodeId(id),
            strength: 15,
        }
    }

    #[test]
    fn test_tasks_fire_on_their_tick() {
        let scheduler = TickScheduler::new();
        assert_eq!(scheduler.schedule(3, activate(1)), 3);
        assert_eq!(scheduler.schedule(1, activate(2)), 1);

        assert_eq!(scheduler.advance(), (1, vec![activate(2)]));
        assert_eq!(scheduler.advance(), (2, vec![]));
        assert_eq!(scheduler.advance(), (3, vec![activate(1)]));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_same_tick_fires_in_schedule_order() {
        let scheduler = TickScheduler::new();
        scheduler.schedule(2, activate(3));
        scheduler.schedule(2, activate(1));
        scheduler.schedule(2, ScheduledTask::DeactivateNode { node: NodeId(3) });

        scheduler.advance();
        let (_, due) = scheduler.advance();
        assert_eq!(
            due,
            vec![
                activate(3),
                activate(1),
                ScheduledTask::DeactivateNode { node: NodeId(3) },
            ]
        );
    }

    #[test]
    fn test_delay_is_relative_to_current_tick() {
        let scheduler = TickScheduler::new();
        for _ in 0..10 {
            scheduler.advance();
        }
        assert_eq!(scheduler.schedule(5, activate(1)), 15);
        assert_eq!(scheduler.next_due(), Some(15));
    }

    #[test]
    fn test_zero_delay_fires_next_advance() {
        let scheduler = TickScheduler::new();
        scheduler.schedule(0, activate(1));
        assert_eq!(scheduler.advance().1, vec![activate(1)]);
    }

    #[test]
    fn test_clear() {
        let scheduler = TickScheduler::new();
        scheduler.schedule(1, activate(1));
        scheduler.schedule(4, activate(2));
        assert_eq!(scheduler.clear(), 2);
        assert_eq!(scheduler.next_due(), None);
        assert!(scheduler.advance().1.is_empty());
    }
}
