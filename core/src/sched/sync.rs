use std::collections::VecDeque;

use crate::val::Val;

/// Reentrant mutual-exclusion region. A process that cannot acquire parks
/// in `waiters`; release hands the region to the first wakeable waiter,
/// whose `critical:` send re-executes from scratch and re-examines the
/// lock before committing.
#[derive(Debug, Default)]
pub struct MonitorCore {
    pub owner: Option<u64>,
    pub depth: u32,
    pub waiters: VecDeque<u64>,
}

impl MonitorCore {
    /// Acquire or re-enter; false means the caller must block.
    pub fn try_acquire(&mut self, pid: u64) -> bool {
        match self.owner {
            None => {
                self.owner = Some(pid);
                self.depth = 1;
                true
            }
            Some(owner) if owner == pid => {
                self.depth += 1;
                true
            }
            Some(_) => false,
        }
    }

    /// Leave one nesting level; fully released at depth 0.
    pub fn exit(&mut self) -> bool {
        debug_assert!(self.owner.is_some());
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.owner = None;
            true
        } else {
            false
        }
    }
}

/// Counting semaphore. `signal` banks a permit and wakes one waiter; the
/// waiter's re-executed `wait` takes the permit, or parks again if another
/// process got there first.
#[derive(Debug, Default)]
pub struct SemaphoreCore {
    pub count: i64,
    pub waiters: VecDeque<u64>,
}

impl SemaphoreCore {
    pub fn with_count(count: i64) -> Self {
        Self {
            count,
            waiters: VecDeque::new(),
        }
    }

    /// Take a permit if one is banked.
    pub fn try_wait(&mut self) -> bool {
        if self.count > 0 {
            self.count -= 1;
            true
        } else {
            false
        }
    }

    pub fn signal(&mut self) {
        self.count += 1;
    }
}

/// FIFO queue whose `get` blocks on empty; `put:` wakes one getter.
#[derive(Debug, Default)]
pub struct SharedQueueCore {
    pub items: VecDeque<Val>,
    pub waiters: VecDeque<u64>,
}

impl SharedQueueCore {
    pub fn put(&mut self, value: Val) {
        self.items.push_back(value);
    }

    pub fn try_get(&mut self) -> Option<Val> {
        self.items.pop_front()
    }
}
