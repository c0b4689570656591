use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{RtResult, RuntimeError};
use crate::sched::{ProcMeta, ProcState};
use crate::util::fast_map::FastHashMap;
use crate::val::Val;
use crate::vm::{Interp, RunState};

pub type SchedRef = Rc<RefCell<SchedulerCore>>;

/// What one scheduler step observed about the process it ran.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(Val),
    Yielded,
    Blocked,
    Failed(RuntimeError),
    /// The process was not in a runnable state (or was the caller itself).
    Skipped,
}

/// Single-threaded cooperative scheduler state. Interpreters and metadata
/// are registered side by side so process-control natives can read another
/// process's state without touching its interpreter.
pub struct SchedulerCore {
    metas: FastHashMap<u64, Rc<RefCell<ProcMeta>>>,
    interps: FastHashMap<u64, Rc<RefCell<Interp>>>,
    ready: VecDeque<u64>,
    blocked: Vec<u64>,
    active: Option<u64>,
    main_pid: Option<u64>,
    next_pid: u64,
}

impl SchedulerCore {
    pub fn new() -> SchedRef {
        Rc::new(RefCell::new(Self {
            metas: FastHashMap::default(),
            interps: FastHashMap::default(),
            ready: VecDeque::new(),
            blocked: Vec::new(),
            active: None,
            main_pid: None,
            next_pid: 1,
        }))
    }

    /// Register a process. The main process is not queued: it is driven by
    /// the eval entry points and only joins the ready queue when it has
    /// work.
    pub fn register(
        &mut self,
        name: Option<Rc<str>>,
        interp: Rc<RefCell<Interp>>,
        is_main: bool,
    ) -> u64 {
        let pid = self.next_pid;
        self.next_pid += 1;
        let name = name.unwrap_or_else(|| Rc::from(format!("process-{}", pid)));
        let meta = Rc::new(RefCell::new(ProcMeta::new(pid, name)));
        self.metas.insert(pid, meta);
        self.interps.insert(pid, interp);
        if is_main {
            self.main_pid = Some(pid);
        } else {
            self.ready.push_back(pid);
        }
        debug!(pid, is_main, "process registered");
        pid
    }

    pub fn main_pid(&self) -> u64 {
        self.main_pid.unwrap_or(0)
    }

    pub fn meta(&self, pid: u64) -> Option<Rc<RefCell<ProcMeta>>> {
        self.metas.get(&pid).cloned()
    }

    pub fn interp(&self, pid: u64) -> Option<Rc<RefCell<Interp>>> {
        self.interps.get(&pid).cloned()
    }

    pub fn active(&self) -> Option<u64> {
        self.active
    }

    pub fn set_active(&mut self, pid: Option<u64>) -> Option<u64> {
        std::mem::replace(&mut self.active, pid)
    }

    /// Queue a process as ready (idempotent).
    pub fn push_ready(&mut self, pid: u64) {
        if let Some(meta) = self.metas.get(&pid) {
            meta.borrow_mut().state = ProcState::Ready;
        }
        self.blocked.retain(|p| *p != pid);
        if !self.ready.contains(&pid) {
            self.ready.push_back(pid);
        }
    }

    /// Pop the next runnable pid: round-robin order, except that a strictly
    /// higher-priority process goes first when priorities differ.
    pub fn take_next_ready(&mut self, exclude: Option<u64>) -> Option<u64> {
        let mut best: Option<(usize, i64)> = None;
        for (idx, pid) in self.ready.iter().enumerate() {
            if Some(*pid) == exclude {
                continue;
            }
            let Some(meta) = self.metas.get(pid) else {
                continue;
            };
            if meta.borrow().state != ProcState::Ready {
                continue;
            }
            let priority = meta.borrow().priority;
            match best {
                Some((_, best_priority)) if best_priority >= priority => {}
                _ => best = Some((idx, priority)),
            }
        }
        let (idx, _) = best?;
        self.ready.remove(idx)
    }

    /// Move a blocked process back to ready. False when the pid is gone or
    /// not blocked (terminated waiters are skipped this way).
    pub fn wake(&mut self, pid: u64) -> bool {
        let Some(meta) = self.metas.get(&pid) else {
            return false;
        };
        if meta.borrow().state != ProcState::Blocked {
            return false;
        }
        trace!(pid, "wake");
        self.push_ready(pid);
        true
    }

    /// Wake the first waiter that is still wakeable.
    pub fn wake_first(&mut self, waiters: &mut VecDeque<u64>) -> bool {
        while let Some(pid) = waiters.pop_front() {
            if self.wake(pid) {
                return true;
            }
        }
        false
    }

    pub fn mark_blocked(&mut self, pid: u64) {
        if let Some(meta) = self.metas.get(&pid) {
            meta.borrow_mut().state = ProcState::Blocked;
        }
        self.ready.retain(|p| *p != pid);
        if !self.blocked.contains(&pid) {
            self.blocked.push(pid);
        }
    }

    /// Terminate: drop queued work and discard the VM state. Safe to call
    /// on the active process, whose interpreter unwinds itself.
    pub fn terminate(&mut self, pid: u64) {
        if let Some(meta) = self.metas.get(&pid) {
            meta.borrow_mut().state = ProcState::Terminated;
        }
        self.ready.retain(|p| *p != pid);
        self.blocked.retain(|p| *p != pid);
        if self.active != Some(pid) {
            if let Some(interp) = self.interps.get(&pid) {
                if let Ok(mut interp) = interp.try_borrow_mut() {
                    interp.discard_state();
                }
            }
        }
    }

    pub fn suspend(&mut self, pid: u64) {
        if let Some(meta) = self.metas.get(&pid) {
            let mut meta = meta.borrow_mut();
            if matches!(meta.state, ProcState::Ready | ProcState::Running | ProcState::Blocked) {
                meta.state = ProcState::Suspended;
            }
        }
        self.ready.retain(|p| *p != pid);
        self.blocked.retain(|p| *p != pid);
    }

    pub fn resume(&mut self, pid: u64) {
        let Some(meta) = self.metas.get(&pid) else {
            return;
        };
        if meta.borrow().state == ProcState::Suspended {
            self.push_ready(pid);
        }
    }

    /// True when nothing can run but blocked processes remain: no wake-up
    /// is possible without an outside signal, which cannot come.
    pub fn deadlocked(&self) -> bool {
        self.ready.is_empty()
            && self.blocked.iter().any(|pid| {
                self.metas
                    .get(pid)
                    .is_some_and(|m| m.borrow().state == ProcState::Blocked)
            })
    }

    pub fn blocked_pids(&self) -> Vec<u64> {
        self.blocked.clone()
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Drop every registered process. Breaks the `Interp` -> scheduler
    /// reference cycle when the owning VM is dropped.
    pub fn clear(&mut self) {
        self.metas.clear();
        self.interps.clear();
        self.ready.clear();
        self.blocked.clear();
        self.active = None;
    }
}

/// Run one process until it yields, blocks, completes or fails, updating
/// its state. Re-entrant: a native `Scheduler step` inside a running
/// process nests safely as long as it never steps the caller itself.
pub fn step_process(sched: &SchedRef, pid: u64) -> RunOutcome {
    let (interp, meta) = {
        let core = sched.borrow();
        let Some(interp) = core.interp(pid) else {
            return RunOutcome::Skipped;
        };
        let Some(meta) = core.meta(pid) else {
            return RunOutcome::Skipped;
        };
        (interp, meta)
    };
    if meta.borrow().state != ProcState::Ready {
        return RunOutcome::Skipped;
    }
    let Ok(mut interp) = interp.try_borrow_mut() else {
        // The caller tried to step itself.
        return RunOutcome::Skipped;
    };

    meta.borrow_mut().state = ProcState::Running;
    let prev_active = sched.borrow_mut().set_active(Some(pid));
    let state = interp.run();
    sched.borrow_mut().set_active(prev_active);
    drop(interp);

    let is_main = sched.borrow().main_pid() == pid;
    match state {
        RunState::Completed(value) => {
            trace!(pid, "process completed");
            let mut m = meta.borrow_mut();
            m.result = value.clone();
            // The main process idles between eval requests instead of
            // terminating.
            if is_main {
                m.state = ProcState::Ready;
            } else {
                m.state = ProcState::Terminated;
            }
            RunOutcome::Completed(value)
        }
        RunState::Yielded => {
            if meta.borrow().state == ProcState::Running {
                sched.borrow_mut().push_ready(pid);
            }
            RunOutcome::Yielded
        }
        RunState::Blocked => {
            sched.borrow_mut().mark_blocked(pid);
            RunOutcome::Blocked
        }
        RunState::Failed(err) => {
            debug!(pid, %err, "process failed");
            let mut m = meta.borrow_mut();
            m.state = ProcState::Terminated;
            m.result = Val::str(err.to_string());
            m.error = Some(err.clone());
            RunOutcome::Failed(err)
        }
        RunState::Terminated => {
            let mut m = meta.borrow_mut();
            m.state = ProcState::Terminated;
            RunOutcome::Completed(m.result.clone())
        }
    }
}

/// Step until both the ready queue and the blocked list drain. Blocked
/// processes with no runnable peer are a deadlock; `max_steps` bounds
/// runaway programs.
pub fn run_to_completion(sched: &SchedRef, max_steps: u64) -> RtResult<()> {
    let main_pid = sched.borrow().main_pid();
    let mut steps: u64 = 0;
    loop {
        let pid = sched.borrow_mut().take_next_ready(Some(main_pid));
        match pid {
            Some(pid) => {
                step_process(sched, pid);
                steps += 1;
                if steps >= max_steps {
                    return Err(RuntimeError::scheduler(format!(
                        "scheduler exceeded {} steps without quiescing",
                        max_steps
                    )));
                }
            }
            None => {
                let core = sched.borrow();
                if core.deadlocked() {
                    let pids = core.blocked_pids();
                    return Err(RuntimeError::scheduler(format!(
                        "deadlock: processes {:?} are blocked with no possible wake-up",
                        pids
                    )));
                }
                return Ok(());
            }
        }
    }
}
