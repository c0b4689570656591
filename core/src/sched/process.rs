use std::rc::Rc;

use crate::error::RuntimeError;
use crate::val::Val;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Ready,
    Running,
    Blocked,
    Suspended,
    Terminated,
}

impl ProcState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcState::Ready => "ready",
            ProcState::Running => "running",
            ProcState::Blocked => "blocked",
            ProcState::Suspended => "suspended",
            ProcState::Terminated => "terminated",
        }
    }
}

/// Per-process bookkeeping the scheduler and the process-control natives
/// share. The VM state itself (work queue, eval stack, activations) lives
/// in the process's `Interp`, registered separately so a native running
/// inside a process can read its own metadata without re-borrowing its
/// interpreter.
#[derive(Debug)]
pub struct ProcMeta {
    pub pid: u64,
    pub name: Rc<str>,
    pub state: ProcState,
    pub priority: i64,
    /// Final value once terminated; the error instead when the process
    /// died raising.
    pub result: Val,
    pub error: Option<RuntimeError>,
    /// The Process instance handed out by `fork:`; kept here so
    /// `Processor activeProcess` returns the same object identity.
    pub handle: Val,
}

impl ProcMeta {
    pub fn new(pid: u64, name: Rc<str>) -> Self {
        Self {
            pid,
            name,
            state: ProcState::Ready,
            priority: 0,
            result: Val::Nil,
            error: None,
            handle: Val::Nil,
        }
    }
}
