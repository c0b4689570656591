//! Work-queue VM subsystem
//!
//! The interpreter evaluates AST nodes through an explicit work queue so no
//! host recursion is involved; any step can suspend to the cooperative
//! scheduler and resume later. `Vm` bundles the shared state (globals,
//! kernel, scheduler, config) and the eval entry points.

mod activation;
mod control;
mod dispatch;
mod frames;
mod globals;
mod interp;

pub use activation::{capture_block, Activation, ActivationRef};
pub use frames::{SendMode, WorkFrame};
pub use globals::{Globals, GlobalsRef};
pub use interp::{Interp, RunState};

#[cfg(test)]
mod vm_test;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::ast::{Node, Parser};
use crate::error::{RtResult, RuntimeError};
use crate::kernel::{self, Kernel};
use crate::obj::{Instance, Method, NativeHandle};
use crate::sched::{self, step_process, RunOutcome, SchedRef, SchedulerCore};
use crate::val::Val;

/// Method lookup as the dispatcher performs it, for natives that need to
/// ask (`respondsTo:`, tooling).
pub fn dispatch_lookup(interp: &Interp, receiver: &Val, selector: &str) -> Option<Rc<Method>> {
    dispatch::lookup_method(interp, receiver, selector)
}

/// Tunables shared by every process of a VM.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Make every message send a yield point. Off by default: only explicit
    /// yields and blocking sync operations suspend.
    pub yield_on_send: bool,
    /// Nesting bound for native -> interpreted re-entry.
    pub max_reentry_depth: usize,
    /// Step bound for `run_to_completion`, against runaway programs.
    pub max_process_steps: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            yield_on_send: false,
            max_reentry_depth: 64,
            max_process_steps: 50_000_000,
        }
    }
}

/// A complete virtual machine: shared globals and kernel, the cooperative
/// scheduler, and a resident main process that the eval entry points
/// drive.
pub struct Vm {
    globals: GlobalsRef,
    kernel: Rc<Kernel>,
    sched: SchedRef,
    config: Rc<VmConfig>,
    main_pid: u64,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let config = Rc::new(config);
        let globals = Globals::new();
        let sched = SchedulerCore::new();
        let kernel = kernel::bootstrap(&globals).expect("kernel bootstrap is consistent");
        let interp = Interp::new(globals.clone(), kernel.clone(), sched.clone(), config.clone());
        let interp = Rc::new(RefCell::new(interp));
        let main_pid = sched
            .borrow_mut()
            .register(Some(Rc::from("main")), interp.clone(), true);
        interp.borrow_mut().set_pid(main_pid);
        let handle = Val::Instance(Instance::new_handle(
            &kernel.classes.process,
            NativeHandle::Process(main_pid),
        ));
        if let Some(meta) = sched.borrow().meta(main_pid) {
            meta.borrow_mut().handle = handle;
        }
        Self {
            globals,
            kernel,
            sched,
            config,
            main_pid,
        }
    }

    pub fn globals(&self) -> &GlobalsRef {
        &self.globals
    }

    pub fn kernel(&self) -> &Rc<Kernel> {
        &self.kernel
    }

    pub fn sched(&self) -> &SchedRef {
        &self.sched
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn main_interp(&self) -> Rc<RefCell<Interp>> {
        self.sched
            .borrow()
            .interp(self.main_pid)
            .expect("main process is registered")
    }

    /// Evaluate source text statement by statement; returns one value per
    /// statement. Forked processes run whenever the main process yields or
    /// blocks; they may outlive the call (see `run_to_completion`).
    pub fn eval_statements(&mut self, source: &str) -> RtResult<Vec<Val>> {
        let stmts =
            Parser::parse_source(source).map_err(|e| RuntimeError::parse(e.to_string()))?;
        let interp = self.main_interp();
        {
            let mut i = interp.borrow_mut();
            i.stack.clear();
            for stmt in stmts.iter().rev() {
                i.work.push(WorkFrame::EvalNode(stmt.clone()));
            }
        }
        self.drive_main()?;
        let values = {
            let mut i = interp.borrow_mut();
            std::mem::take(&mut i.stack)
        };
        debug!(statements = stmts.len(), values = values.len(), "eval done");
        Ok(values)
    }

    /// Evaluate and return only the last value.
    pub fn doit(&mut self, source: &str) -> RtResult<Val> {
        let mut values = self.eval_statements(source)?;
        Ok(values.pop().unwrap_or(Val::Nil))
    }

    /// Script entry: strips a shebang line; a source that is a single
    /// parameterless block literal is applied with `self = nil`, and `^`
    /// inside it terminates the script with that value.
    pub fn eval_script(&mut self, source: &str) -> RtResult<Val> {
        let source = strip_shebang(source);
        let stmts =
            Parser::parse_source(source).map_err(|e| RuntimeError::parse(e.to_string()))?;
        if let [stmt] = stmts.as_slice() {
            if let Node::Block(template) = stmt.as_ref() {
                if template.parameters.is_empty() {
                    let block = capture_block(template, None);
                    let interp = self.main_interp();
                    {
                        let mut i = interp.borrow_mut();
                        i.stack.clear();
                        i.work.push(WorkFrame::ApplyBlock { block, argc: 0 });
                    }
                    self.drive_main()?;
                    let mut i = interp.borrow_mut();
                    let value = i.stack.pop().unwrap_or(Val::Nil);
                    i.stack.clear();
                    return Ok(value);
                }
            }
        }
        self.doit(source)
    }

    /// Round-robin the main process and everything forked until the main
    /// work queue drains.
    fn drive_main(&mut self) -> RtResult<()> {
        self.sched.borrow_mut().push_ready(self.main_pid);
        loop {
            let next = self.sched.borrow_mut().take_next_ready(None);
            match next {
                Some(pid) => {
                    let outcome = step_process(&self.sched, pid);
                    if pid == self.main_pid {
                        match outcome {
                            RunOutcome::Completed(_) => return Ok(()),
                            RunOutcome::Failed(err) => return Err(err),
                            _ => {}
                        }
                    }
                }
                None => {
                    if self.sched.borrow().deadlocked() {
                        return Err(RuntimeError::scheduler(
                            "deadlock: all processes are blocked with no possible wake-up",
                        ));
                    }
                    return Err(RuntimeError::internal(
                        "main process stalled without completing",
                    ));
                }
            }
        }
    }

    /// Step forked processes until ready and blocked drain; deadlock is an
    /// error.
    pub fn run_to_completion(&mut self) -> RtResult<()> {
        sched::run_to_completion(&self.sched, self.config.max_process_steps)
    }

    /// (work queue, eval stack, activation stack) depths of the main
    /// process, for invariant checks.
    pub fn main_depths(&self) -> (usize, usize, usize) {
        let interp = self.main_interp();
        let i = interp.borrow();
        (i.work.len(), i.stack.len(), i.acts.len())
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

// Interpreters hold the scheduler, and the scheduler holds interpreters;
// clearing the tables on drop breaks the cycle.
impl Drop for Vm {
    fn drop(&mut self) {
        self.sched.borrow_mut().clear();
    }
}

fn strip_shebang(source: &str) -> &str {
    if let Some(rest) = source.strip_prefix("#!") {
        match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => "",
        }
    } else {
        source
    }
}
