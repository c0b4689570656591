use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::error::{RtResult, RuntimeError};
use crate::kernel::{expect_args, install_class_raw, install_raw, name_arg, KernelClasses};
use crate::obj::{Instance, NativeDef, NativeHandle};
use crate::sched::{run_to_completion, step_process, MonitorCore, SemaphoreCore, SharedQueueCore};
use crate::val::{BlockValue, Val};
use crate::vm::{Interp, WorkFrame};

pub(crate) fn install(classes: &KernelClasses) {
    let process = &classes.process;
    install_raw(process, "state", NativeDef::WithVm(proc_state));
    install_raw(process, "pid", NativeDef::Plain(proc_pid));
    install_raw(process, "name", NativeDef::WithVm(proc_name));
    install_raw(process, "name:", NativeDef::WithVm(proc_set_name));
    install_raw(process, "priority", NativeDef::WithVm(proc_priority));
    install_raw(process, "priority:", NativeDef::WithVm(proc_set_priority));
    install_raw(process, "suspend", NativeDef::WithVm(proc_suspend));
    install_raw(process, "resume", NativeDef::WithVm(proc_resume));
    install_raw(process, "terminate", NativeDef::WithVm(proc_terminate));

    let processor = &classes.processor;
    install_raw(processor, "fork:", NativeDef::WithVm(sched_fork));
    install_raw(processor, "fork:named:", NativeDef::WithVm(sched_fork_named));
    install_raw(processor, "yield", NativeDef::WithVm(sched_yield));
    install_raw(processor, "activeProcess", NativeDef::WithVm(sched_active_process));
    install_raw(processor, "step", NativeDef::WithVm(sched_step));
    install_raw(processor, "run", NativeDef::WithVm(sched_run));

    let monitor = &classes.monitor;
    install_class_raw(monitor, "new", NativeDef::Plain(monitor_new));
    install_raw(monitor, "critical:", NativeDef::WithVm(monitor_critical));

    let semaphore = &classes.semaphore;
    install_class_raw(semaphore, "new", NativeDef::Plain(semaphore_new));
    install_class_raw(semaphore, "forCount:", NativeDef::Plain(semaphore_for_count));
    install_raw(semaphore, "wait", NativeDef::WithVm(semaphore_wait));
    install_raw(semaphore, "signal", NativeDef::WithVm(semaphore_signal));

    let queue = &classes.shared_queue;
    install_class_raw(queue, "new", NativeDef::Plain(queue_new));
    install_raw(queue, "put:", NativeDef::WithVm(queue_put));
    install_raw(queue, "get", NativeDef::WithVm(queue_get));
    install_raw(queue, "isEmpty", NativeDef::Plain(queue_is_empty));
    install_raw(queue, "size", NativeDef::Plain(queue_size));

    let globals = &classes.globals_accessor;
    install_class_raw(globals, "at:", NativeDef::WithVm(globals_at));
    install_class_raw(globals, "at:put:", NativeDef::WithVm(globals_at_put));
    install_class_raw(globals, "includes:", NativeDef::WithVm(globals_includes));
    install_class_raw(globals, "removeKey:", NativeDef::WithVm(globals_remove));
}

// ---- handle plumbing ---------------------------------------------------

fn pid_of(receiver: &Val) -> RtResult<u64> {
    let instance = receiver.as_instance()?;
    let instance = instance.borrow();
    match instance.handle() {
        Some(NativeHandle::Process(pid)) => Ok(*pid),
        _ => Err(RuntimeError::value("not a Process")),
    }
}

fn monitor_of(receiver: &Val) -> RtResult<Rc<RefCell<MonitorCore>>> {
    let instance = receiver.as_instance()?;
    let instance = instance.borrow();
    match instance.handle() {
        Some(NativeHandle::Monitor(core)) => Ok(core.clone()),
        _ => Err(RuntimeError::value("not a Monitor")),
    }
}

fn semaphore_of(receiver: &Val) -> RtResult<Rc<RefCell<SemaphoreCore>>> {
    let instance = receiver.as_instance()?;
    let instance = instance.borrow();
    match instance.handle() {
        Some(NativeHandle::Semaphore(core)) => Ok(core.clone()),
        _ => Err(RuntimeError::value("not a Semaphore")),
    }
}

fn queue_of(receiver: &Val) -> RtResult<Rc<RefCell<SharedQueueCore>>> {
    let instance = receiver.as_instance()?;
    let instance = instance.borrow();
    match instance.handle() {
        Some(NativeHandle::Queue(core)) => Ok(core.clone()),
        _ => Err(RuntimeError::value("not a SharedQueue")),
    }
}

// ---- Process -----------------------------------------------------------

fn proc_state(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let pid = pid_of(receiver)?;
    let state = interp
        .sched()
        .borrow()
        .meta(pid)
        .map(|m| m.borrow().state.as_str())
        .unwrap_or("terminated");
    Ok(Val::str(state))
}

fn proc_pid(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Int(pid_of(receiver)? as i64))
}

fn proc_name(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let pid = pid_of(receiver)?;
    let name = interp
        .sched()
        .borrow()
        .meta(pid)
        .map(|m| m.borrow().name.clone())
        .unwrap_or_else(|| Rc::from(""));
    Ok(Val::Str(name))
}

fn proc_set_name(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("name:", args, 1)?;
    let pid = pid_of(receiver)?;
    let name = name_arg(&args[0])?;
    if let Some(meta) = interp.sched().borrow().meta(pid) {
        meta.borrow_mut().name = name;
    }
    Ok(receiver.clone())
}

fn proc_priority(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let pid = pid_of(receiver)?;
    let priority = interp
        .sched()
        .borrow()
        .meta(pid)
        .map(|m| m.borrow().priority)
        .unwrap_or(0);
    Ok(Val::Int(priority))
}

fn proc_set_priority(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("priority:", args, 1)?;
    let pid = pid_of(receiver)?;
    let priority = args[0].as_int()?;
    if let Some(meta) = interp.sched().borrow().meta(pid) {
        meta.borrow_mut().priority = priority;
    }
    Ok(receiver.clone())
}

fn proc_suspend(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let pid = pid_of(receiver)?;
    interp.sched().borrow_mut().suspend(pid);
    if pid == interp.pid() {
        // Self-suspend: hand control back without requeueing.
        interp.request_yield();
    }
    Ok(receiver.clone())
}

fn proc_resume(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let pid = pid_of(receiver)?;
    interp.sched().borrow_mut().resume(pid);
    Ok(receiver.clone())
}

fn proc_terminate(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let pid = pid_of(receiver)?;
    interp.sched().borrow_mut().terminate(pid);
    if pid == interp.pid() {
        interp.request_terminate();
    }
    Ok(receiver.clone())
}

// ---- ProcessorScheduler ------------------------------------------------

/// Allocate a fresh per-process VM state whose initial work is applying
/// the block with no arguments, and register it ready.
pub(crate) fn spawn_process(
    interp: &mut Interp,
    block: Rc<BlockValue>,
    name: Option<Rc<str>>,
) -> RtResult<Val> {
    let mut child = interp.fork_child();
    child.work.push(WorkFrame::ApplyBlock { block, argc: 0 });
    let child = Rc::new(RefCell::new(child));
    let sched = interp.sched().clone();
    let pid = sched.borrow_mut().register(name, child.clone(), false);
    child.borrow_mut().set_pid(pid);
    let handle = Val::Instance(Instance::new_handle(
        &interp.kernel().classes.process,
        NativeHandle::Process(pid),
    ));
    if let Some(meta) = sched.borrow().meta(pid) {
        meta.borrow_mut().handle = handle.clone();
    }
    debug!(pid, "forked process");
    Ok(handle)
}

fn sched_fork(interp: &mut Interp, _receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("fork:", args, 1)?;
    let block = args[0].as_block()?.clone();
    spawn_process(interp, block, None)
}

fn sched_fork_named(interp: &mut Interp, _receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("fork:named:", args, 2)?;
    let block = args[0].as_block()?.clone();
    let name = name_arg(&args[1])?;
    spawn_process(interp, block, Some(name))
}

fn sched_yield(interp: &mut Interp, _receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    interp.request_yield();
    Ok(Val::Nil)
}

fn sched_active_process(interp: &mut Interp, _receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let handle = interp
        .sched()
        .borrow()
        .meta(interp.pid())
        .map(|m| m.borrow().handle.clone())
        .unwrap_or(Val::Nil);
    Ok(handle)
}

/// Run one other ready process until it yields, blocks or finishes. A
/// no-op when nothing else is runnable.
fn sched_step(interp: &mut Interp, _receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let sched = interp.sched().clone();
    let next = sched.borrow_mut().take_next_ready(Some(interp.pid()));
    if let Some(pid) = next {
        step_process(&sched, pid);
    }
    Ok(Val::Nil)
}

/// Drain every other process; a deadlock among them surfaces here as a
/// catchable scheduler error.
fn sched_run(interp: &mut Interp, _receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let sched = interp.sched().clone();
    let max_steps = interp.config().max_process_steps;
    run_to_completion(&sched, max_steps)?;
    Ok(Val::Nil)
}

// ---- Monitor -----------------------------------------------------------

fn monitor_new(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    Ok(Val::Instance(Instance::new_handle(
        class,
        NativeHandle::Monitor(Rc::new(RefCell::new(MonitorCore::default()))),
    )))
}

/// `critical:`: acquire (or re-enter) and schedule `block` followed by a
/// `MonitorExit` frame; when the region is held elsewhere, park and let
/// the re-executed send acquire after wake-up.
fn monitor_critical(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("critical:", args, 1)?;
    let block = args[0].as_block()?.clone();
    let core = monitor_of(receiver)?;
    let pid = interp.pid();
    if core.borrow_mut().try_acquire(pid) {
        interp.work.push(WorkFrame::MonitorExit(core));
        interp.work.push(WorkFrame::ApplyBlock { block, argc: 0 });
        interp.scheduled_frames();
    } else {
        core.borrow_mut().waiters.push_back(pid);
        interp.request_block();
    }
    Ok(Val::Nil)
}

// ---- Semaphore ---------------------------------------------------------

fn semaphore_new(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    Ok(Val::Instance(Instance::new_handle(
        class,
        NativeHandle::Semaphore(Rc::new(RefCell::new(SemaphoreCore::default()))),
    )))
}

fn semaphore_for_count(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("forCount:", args, 1)?;
    let class = receiver.as_class()?;
    let count = args[0].as_int()?;
    if count < 0 {
        return Err(RuntimeError::value("semaphore count cannot be negative"));
    }
    Ok(Val::Instance(Instance::new_handle(
        class,
        NativeHandle::Semaphore(Rc::new(RefCell::new(SemaphoreCore::with_count(count)))),
    )))
}

fn semaphore_wait(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let core = semaphore_of(receiver)?;
    if core.borrow_mut().try_wait() {
        Ok(receiver.clone())
    } else {
        core.borrow_mut().waiters.push_back(interp.pid());
        interp.request_block();
        Ok(Val::Nil)
    }
}

fn semaphore_signal(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let core = semaphore_of(receiver)?;
    core.borrow_mut().signal();
    let mut waiters = std::mem::take(&mut core.borrow_mut().waiters);
    interp.sched().borrow_mut().wake_first(&mut waiters);
    core.borrow_mut().waiters = waiters;
    Ok(receiver.clone())
}

// ---- SharedQueue -------------------------------------------------------

fn queue_new(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    Ok(Val::Instance(Instance::new_handle(
        class,
        NativeHandle::Queue(Rc::new(RefCell::new(SharedQueueCore::default()))),
    )))
}

fn queue_put(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("put:", args, 1)?;
    let core = queue_of(receiver)?;
    core.borrow_mut().put(args[0].clone());
    let mut waiters = std::mem::take(&mut core.borrow_mut().waiters);
    interp.sched().borrow_mut().wake_first(&mut waiters);
    core.borrow_mut().waiters = waiters;
    Ok(args[0].clone())
}

fn queue_get(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let core = queue_of(receiver)?;
    let item = core.borrow_mut().try_get();
    match item {
        Some(value) => Ok(value),
        None => {
            core.borrow_mut().waiters.push_back(interp.pid());
            interp.request_block();
            Ok(Val::Nil)
        }
    }
}

fn queue_is_empty(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Bool(queue_of(receiver)?.borrow().items.is_empty()))
}

fn queue_size(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Int(queue_of(receiver)?.borrow().items.len() as i64))
}

// ---- Globals -----------------------------------------------------------

fn globals_at(interp: &mut Interp, _receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("at:", args, 1)?;
    let name = name_arg(&args[0])?;
    Ok(interp.globals().borrow().get(&name).unwrap_or(Val::Nil))
}

fn globals_at_put(interp: &mut Interp, _receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("at:put:", args, 2)?;
    let name = name_arg(&args[0])?;
    crate::obj::adopt_class_name(&name, &args[1]);
    interp.globals().borrow_mut().set(name, args[1].clone());
    Ok(args[1].clone())
}

fn globals_includes(interp: &mut Interp, _receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("includes:", args, 1)?;
    let name = name_arg(&args[0])?;
    Ok(Val::Bool(interp.globals().borrow().contains(&name)))
}

fn globals_remove(interp: &mut Interp, _receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("removeKey:", args, 1)?;
    let name = name_arg(&args[0])?;
    Ok(interp.globals().borrow_mut().remove(&name).unwrap_or(Val::Nil))
}
