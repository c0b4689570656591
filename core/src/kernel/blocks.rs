use crate::error::{RtResult, RuntimeError};
use crate::kernel::{expect_args, install_class_raw, install_raw, spawn_process, KernelClasses};
use crate::obj::{Instance, NativeDef};
use crate::val::Val;
use crate::vm::Interp;

pub(crate) fn install(classes: &KernelClasses) {
    let block = &classes.block;
    install_raw(block, "numArgs", NativeDef::Plain(block_num_args));
    install_raw(block, "fork", NativeDef::WithVm(block_fork));

    let error = &classes.error;
    install_class_raw(error, "signal:", NativeDef::WithVm(error_signal_message));
    install_class_raw(error, "signal", NativeDef::WithVm(error_signal));
}

fn block_num_args(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Int(receiver.as_block()?.num_args() as i64))
}

/// `aBlock fork`: sugar for `Processor fork: aBlock`.
fn block_fork(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let block = receiver.as_block()?.clone();
    spawn_process(interp, block, None)
}

/// `AnErrorClass signal: 'msg'`: raise with an instance of the receiver
/// class as the exception object, so `on:do:` filters match subclasses.
fn error_signal_message(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("signal:", args, 1)?;
    let message = args[0].display_string();
    raise(interp, receiver, message)
}

fn error_signal(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("signal", args, 0)?;
    let class = receiver.as_class()?;
    let message = format!("{} signalled", class.borrow().name);
    raise(interp, receiver, message)
}

fn raise(interp: &mut Interp, receiver: &Val, message: String) -> RtResult<Val> {
    let class = receiver.as_class()?;
    let instance = Instance::new_of(class);
    let offset = instance.borrow().class.borrow().slot_offset("message");
    if let Some(offset) = offset {
        instance.borrow_mut().set_slot(offset, Val::str(&message))?;
    }
    let mut err = RuntimeError::signal(message, Val::Instance(instance));
    err.trace = interp.capture_trace();
    Err(err)
}
