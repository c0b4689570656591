use std::rc::Rc;

use tracing::trace;

use crate::error::{RtResult, RuntimeError};
use crate::obj::{ClassRef, Method, MethodBody, NativeDef};
use crate::val::Val;
use crate::vm::frames::{SendMode, WorkFrame};
use crate::vm::interp::{Ctl, Flow, Interp};
use crate::vm::control;

/// Handle one `SendMessage` frame: pop operands, resolve through merged
/// tables (or the super chain), fall back to `doesNotUnderstand:`, and
/// either call a native or push an activation.
pub(crate) fn send(
    interp: &mut Interp,
    selector: Rc<str>,
    argc: usize,
    mode: SendMode,
) -> RtResult<Flow> {
    let args = interp.pop_args(argc)?;
    let receiver = interp.pop()?;
    trace!(selector = %selector, argc, "send");

    // Control-flow selectors run as frame handlers so loops can yield and
    // non-local returns can unwind through them; a receiver of the wrong
    // shape falls through to ordinary dispatch.
    if matches!(mode, SendMode::Normal) {
        if let Some(flow) = control::try_control(interp, &selector, &receiver, &args)? {
            after_send(interp);
            return Ok(flow);
        }
    }

    let method = match &mode {
        SendMode::Normal => lookup_method(interp, &receiver, &selector),
        SendMode::Super { qualifier } => {
            lookup_super(interp, &receiver, &selector, qualifier.as_ref())?
        }
    };
    match method {
        Some(method) => invoke(interp, method, receiver, args, &selector, &mode),
        None => does_not_understand(interp, receiver, selector, args),
    }
}

/// Method lookup for a receiver: classes consult their merged class-method
/// table first and fall back to the `Class` class's instance methods;
/// everything else goes through its class's merged instance-method table.
pub(crate) fn lookup_method(
    interp: &Interp,
    receiver: &Val,
    selector: &str,
) -> Option<Rc<Method>> {
    match receiver {
        Val::Class(class) => class.borrow().lookup_class_method(selector).or_else(|| {
            interp
                .kernel()
                .classes
                .class_cls
                .borrow()
                .lookup_method(selector)
        }),
        Val::Instance(instance) => {
            let class = instance.borrow().class.clone();
            let found = class.borrow().lookup_method(selector);
            found
        }
        other => interp.class_of(other).borrow().lookup_method(selector),
    }
}

fn side_lookup(class: &ClassRef, selector: &str, class_side: bool) -> Option<Rc<Method>> {
    if class_side {
        class.borrow().lookup_class_method(selector)
    } else {
        class.borrow().lookup_method(selector)
    }
}

/// `super` lookup starts in the parents of the *defining* class of the
/// running method, not in the receiver's class. A qualifier names the
/// parent to start at and must actually be one.
fn lookup_super(
    interp: &Interp,
    receiver: &Val,
    selector: &str,
    qualifier: Option<&Rc<str>>,
) -> RtResult<Option<Rc<Method>>> {
    let defining = interp
        .current_activation()
        .and_then(|a| a.borrow().defining_class.clone())
        .ok_or_else(|| RuntimeError::dispatch("'super' outside a method"))?;
    let class_side = matches!(receiver, Val::Class(_));
    let parents = defining.borrow().parents.clone();
    match qualifier {
        None => {
            for parent in &parents {
                if let Some(method) = side_lookup(parent, selector, class_side) {
                    return Ok(Some(method));
                }
            }
            Ok(None)
        }
        Some(name) => {
            let parent = parents
                .iter()
                .find(|p| p.borrow().name.as_ref() == name.as_ref())
                .ok_or_else(|| {
                    RuntimeError::dispatch(format!(
                        "'{}' is not a parent of {}",
                        name,
                        defining.borrow().name
                    ))
                })?;
            Ok(side_lookup(parent, selector, class_side))
        }
    }
}

/// Run a method body or native. A native may, through the interpreter
/// handle it received, schedule frames of its own, park the process, or
/// terminate it; the `Ctl` channel reports which.
fn invoke(
    interp: &mut Interp,
    method: Rc<Method>,
    receiver: Val,
    args: Vec<Val>,
    selector: &Rc<str>,
    mode: &SendMode,
) -> RtResult<Flow> {
    match &method.body {
        MethodBody::Interpreted(block) => {
            interp.invoke_method_block(
                block.clone(),
                receiver,
                method.holder.upgrade(),
                method.selector.clone(),
                args,
            )?;
            after_send(interp);
            Ok(Flow::Continue)
        }
        MethodBody::Native(def) => {
            let result = call_native(interp, *def, &receiver, &args);
            match interp.take_ctl() {
                Ctl::None => {
                    interp.push(result?);
                    after_send(interp);
                    Ok(Flow::Continue)
                }
                Ctl::Scheduled => {
                    result?;
                    after_send(interp);
                    Ok(Flow::Continue)
                }
                Ctl::Block => {
                    result?;
                    // Park with the send frame and its operands restored,
                    // so waking re-executes the send and re-examines the
                    // condition it blocked on.
                    let argc = args.len();
                    interp.push(receiver);
                    for arg in args {
                        interp.push(arg);
                    }
                    interp.work.push(WorkFrame::SendMessage {
                        selector: selector.clone(),
                        argc,
                        mode: mode.clone(),
                    });
                    Ok(Flow::Blocked)
                }
                Ctl::Terminate => {
                    result?;
                    interp.discard_state();
                    Ok(Flow::Terminated)
                }
            }
        }
    }
}

pub(crate) fn call_native(
    interp: &mut Interp,
    def: NativeDef,
    receiver: &Val,
    args: &[Val],
) -> RtResult<Val> {
    match def {
        NativeDef::Plain(f) => f(receiver, args),
        NativeDef::WithVm(f) => f(interp, receiver, args),
    }
}

/// The DNU chain: a missing selector retries as `doesNotUnderstand:` with
/// the selector symbol and original arguments materialized. A receiver
/// with no `doesNotUnderstand:` either is a fatal dispatch error.
fn does_not_understand(
    interp: &mut Interp,
    receiver: Val,
    selector: Rc<str>,
    args: Vec<Val>,
) -> RtResult<Flow> {
    if selector.as_ref() == "doesNotUnderstand:" {
        return Err(not_understood(interp, &receiver, &selector));
    }
    let Some(method) = lookup_method(interp, &receiver, "doesNotUnderstand:") else {
        return Err(not_understood(interp, &receiver, &selector));
    };
    let message = Val::array(vec![Val::Symbol(selector.clone()), Val::array(args)]);
    let dnu_selector: Rc<str> = Rc::from("doesNotUnderstand:");
    invoke(
        interp,
        method,
        receiver,
        vec![message],
        &dnu_selector,
        &SendMode::Normal,
    )
}

pub(crate) fn not_understood(interp: &Interp, receiver: &Val, selector: &str) -> RuntimeError {
    let class = interp.class_of(receiver);
    let name = class.borrow().name.clone();
    RuntimeError::dispatch(format!("{} does not understand #{}", name, selector))
}

/// Optional yield point after every message send (off by default).
fn after_send(interp: &mut Interp) {
    if interp.config().yield_on_send && !interp.in_reentry() {
        interp.request_yield();
    }
}
