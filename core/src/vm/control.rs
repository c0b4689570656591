use once_cell::sync::Lazy;

use crate::error::{RtResult, RuntimeError};
use crate::util::fast_map::FastHashSet;
use crate::val::Val;
use crate::vm::frames::WorkFrame;
use crate::vm::interp::{Flow, HandlerMark, Interp};

/// Selectors the VM executes as frame handlers instead of method lookups,
/// so conditionals and loops can suspend at any point and unwind through
/// non-local returns.
static CONTROL_SELECTORS: Lazy<FastHashSet<&'static str>> = Lazy::new(|| {
    [
        "ifTrue:",
        "ifFalse:",
        "ifTrue:ifFalse:",
        "ifFalse:ifTrue:",
        "and:",
        "or:",
        "whileTrue",
        "whileFalse",
        "whileTrue:",
        "whileFalse:",
        "value",
        "value:",
        "value:value:",
        "value:value:value:",
        "valueWithArguments:",
        "on:do:",
    ]
    .into_iter()
    .collect()
});

/// Try to handle a send as VM control flow. `None` means the send is not
/// control flow for this receiver and dispatches normally — a user class
/// is free to define its own `ifTrue:`.
pub(crate) fn try_control(
    interp: &mut Interp,
    selector: &str,
    receiver: &Val,
    args: &[Val],
) -> RtResult<Option<Flow>> {
    if !CONTROL_SELECTORS.contains(selector) {
        return Ok(None);
    }
    match (selector, receiver) {
        ("ifTrue:", Val::Bool(b)) if args.len() == 1 => {
            branch(interp, *b, Some(&args[0]), None)
        }
        ("ifFalse:", Val::Bool(b)) if args.len() == 1 => {
            branch(interp, *b, None, Some(&args[0]))
        }
        ("ifTrue:ifFalse:", Val::Bool(b)) if args.len() == 2 => {
            branch(interp, *b, Some(&args[0]), Some(&args[1]))
        }
        ("ifFalse:ifTrue:", Val::Bool(b)) if args.len() == 2 => {
            branch(interp, *b, Some(&args[1]), Some(&args[0]))
        }
        ("and:", Val::Bool(b)) if args.len() == 1 => {
            if *b {
                run_operand(interp, &args[0])
            } else {
                interp.push(Val::Bool(false));
                Ok(Some(Flow::Continue))
            }
        }
        ("or:", Val::Bool(b)) if args.len() == 1 => {
            if *b {
                interp.push(Val::Bool(true));
                Ok(Some(Flow::Continue))
            } else {
                run_operand(interp, &args[0])
            }
        }
        ("whileTrue:", Val::Block(cond)) if args.len() == 1 => {
            let body = args[0].as_block()?.clone();
            start_loop(interp, cond.clone(), Some(body), true)
        }
        ("whileFalse:", Val::Block(cond)) if args.len() == 1 => {
            let body = args[0].as_block()?.clone();
            start_loop(interp, cond.clone(), Some(body), false)
        }
        ("whileTrue", Val::Block(cond)) if args.is_empty() => {
            start_loop(interp, cond.clone(), None, true)
        }
        ("whileFalse", Val::Block(cond)) if args.is_empty() => {
            start_loop(interp, cond.clone(), None, false)
        }
        ("value" | "value:" | "value:value:" | "value:value:value:", Val::Block(block)) => {
            interp.invoke_block(block.clone(), args.to_vec())?;
            Ok(Some(Flow::Continue))
        }
        ("valueWithArguments:", Val::Block(block)) if args.len() == 1 => {
            let argv = args[0].as_array()?.borrow().clone();
            interp.invoke_block(block.clone(), argv)?;
            Ok(Some(Flow::Continue))
        }
        ("on:do:", Val::Block(protected)) if args.len() == 2 => {
            let filter = match &args[0] {
                Val::Class(class) => Some(class.clone()),
                Val::Nil => None,
                other => {
                    return Err(RuntimeError::value(format!(
                        "on:do: expects an exception class, got {}",
                        other.type_name()
                    )));
                }
            };
            let handler = args[1].as_block()?.clone();
            let id = interp.next_handler_id();
            interp.handlers.push(HandlerMark {
                id,
                work_len: interp.work.len(),
                stack_len: interp.stack.len(),
                act_len: interp.acts.len(),
                handler,
                filter,
            });
            interp.work.push(WorkFrame::PopHandler(id));
            interp.work.push(WorkFrame::ApplyBlock {
                block: protected.clone(),
                argc: 0,
            });
            Ok(Some(Flow::Continue))
        }
        _ => Ok(None),
    }
}

/// Pick a conditional branch: a block operand is applied, a plain value is
/// the result, a missing branch yields nil.
fn branch(
    interp: &mut Interp,
    flag: bool,
    on_true: Option<&Val>,
    on_false: Option<&Val>,
) -> RtResult<Option<Flow>> {
    let chosen = if flag { on_true } else { on_false };
    match chosen {
        None => {
            interp.push(Val::Nil);
            Ok(Some(Flow::Continue))
        }
        Some(value) => run_operand(interp, value),
    }
}

fn run_operand(interp: &mut Interp, value: &Val) -> RtResult<Option<Flow>> {
    match value {
        Val::Block(block) => {
            interp.invoke_block(block.clone(), Vec::new())?;
            Ok(Some(Flow::Continue))
        }
        other => {
            interp.push(other.clone());
            Ok(Some(Flow::Continue))
        }
    }
}

/// `whileTrue:`-family: evaluate the condition, then let the `LoopTest`
/// frame decide whether to schedule a body round and another test.
fn start_loop(
    interp: &mut Interp,
    cond: std::rc::Rc<crate::val::BlockValue>,
    body: Option<std::rc::Rc<crate::val::BlockValue>>,
    expect: bool,
) -> RtResult<Option<Flow>> {
    interp.work.push(WorkFrame::LoopTest {
        cond: cond.clone(),
        body,
        expect,
    });
    interp.work.push(WorkFrame::ApplyBlock {
        block: cond,
        argc: 0,
    });
    Ok(Some(Flow::Continue))
}
