use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{MessagePart, Node};
use crate::sched::MonitorCore;
use crate::val::{BlockValue, Val};

/// How a `SendMessage` resolves its method: through the receiver's class,
/// or starting from the defining class's parents (`super`), optionally at
/// one named parent.
#[derive(Debug, Clone)]
pub enum SendMode {
    Normal,
    Super { qualifier: Option<Rc<str>> },
}

/// One unit of pending work. The interpreter never recurses on the host:
/// every intermediate step of an evaluation is one of these on the work
/// queue, so execution can stop and resume between any two frames.
#[derive(Debug)]
pub enum WorkFrame {
    /// Evaluate an AST node.
    EvalNode(Rc<Node>),
    /// Receiver is on the stack; schedule argument evaluation.
    AfterReceiver {
        selector: Rc<str>,
        args: Rc<Vec<Rc<Node>>>,
        mode: SendMode,
    },
    /// Argument `idx` is on the stack; schedule the next one or the send.
    AfterArg {
        selector: Rc<str>,
        args: Rc<Vec<Rc<Node>>>,
        idx: usize,
        mode: SendMode,
    },
    /// Pop `argc` arguments plus the receiver and dispatch.
    SendMessage {
        selector: Rc<str>,
        argc: usize,
        mode: SendMode,
    },
    /// Pop `argc` arguments and invoke a block with them.
    ApplyBlock { block: Rc<BlockValue>, argc: usize },
    /// Unwind one activation; `stack_len` is the eval-stack height at
    /// activation entry, restored before the result is pushed.
    PopActivation { stack_len: usize },
    /// Honor `^expr` with the value on the stack.
    ReturnValue,
    BuildArray(usize),
    BuildTable(usize),
    /// Drive the remaining messages of a cascade. `receiver` is `None`
    /// until the receiver expression has been evaluated.
    CascadeStep {
        receiver: Option<Val>,
        messages: Rc<Vec<MessagePart>>,
        idx: usize,
    },
    /// Push a saved value (cascade receivers, implicit self).
    PushValue(Val),
    /// Drop the top of the eval stack (statement separator).
    Discard,
    /// Assign the value on top of the stack (left there as the expression
    /// result) to a name.
    AssignTo(Rc<str>),
    /// Store the value on top of the stack into the current receiver's
    /// indexed slot.
    StoreSlot { name: Rc<str>, index: usize },
    /// Loop driver for `whileTrue:`-family sends: the condition's value is
    /// on the stack; matching `expect` schedules another round.
    LoopTest {
        cond: Rc<BlockValue>,
        body: Option<Rc<BlockValue>>,
        expect: bool,
    },
    /// Leave one `critical:` nesting level, waking a waiter on full
    /// release. Runs during unwinds too, so returns and exceptions cannot
    /// leak a lock.
    MonitorExit(Rc<RefCell<MonitorCore>>),
    /// Retire the exception handler installed with this id.
    PopHandler(u64),
}
