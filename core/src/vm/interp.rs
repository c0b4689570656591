use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::ast::{Node, PseudoVar};
use crate::error::{RtResult, RuntimeError};
use crate::kernel::Kernel;
use crate::obj::{inherits_from, ClassRef, Instance};
use crate::sched::SchedRef;
use crate::val::{BlockValue, Val};
use crate::vm::activation::{capture_block, Activation, ActivationRef};
use crate::vm::frames::{SendMode, WorkFrame};
use crate::vm::globals::GlobalsRef;
use crate::vm::{dispatch, VmConfig};

/// What a run of the work loop ended with, from the scheduler's point of
/// view.
#[derive(Debug)]
pub enum RunState {
    /// Work queue drained; value is the top of the eval stack (or nil).
    Completed(Val),
    /// The process hit a yield point and can be resumed later.
    Yielded,
    /// The process parked itself on a sync primitive's wait list.
    Blocked,
    /// Unhandled error; the process is dead.
    Failed(RuntimeError),
    /// The process terminated itself mid-run.
    Terminated,
}

/// Out-of-band result of a native call, set through the interpreter the
/// native received.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ctl {
    /// Push the native's return value; nothing special happened.
    #[default]
    None,
    /// The native scheduled work frames itself; its return value is
    /// discarded.
    Scheduled,
    /// The native parked this process on a wait list; re-push the send so
    /// waking re-executes it.
    Block,
    /// The native terminated this process.
    Terminate,
}

/// An installed `on:do:` handler: where to unwind to and what to run.
pub(crate) struct HandlerMark {
    pub id: u64,
    pub work_len: usize,
    pub stack_len: usize,
    pub act_len: usize,
    pub handler: Rc<BlockValue>,
    /// Exception class filter; `None` catches everything.
    pub filter: Option<ClassRef>,
}

#[derive(Debug)]
pub(crate) enum Flow {
    Continue,
    Blocked,
    Terminated,
}

/// Per-process VM state: the explicit work queue that replaces host
/// recursion, the eval stack, and the activation stack. Each process owns
/// one of these; the globals, kernel and scheduler handles are shared.
pub struct Interp {
    pid: u64,
    pub(crate) work: Vec<WorkFrame>,
    pub(crate) stack: Vec<Val>,
    pub(crate) acts: Vec<ActivationRef>,
    pub(crate) handlers: Vec<HandlerMark>,
    pub(crate) should_yield: bool,
    pub(crate) last_result: Val,
    ctl: Ctl,
    handler_seq: u64,
    reentry_depth: usize,
    globals: GlobalsRef,
    kernel: Rc<Kernel>,
    sched: SchedRef,
    config: Rc<VmConfig>,
}

impl Interp {
    pub fn new(
        globals: GlobalsRef,
        kernel: Rc<Kernel>,
        sched: SchedRef,
        config: Rc<VmConfig>,
    ) -> Self {
        Self {
            pid: 0,
            work: Vec::new(),
            stack: Vec::new(),
            acts: Vec::new(),
            handlers: Vec::new(),
            should_yield: false,
            last_result: Val::Nil,
            ctl: Ctl::None,
            handler_seq: 0,
            reentry_depth: 0,
            globals,
            kernel,
            sched,
            config,
        }
    }

    /// A fresh interpreter for a forked process, sharing this one's
    /// globals, kernel, scheduler and configuration.
    pub fn fork_child(&self) -> Self {
        Self::new(
            self.globals.clone(),
            self.kernel.clone(),
            self.sched.clone(),
            self.config.clone(),
        )
    }

    pub fn set_pid(&mut self, pid: u64) {
        self.pid = pid;
    }

    pub fn pid(&self) -> u64 {
        self.pid
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

    pub fn request_yield(&mut self) {
        self.should_yield = true;
    }

    /// Called by a native that put this process on a wait list; the
    /// dispatcher re-pushes the blocked send before parking.
    pub fn request_block(&mut self) {
        self.ctl = Ctl::Block;
    }

    /// Called by a native that pushed continuation frames itself; its
    /// return value will be ignored.
    pub fn scheduled_frames(&mut self) {
        self.ctl = Ctl::Scheduled;
    }

    pub fn request_terminate(&mut self) {
        self.ctl = Ctl::Terminate;
    }

    pub(crate) fn take_ctl(&mut self) -> Ctl {
        std::mem::take(&mut self.ctl)
    }

    /// Drop all pending state; used by terminate.
    pub fn discard_state(&mut self) {
        self.work.clear();
        self.stack.clear();
        // Pop innermost-first: clearing front-to-back would leave each
        // activation's drop to cascade down the whole sender chain
        // recursively, which is the host-stack overflow this VM exists to
        // avoid.
        while self.acts.pop().is_some() {}
        self.handlers.clear();
        self.should_yield = false;
        self.ctl = Ctl::None;
    }

    pub fn current_activation(&self) -> Option<&ActivationRef> {
        self.acts.last()
    }

    pub fn current_receiver(&self) -> Val {
        self.acts
            .last()
            .map(|a| a.borrow().receiver.clone())
            .unwrap_or(Val::Nil)
    }

    /// The class dispatch starts at for a receiver value.
    pub fn class_of(&self, value: &Val) -> ClassRef {
        self.kernel.class_of(value)
    }

    // ---- stack helpers --------------------------------------------------

    pub(crate) fn push(&mut self, value: Val) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> RtResult<Val> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::internal("eval stack underflow"))
    }

    pub(crate) fn pop_args(&mut self, argc: usize) -> RtResult<Vec<Val>> {
        if self.stack.len() < argc {
            return Err(RuntimeError::internal("eval stack underflow popping arguments"));
        }
        let at = self.stack.len() - argc;
        Ok(self.stack.split_off(at))
    }

    // ---- driver ---------------------------------------------------------

    /// Drain the work queue. Returns to the caller (the scheduler) at
    /// yield points, block points, completion, or death.
    pub fn run(&mut self) -> RunState {
        loop {
            if self.should_yield {
                self.should_yield = false;
                return RunState::Yielded;
            }
            let Some(frame) = self.work.pop() else {
                let value = self.stack.last().cloned().unwrap_or(Val::Nil);
                self.last_result = value.clone();
                return RunState::Completed(value);
            };
            match self.step_frame(frame) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Blocked) => return RunState::Blocked,
                Ok(Flow::Terminated) => return RunState::Terminated,
                Err(err) => {
                    if let Err(fatal) = self.unwind_to_handler(err) {
                        self.discard_state();
                        return RunState::Failed(fatal);
                    }
                }
            }
        }
    }

    fn step_frame(&mut self, frame: WorkFrame) -> RtResult<Flow> {
        match frame {
            WorkFrame::EvalNode(node) => self.eval_node(&node),
            WorkFrame::PushValue(value) => {
                self.push(value);
                Ok(Flow::Continue)
            }
            WorkFrame::Discard => {
                self.pop()?;
                Ok(Flow::Continue)
            }
            WorkFrame::AfterReceiver { selector, args, mode } => {
                if args.is_empty() {
                    self.work.push(WorkFrame::SendMessage {
                        selector,
                        argc: 0,
                        mode,
                    });
                } else {
                    let first = args[0].clone();
                    self.work.push(WorkFrame::AfterArg {
                        selector,
                        args,
                        idx: 0,
                        mode,
                    });
                    self.work.push(WorkFrame::EvalNode(first));
                }
                Ok(Flow::Continue)
            }
            WorkFrame::AfterArg {
                selector,
                args,
                idx,
                mode,
            } => {
                let next = idx + 1;
                if next < args.len() {
                    let node = args[next].clone();
                    self.work.push(WorkFrame::AfterArg {
                        selector,
                        args,
                        idx: next,
                        mode,
                    });
                    self.work.push(WorkFrame::EvalNode(node));
                } else {
                    self.work.push(WorkFrame::SendMessage {
                        selector,
                        argc: args.len(),
                        mode,
                    });
                }
                Ok(Flow::Continue)
            }
            WorkFrame::SendMessage { selector, argc, mode } => {
                dispatch::send(self, selector, argc, mode)
            }
            WorkFrame::ApplyBlock { block, argc } => {
                let args = self.pop_args(argc)?;
                self.invoke_block(block, args)?;
                Ok(Flow::Continue)
            }
            WorkFrame::PopActivation { stack_len } => {
                let act = self
                    .acts
                    .pop()
                    .ok_or_else(|| RuntimeError::internal("activation stack underflow"))?;
                let result = if act.borrow().is_method {
                    act.borrow().receiver.clone()
                } else if self.stack.len() > stack_len {
                    self.pop()?
                } else {
                    Val::Nil
                };
                self.stack.truncate(stack_len);
                self.push(result);
                Ok(Flow::Continue)
            }
            WorkFrame::ReturnValue => self.do_return(),
            WorkFrame::BuildArray(n) => {
                let items = self.pop_args(n)?;
                self.push(Val::array(items));
                Ok(Flow::Continue)
            }
            WorkFrame::BuildTable(n) => {
                let mut data = crate::val::TableData::default();
                let mut flat = self.pop_args(n * 2)?;
                // Values were pushed key-then-value per entry.
                while let (Some(value), Some(key)) = (flat.pop(), flat.pop()) {
                    let key = match key {
                        Val::Str(s) | Val::Symbol(s) => s,
                        other => {
                            return Err(RuntimeError::value(format!(
                                "table keys must be strings or symbols, got {}",
                                other.type_name()
                            )));
                        }
                    };
                    data.insert(key, value);
                }
                self.push(Val::table(data));
                Ok(Flow::Continue)
            }
            WorkFrame::CascadeStep {
                receiver,
                messages,
                idx,
            } => {
                let receiver = match receiver {
                    Some(r) => r,
                    None => self.pop()?,
                };
                let part = &messages[idx];
                let last = idx + 1 == messages.len();
                if !last {
                    self.work.push(WorkFrame::CascadeStep {
                        receiver: Some(receiver.clone()),
                        messages: messages.clone(),
                        idx: idx + 1,
                    });
                    self.work.push(WorkFrame::Discard);
                }
                self.work.push(WorkFrame::AfterReceiver {
                    selector: part.selector.clone(),
                    args: Rc::new(part.args.clone()),
                    mode: SendMode::Normal,
                });
                self.work.push(WorkFrame::PushValue(receiver));
                Ok(Flow::Continue)
            }
            WorkFrame::AssignTo(name) => {
                let value = self
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| RuntimeError::internal("eval stack underflow in assignment"))?;
                self.assign_name(&name, value)?;
                Ok(Flow::Continue)
            }
            WorkFrame::StoreSlot { name, index } => {
                let value = self
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| RuntimeError::internal("eval stack underflow in slot store"))?;
                self.store_slot(&name, index, value)?;
                Ok(Flow::Continue)
            }
            WorkFrame::LoopTest { cond, body, expect } => {
                let flag = self.pop()?.as_bool()?;
                if flag == expect {
                    self.work.push(WorkFrame::LoopTest {
                        cond: cond.clone(),
                        body: body.clone(),
                        expect,
                    });
                    self.work.push(WorkFrame::ApplyBlock {
                        block: cond,
                        argc: 0,
                    });
                    if let Some(body) = body {
                        self.work.push(WorkFrame::Discard);
                        self.work.push(WorkFrame::ApplyBlock { block: body, argc: 0 });
                    }
                } else {
                    self.push(Val::Nil);
                }
                Ok(Flow::Continue)
            }
            WorkFrame::MonitorExit(core) => {
                self.monitor_exit(&core);
                Ok(Flow::Continue)
            }
            WorkFrame::PopHandler(id) => {
                self.handlers.retain(|m| m.id != id);
                Ok(Flow::Continue)
            }
        }
    }

    // ---- node evaluation ------------------------------------------------

    fn eval_node(&mut self, node: &Rc<Node>) -> RtResult<Flow> {
        match node.as_ref() {
            Node::Literal(value) => self.push(value.clone()),
            Node::Ident(name) => {
                let value = self.resolve_name(name)?;
                self.push(value);
            }
            Node::PseudoVar(pv) => {
                let value = match pv {
                    PseudoVar::SelfRef => self.current_receiver(),
                    PseudoVar::Nil => Val::Nil,
                    PseudoVar::True => Val::Bool(true),
                    PseudoVar::False => Val::Bool(false),
                };
                self.push(value);
            }
            Node::Assign { name, expr } => {
                self.work.push(WorkFrame::AssignTo(name.clone()));
                self.work.push(WorkFrame::EvalNode(expr.clone()));
            }
            Node::Message {
                receiver,
                selector,
                args,
            } => {
                self.work.push(WorkFrame::AfterReceiver {
                    selector: selector.clone(),
                    args: Rc::new(args.clone()),
                    mode: SendMode::Normal,
                });
                match receiver {
                    Some(node) => self.work.push(WorkFrame::EvalNode(node.clone())),
                    None => {
                        let receiver = self.current_receiver();
                        self.work.push(WorkFrame::PushValue(receiver));
                    }
                }
            }
            Node::SuperSend {
                selector,
                args,
                qualifier,
            } => {
                self.work.push(WorkFrame::AfterReceiver {
                    selector: selector.clone(),
                    args: Rc::new(args.clone()),
                    mode: SendMode::Super {
                        qualifier: qualifier.clone(),
                    },
                });
                let receiver = self.current_receiver();
                self.work.push(WorkFrame::PushValue(receiver));
            }
            Node::Cascade { receiver, messages } => {
                self.work.push(WorkFrame::CascadeStep {
                    receiver: None,
                    messages: Rc::new(messages.clone()),
                    idx: 0,
                });
                self.work.push(WorkFrame::EvalNode(receiver.clone()));
            }
            Node::Return(expr) => {
                self.work.push(WorkFrame::ReturnValue);
                match expr {
                    Some(node) => self.work.push(WorkFrame::EvalNode(node.clone())),
                    None => self.work.push(WorkFrame::PushValue(Val::Nil)),
                }
            }
            Node::Block(template) => {
                let block = capture_block(template, self.acts.last());
                self.push(Val::Block(block));
            }
            Node::Array(elements) => {
                self.work.push(WorkFrame::BuildArray(elements.len()));
                for element in elements.iter().rev() {
                    self.work.push(WorkFrame::EvalNode(element.clone()));
                }
            }
            Node::Table(entries) => {
                self.work.push(WorkFrame::BuildTable(entries.len()));
                for (key, value) in entries.iter().rev() {
                    self.work.push(WorkFrame::EvalNode(value.clone()));
                    self.work.push(WorkFrame::EvalNode(key.clone()));
                }
            }
            Node::SlotAccess { name, index, value } => match value {
                None => {
                    let value = self.read_slot(name, *index)?;
                    self.push(value);
                }
                Some(expr) => {
                    self.work.push(WorkFrame::StoreSlot {
                        name: name.clone(),
                        index: *index,
                    });
                    self.work.push(WorkFrame::EvalNode(expr.clone()));
                }
            },
            Node::Primitive { name, fallback } => return self.eval_primitive(name, fallback),
        }
        Ok(Flow::Continue)
    }

    /// `<primitive: "name">`: call the registered native, or run the
    /// fallback statements when no such native exists.
    fn eval_primitive(&mut self, name: &Rc<str>, fallback: &[Rc<Node>]) -> RtResult<Flow> {
        let act = self
            .acts
            .last()
            .cloned()
            .ok_or_else(|| RuntimeError::internal("primitive outside a method activation"))?;
        let def = self.kernel.primitive(name);
        match def {
            Some(def) => {
                let (receiver, args) = {
                    let act = act.borrow();
                    let receiver = act.receiver.clone();
                    let params = act
                        .block
                        .as_ref()
                        .map(|b| b.template.parameters.clone())
                        .unwrap_or_default();
                    let mut args = Vec::with_capacity(params.len());
                    for p in &params {
                        let cell = act.local(p).ok_or_else(|| {
                            RuntimeError::internal("method parameter missing from activation")
                        })?;
                        let value = cell.borrow().clone();
                        args.push(value);
                    }
                    (receiver, args)
                };
                let result = dispatch::call_native(self, def, &receiver, &args);
                match self.take_ctl() {
                    Ctl::None => {
                        self.push(result?);
                        Ok(Flow::Continue)
                    }
                    Ctl::Scheduled => {
                        result?;
                        Ok(Flow::Continue)
                    }
                    Ctl::Block => Err(RuntimeError::internal(
                        "a primitive-marked native cannot block the process",
                    )),
                    Ctl::Terminate => {
                        result?;
                        self.discard_state();
                        Ok(Flow::Terminated)
                    }
                }
            }
            None => {
                self.push_statements(fallback);
                Ok(Flow::Continue)
            }
        }
    }

    // ---- name resolution ------------------------------------------------

    /// Reads resolve: activation locals, the executing closure's captured
    /// cells, the receiver's named slots, then globals.
    pub(crate) fn resolve_name(&self, name: &str) -> RtResult<Val> {
        if let Some(act) = self.acts.last() {
            let act = act.borrow();
            if let Some(cell) = act.locals.get(name) {
                return Ok(cell.borrow().clone());
            }
            if let Some(block) = &act.block {
                if let Some(cell) = block.captured.get(name) {
                    return Ok(cell.borrow().clone());
                }
            }
            if let Val::Instance(instance) = &act.receiver {
                let instance = instance.borrow();
                let offset = instance.class.borrow().slot_offset(name);
                if let Some(index) = offset {
                    return instance.get_slot(index);
                }
            }
        }
        if let Some(value) = self.globals.borrow().get(name) {
            return Ok(value);
        }
        Err(RuntimeError::value(format!("undefined variable '{}'", name)))
    }

    /// Writes go to the first scope that defines the name; otherwise a new
    /// local is created in the current activation (a new global at the top
    /// level).
    pub(crate) fn assign_name(&mut self, name: &Rc<str>, value: Val) -> RtResult<()> {
        if let Some(act) = self.acts.last() {
            {
                let act = act.borrow();
                if let Some(cell) = act.locals.get(name) {
                    *cell.borrow_mut() = value;
                    return Ok(());
                }
                if let Some(block) = &act.block {
                    if let Some(cell) = block.captured.get(name) {
                        *cell.borrow_mut() = value;
                        return Ok(());
                    }
                }
                if let Val::Instance(instance) = &act.receiver {
                    let offset = instance.borrow().class.borrow().slot_offset(name);
                    if let Some(index) = offset {
                        return instance.borrow_mut().set_slot(index, value);
                    }
                }
            }
            if self.globals.borrow().contains(name) {
                crate::obj::adopt_class_name(name, &value);
                self.globals.borrow_mut().set(name.clone(), value);
                return Ok(());
            }
            act.borrow_mut()
                .locals
                .insert(name.clone(), Rc::new(RefCell::new(value)));
            Ok(())
        } else {
            crate::obj::adopt_class_name(name, &value);
            self.globals.borrow_mut().set(name.clone(), value);
            Ok(())
        }
    }

    /// Indexed slot read with a name check, falling back to the name map
    /// when a re-layout (e.g. `addParent:`) moved the slot.
    fn read_slot(&self, name: &Rc<str>, index: usize) -> RtResult<Val> {
        let receiver = self.current_receiver();
        let instance = receiver.as_instance()?;
        let instance = instance.borrow();
        let index = {
            let class = instance.class.borrow();
            if class.all_slot_names.get(index).is_some_and(|n| n == name) {
                index
            } else {
                class.slot_offset(name).ok_or_else(|| {
                    RuntimeError::value(format!(
                        "{} has no slot named '{}'",
                        class.name, name
                    ))
                })?
            }
        };
        instance.get_slot(index)
    }

    fn store_slot(&mut self, name: &Rc<str>, index: usize, value: Val) -> RtResult<()> {
        let receiver = self.current_receiver();
        let instance = receiver.as_instance()?;
        let index = {
            let inst = instance.borrow();
            let class = inst.class.borrow();
            if class.all_slot_names.get(index).is_some_and(|n| n == name) {
                index
            } else {
                class.slot_offset(name).ok_or_else(|| {
                    RuntimeError::value(format!(
                        "{} has no slot named '{}'",
                        class.name, name
                    ))
                })?
            }
        };
        let result = instance.borrow_mut().set_slot(index, value);
        result
    }

    // ---- activations ----------------------------------------------------

    /// Push the frames for a statement sequence: values of all but the
    /// last statement are discarded; an empty body yields nil.
    pub(crate) fn push_statements(&mut self, stmts: &[Rc<Node>]) {
        let Some((last, rest)) = stmts.split_last() else {
            self.work.push(WorkFrame::PushValue(Val::Nil));
            return;
        };
        self.work.push(WorkFrame::EvalNode(last.clone()));
        for stmt in rest.iter().rev() {
            self.work.push(WorkFrame::Discard);
            self.work.push(WorkFrame::EvalNode(stmt.clone()));
        }
    }

    /// Activate a closure. The receiver comes from the home activation
    /// when there is one, else from the invoker.
    pub(crate) fn invoke_block(&mut self, block: Rc<BlockValue>, args: Vec<Val>) -> RtResult<()> {
        if args.len() != block.num_args() {
            return Err(RuntimeError::dispatch(format!(
                "block expects {} argument(s), got {}",
                block.num_args(),
                args.len()
            )));
        }
        let (receiver, defining_class) = match &block.home {
            Some(home) => {
                let home = home.borrow();
                (home.receiver.clone(), home.defining_class.clone())
            }
            None => (self.current_receiver(), None),
        };
        let act = Activation::new(
            receiver,
            block.clone(),
            defining_class,
            None,
            self.acts.last().cloned(),
            args,
        );
        self.acts.push(act);
        self.work.push(WorkFrame::PopActivation {
            stack_len: self.stack.len(),
        });
        self.push_statements(&block.template.body);
        Ok(())
    }

    /// Activate a method body on an explicit receiver.
    pub(crate) fn invoke_method_block(
        &mut self,
        block: Rc<BlockValue>,
        receiver: Val,
        defining_class: Option<ClassRef>,
        selector: Rc<str>,
        args: Vec<Val>,
    ) -> RtResult<()> {
        if args.len() != block.num_args() {
            return Err(RuntimeError::dispatch(format!(
                "{} expects {} argument(s), got {}",
                selector,
                block.num_args(),
                args.len()
            )));
        }
        trace!(selector = %selector, "activate");
        let act = Activation::new(
            receiver,
            block.clone(),
            defining_class,
            Some(selector),
            self.acts.last().cloned(),
            args,
        );
        self.acts.push(act);
        self.work.push(WorkFrame::PopActivation {
            stack_len: self.stack.len(),
        });
        self.push_statements(&block.template.body);
        Ok(())
    }

    // ---- non-local return -----------------------------------------------

    /// `^expr`: find the target by walking the home chain to the nearest
    /// method activation (or the chain's root), verify it is still live in
    /// this process, and unwind frames until it has been popped. Unwinding
    /// executes side-effecting frames so monitors and handlers cannot leak.
    fn do_return(&mut self) -> RtResult<Flow> {
        let value = self.pop()?;
        let Some(current) = self.acts.last().cloned() else {
            return Err(RuntimeError::dead_activation(
                "return with no enclosing activation",
            ));
        };
        let target = {
            let mut act = current;
            loop {
                if act.borrow().is_method {
                    break act;
                }
                let home = act
                    .borrow()
                    .block
                    .as_ref()
                    .and_then(|b| b.home.clone());
                match home {
                    Some(home) => act = home,
                    None => break act,
                }
            }
        };
        if !self.acts.iter().any(|a| Rc::ptr_eq(a, &target)) {
            return Err(RuntimeError::dead_activation(
                "non-local return from a block whose home activation already returned",
            ));
        }
        {
            let mut t = target.borrow_mut();
            t.has_returned = true;
            t.return_value = value.clone();
        }
        loop {
            let Some(frame) = self.work.pop() else {
                return Err(RuntimeError::internal(
                    "work queue underflow while unwinding a return",
                ));
            };
            match frame {
                WorkFrame::PopActivation { stack_len } => {
                    let popped = self.acts.pop().ok_or_else(|| {
                        RuntimeError::internal("activation stack underflow while unwinding")
                    })?;
                    if Rc::ptr_eq(&popped, &target) {
                        self.stack.truncate(stack_len);
                        self.push(value);
                        return Ok(Flow::Continue);
                    }
                }
                WorkFrame::MonitorExit(core) => self.monitor_exit(&core),
                WorkFrame::PopHandler(id) => self.handlers.retain(|m| m.id != id),
                _ => {}
            }
        }
    }

    // ---- exceptions -----------------------------------------------------

    pub(crate) fn next_handler_id(&mut self) -> u64 {
        self.handler_seq += 1;
        self.handler_seq
    }

    /// Unwind to the innermost matching `on:do:` mark and schedule its
    /// handler block with the exception instance. Errors with no matching
    /// handler propagate out and kill the process.
    fn unwind_to_handler(&mut self, mut err: RuntimeError) -> Result<(), RuntimeError> {
        if err.trace.is_empty() {
            err.trace = self.capture_trace();
        }
        loop {
            let Some(mark) = self.handlers.pop() else {
                return Err(err);
            };
            self.unwind_frames_to(mark.work_len);
            self.acts.truncate(mark.act_len);
            self.stack.truncate(mark.stack_len);

            let exception = self.exception_instance(&err);
            let matches = match &mark.filter {
                None => true,
                Some(filter) => {
                    let class = self.class_of(&exception);
                    inherits_from(&class, filter)
                }
            };
            if matches {
                // Handlers may take the exception or ignore it.
                if mark.handler.num_args() == 0 {
                    self.work.push(WorkFrame::ApplyBlock {
                        block: mark.handler,
                        argc: 0,
                    });
                } else {
                    self.push(exception);
                    self.work.push(WorkFrame::ApplyBlock {
                        block: mark.handler,
                        argc: 1,
                    });
                }
                return Ok(());
            }
        }
    }

    /// Pop work frames down to `len`, running the side effects of sentinel
    /// frames on the way.
    fn unwind_frames_to(&mut self, len: usize) {
        while self.work.len() > len {
            match self.work.pop() {
                Some(WorkFrame::MonitorExit(core)) => self.monitor_exit(&core),
                Some(WorkFrame::PopHandler(id)) => self.handlers.retain(|m| m.id != id),
                Some(WorkFrame::PopActivation { .. }) => {
                    self.acts.pop();
                }
                _ => {}
            }
        }
    }

    /// The value handed to `on:do:` handlers: the signalled instance when
    /// there is one, else a fresh instance of the kernel Error class with
    /// `message` and `stackTrace` filled in.
    fn exception_instance(&mut self, err: &RuntimeError) -> Val {
        let instance = match &err.payload {
            Some(Val::Instance(i)) => i.clone(),
            _ => Instance::new_of(&self.kernel.classes.error),
        };
        let message_offset;
        let trace_offset;
        {
            let class = instance.borrow().class.clone();
            let class = class.borrow();
            message_offset = class.slot_offset("message");
            trace_offset = class.slot_offset("stackTrace");
        }
        {
            let mut inst = instance.borrow_mut();
            if let Some(offset) = message_offset {
                if inst.get_slot(offset).map(|v| v.is_nil()).unwrap_or(false) {
                    let _ = inst.set_slot(offset, Val::str(&err.message));
                }
            }
            if let Some(offset) = trace_offset {
                let trace = Val::array(err.trace.iter().map(Val::str).collect());
                let _ = inst.set_slot(offset, trace);
            }
        }
        Val::Instance(instance)
    }

    pub(crate) fn capture_trace(&self) -> Vec<String> {
        self.acts
            .iter()
            .rev()
            .take(64)
            .map(|a| a.borrow().describe())
            .collect()
    }

    // ---- monitors -------------------------------------------------------

    fn monitor_exit(&mut self, core: &Rc<RefCell<crate::sched::MonitorCore>>) {
        let released = core.borrow_mut().exit();
        if released {
            let mut waiters = std::mem::take(&mut core.borrow_mut().waiters);
            self.sched.borrow_mut().wake_first(&mut waiters);
            core.borrow_mut().waiters = waiters;
        }
    }

    // ---- native re-entry ------------------------------------------------

    /// Run a block to completion inside a native call and return its
    /// value. Yields are ignored and blocking is an error: the
    /// sub-computation is atomic with respect to the scheduler.
    pub fn call_block(&mut self, block: &Rc<BlockValue>, args: Vec<Val>) -> RtResult<Val> {
        if self.reentry_depth >= self.config.max_reentry_depth {
            return Err(RuntimeError::internal("native re-entry nested too deeply"));
        }
        self.reentry_depth += 1;
        let work_base = self.work.len();
        let stack_base = self.stack.len();
        let argc = args.len();
        for arg in args {
            self.push(arg);
        }
        self.work.push(WorkFrame::ApplyBlock {
            block: block.clone(),
            argc,
        });

        let result = loop {
            if self.work.len() == work_base {
                break self.pop();
            }
            if self.work.len() < work_base {
                break Err(RuntimeError::dead_activation(
                    "non-local return crossed a native call boundary",
                ));
            }
            let frame = match self.work.pop() {
                Some(frame) => frame,
                None => break Err(RuntimeError::internal("work queue underflow in native call")),
            };
            match self.step_frame(frame) {
                Ok(Flow::Continue) => {
                    self.should_yield = false;
                }
                Ok(Flow::Blocked) => {
                    break Err(RuntimeError::scheduler(
                        "cannot block the process inside a native call",
                    ));
                }
                Ok(Flow::Terminated) => {
                    break Err(RuntimeError::scheduler(
                        "process terminated inside a native call",
                    ));
                }
                Err(err) => {
                    let in_scope = self
                        .handlers
                        .last()
                        .map(|m| m.work_len >= work_base)
                        .unwrap_or(false);
                    if in_scope {
                        match self.unwind_to_handler(err) {
                            Ok(()) => {}
                            Err(fatal) => break Err(fatal),
                        }
                    } else {
                        break Err(err);
                    }
                }
            }
        };
        if result.is_err() {
            self.unwind_frames_to(work_base);
            self.stack.truncate(stack_base);
        }
        self.reentry_depth -= 1;
        result
    }

    pub(crate) fn in_reentry(&self) -> bool {
        self.reentry_depth > 0
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        self.discard_state();
    }
}
