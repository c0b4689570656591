use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::BlockTemplate;
use crate::obj::ClassRef;
use crate::util::fast_map::{fast_hash_map_with_capacity, FastHashMap};
use crate::val::{BlockValue, MutCell, Val};

pub type ActivationRef = Rc<RefCell<Activation>>;

/// One in-flight method or block invocation. Activations form a spaghetti
/// stack through `sender`, independent of the host call stack; blocks keep
/// their creating activation alive through `BlockValue::home`.
///
/// Locals are stored as shared cells, and block capture aliases those same
/// cells, so an assignment to a captured variable is visible to every
/// closure over it without any copy-in/copy-out.
pub struct Activation {
    pub receiver: Val,
    /// The executing closure (method body or block). `None` only for the
    /// synthetic top-level scope.
    pub block: Option<Rc<BlockValue>>,
    /// Where `super` starts looking: the class the running method was
    /// installed on. Blocks inherit it from their home.
    pub defining_class: Option<ClassRef>,
    pub locals: FastHashMap<Rc<str>, MutCell>,
    pub sender: Option<ActivationRef>,
    /// Selector for method activations; blocks have none.
    pub selector: Option<Rc<str>>,
    pub is_method: bool,
    pub has_returned: bool,
    pub return_value: Val,
}

impl Activation {
    pub fn new(
        receiver: Val,
        block: Rc<BlockValue>,
        defining_class: Option<ClassRef>,
        selector: Option<Rc<str>>,
        sender: Option<ActivationRef>,
        args: Vec<Val>,
    ) -> ActivationRef {
        let template: &BlockTemplate = &block.template;
        debug_assert_eq!(args.len(), template.parameters.len());
        let mut locals =
            fast_hash_map_with_capacity(template.parameters.len() + template.temporaries.len());
        for (name, value) in template.parameters.iter().zip(args) {
            locals.insert(name.clone(), Rc::new(RefCell::new(value)));
        }
        for name in &template.temporaries {
            locals.insert(name.clone(), Rc::new(RefCell::new(Val::Nil)));
        }
        let is_method = template.is_method;
        Rc::new(RefCell::new(Activation {
            receiver,
            block: Some(block),
            defining_class,
            locals,
            sender,
            selector,
            is_method,
            has_returned: false,
            return_value: Val::Nil,
        }))
    }

    pub fn local(&self, name: &str) -> Option<MutCell> {
        self.locals.get(name).cloned()
    }

    /// How this activation renders in a stack trace.
    pub fn describe(&self) -> String {
        match (&self.selector, &self.defining_class) {
            (Some(sel), Some(class)) => format!("{}>>{}", class.borrow().name, sel),
            (Some(sel), None) => sel.to_string(),
            (None, _) => "a block".to_string(),
        }
    }
}

/// Build the closure for a block literal: alias every cell visible at the
/// creation site. Sibling blocks created in the same scope thereby share
/// cells, while separate invocations of the creating routine produce
/// disjoint ones.
pub fn capture_block(
    template: &Rc<BlockTemplate>,
    current: Option<&ActivationRef>,
) -> Rc<BlockValue> {
    let mut captured: FastHashMap<Rc<str>, MutCell> = FastHashMap::default();
    if let Some(current) = current {
        // Innermost scope wins: walk the activation chain outward first,
        // then fold in what the enclosing closure had already captured.
        let mut act = Some(current.clone());
        while let Some(a) = act {
            let a = a.borrow();
            for (name, cell) in &a.locals {
                captured.entry(name.clone()).or_insert_with(|| cell.clone());
            }
            act = a.sender.clone();
        }
        if let Some(enclosing) = &current.borrow().block {
            for (name, cell) in &enclosing.captured {
                captured.entry(name.clone()).or_insert_with(|| cell.clone());
            }
        }
    }
    Rc::new(BlockValue {
        template: template.clone(),
        captured,
        home: current.cloned(),
    })
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activation")
            .field("selector", &self.selector)
            .field("is_method", &self.is_method)
            .field("locals", &self.locals.keys().collect::<Vec<_>>())
            .finish()
    }
}
