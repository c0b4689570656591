use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::RtResult;
use crate::obj::Class;
use crate::val::{BlockValue, Val};
use crate::vm::Interp;

/// Native routine without interpreter access: `(receiver, args) -> value`.
pub type NativeFn = fn(&Val, &[Val]) -> RtResult<Val>;

/// Native routine that may call back into interpreted code or touch the
/// scheduler: `(&mut interp, receiver, args) -> value`.
pub type NativeVmFn = fn(&mut Interp, &Val, &[Val]) -> RtResult<Val>;

/// The two function-pointer shapes a native method can have. The `WithVm`
/// form is the re-entry path used by anything that must run a block or
/// block the calling process.
#[derive(Clone, Copy)]
pub enum NativeDef {
    Plain(NativeFn),
    WithVm(NativeVmFn),
}

pub enum MethodBody {
    /// A method block (`is_method` template); executed by pushing an
    /// activation and the body statements.
    Interpreted(Rc<BlockValue>),
    Native(NativeDef),
}

/// An installed method. Merged tables share these by `Rc`, so the same
/// method object is reachable from every subclass that inherits it; the
/// `holder` is the class it was installed on, which anchors `super` lookup.
pub struct Method {
    pub selector: Rc<str>,
    pub holder: Weak<RefCell<Class>>,
    pub body: MethodBody,
}

impl Method {
    pub fn interpreted(
        selector: Rc<str>,
        holder: Weak<RefCell<Class>>,
        block: Rc<BlockValue>,
    ) -> Rc<Self> {
        Rc::new(Self {
            selector,
            holder,
            body: MethodBody::Interpreted(block),
        })
    }

    pub fn native(selector: &str, holder: Weak<RefCell<Class>>, def: NativeDef) -> Rc<Self> {
        Rc::new(Self {
            selector: Rc::from(selector),
            holder,
            body: MethodBody::Native(def),
        })
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.body {
            MethodBody::Interpreted(_) => "interpreted",
            MethodBody::Native(_) => "native",
        };
        write!(f, "Method({}, {})", self.selector, kind)
    }
}
