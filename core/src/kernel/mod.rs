mod blocks;
mod collections;
mod number;
mod object;
mod process;
mod strings;

pub(crate) use process::spawn_process;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{RtResult, RuntimeError};
use crate::obj::{rebuild_tables, generate_accessors, Class, ClassRef, Instance, Method, NativeDef, NativeHandle};
use crate::util::fast_map::FastHashMap;
use crate::val::Val;
use crate::vm::GlobalsRef;

/// The bootstrap class graph. Built once per VM before any user code runs;
/// every process of the VM shares it.
pub struct KernelClasses {
    pub object: ClassRef,
    pub undefined_object: ClassRef,
    pub boolean: ClassRef,
    pub number: ClassRef,
    pub integer: ClassRef,
    pub float: ClassRef,
    pub string: ClassRef,
    pub symbol: ClassRef,
    pub array: ClassRef,
    pub table: ClassRef,
    pub block: ClassRef,
    pub class_cls: ClassRef,
    pub error: ClassRef,
    pub process: ClassRef,
    pub processor: ClassRef,
    pub monitor: ClassRef,
    pub semaphore: ClassRef,
    pub shared_queue: ClassRef,
    pub globals_accessor: ClassRef,
}

pub struct Kernel {
    pub classes: KernelClasses,
    /// Named native routines reachable from `<primitive: "...">` bodies.
    primitives: RefCell<FastHashMap<Rc<str>, NativeDef>>,
}

impl Kernel {
    /// The class dispatch starts at for a value.
    pub fn class_of(&self, value: &Val) -> ClassRef {
        let c = &self.classes;
        match value {
            Val::Nil => &c.undefined_object,
            Val::Bool(_) => &c.boolean,
            Val::Int(_) => &c.integer,
            Val::Float(_) => &c.float,
            Val::Str(_) => &c.string,
            Val::Symbol(_) => &c.symbol,
            Val::Array(_) => &c.array,
            Val::Table(_) => &c.table,
            Val::Block(_) => &c.block,
            Val::Class(_) => &c.class_cls,
            Val::Instance(instance) => return instance.borrow().class.clone(),
        }
        .clone()
    }

    pub fn register_primitive(&self, name: &str, def: NativeDef) {
        self.primitives.borrow_mut().insert(Rc::from(name), def);
    }

    pub fn primitive(&self, name: &str) -> Option<NativeDef> {
        self.primitives.borrow().get(name).copied()
    }
}

/// Install a native instance method and rebuild the merged tables of the
/// class and its subclasses.
pub fn add_native_method(class: &ClassRef, selector: &str, def: NativeDef) -> RtResult<()> {
    install_raw(class, selector, def);
    rebuild_tables(class)
}

/// Install a native class-side method and rebuild.
pub fn add_native_class_method(class: &ClassRef, selector: &str, def: NativeDef) -> RtResult<()> {
    install_class_raw(class, selector, def);
    rebuild_tables(class)
}

/// Bootstrap-time install without a rebuild; the bootstrap rebuilds the
/// whole tree once at the end.
pub(crate) fn install_raw(class: &ClassRef, selector: &str, def: NativeDef) {
    let method = Method::native(selector, Rc::downgrade(class), def);
    class.borrow_mut().methods.insert(Rc::from(selector), method);
}

pub(crate) fn install_class_raw(class: &ClassRef, selector: &str, def: NativeDef) {
    let method = Method::native(selector, Rc::downgrade(class), def);
    class
        .borrow_mut()
        .class_methods
        .insert(Rc::from(selector), method);
}

pub(crate) fn expect_args(selector: &str, args: &[Val], n: usize) -> RtResult<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(RuntimeError::dispatch(format!(
            "{} expects {} argument(s), got {}",
            selector,
            n,
            args.len()
        )))
    }
}

/// A selector or slot-name argument: symbols and strings both accepted.
pub(crate) fn name_arg(value: &Val) -> RtResult<Rc<str>> {
    match value {
        Val::Symbol(s) | Val::Str(s) => Ok(s.clone()),
        other => Err(RuntimeError::value(format!(
            "expected a symbol or string, got {}",
            other.type_name()
        ))),
    }
}

/// Build the kernel: define the class graph, register every class in the
/// globals table, install the native methods, and rebuild the merged
/// tables once. Single initialization phase; nothing here is lazy.
pub fn bootstrap(globals: &GlobalsRef) -> RtResult<Rc<Kernel>> {
    let object = Class::define("Object", vec![], vec![])?;
    let derive = |name: &str| Class::define(name, vec![object.clone()], vec![]);

    let undefined_object = derive("UndefinedObject")?;
    let boolean = derive("Boolean")?;
    let number = derive("Number")?;
    let integer = Class::define("Integer", vec![number.clone()], vec![])?;
    let float = Class::define("Float", vec![number.clone()], vec![])?;
    let string = derive("String")?;
    let symbol = derive("Symbol")?;
    let array = derive("Array")?;
    let table = derive("Table")?;
    let block = derive("Block")?;
    let class_cls = derive("Class")?;
    let error = Class::define(
        "Error",
        vec![object.clone()],
        vec![Rc::from("message"), Rc::from("stackTrace")],
    )?;
    generate_accessors(&error)?;
    let process = derive("Process")?;
    let processor = derive("ProcessorScheduler")?;
    let monitor = derive("Monitor")?;
    let semaphore = derive("Semaphore")?;
    let shared_queue = derive("SharedQueue")?;
    let globals_accessor = derive("Globals")?;

    let classes = KernelClasses {
        object,
        undefined_object,
        boolean,
        number,
        integer,
        float,
        string,
        symbol,
        array,
        table,
        block,
        class_cls,
        error,
        process,
        processor,
        monitor,
        semaphore,
        shared_queue,
        globals_accessor,
    };

    object::install(&classes);
    number::install(&classes);
    strings::install(&classes);
    collections::install(&classes);
    blocks::install(&classes);
    process::install(&classes);

    // One eager rebuild for the whole tree; Object is the root.
    rebuild_tables(&classes.object)?;

    {
        let mut g = globals.borrow_mut();
        for class in [
            &classes.object,
            &classes.undefined_object,
            &classes.boolean,
            &classes.number,
            &classes.integer,
            &classes.float,
            &classes.string,
            &classes.symbol,
            &classes.array,
            &classes.table,
            &classes.block,
            &classes.class_cls,
            &classes.error,
            &classes.process,
            &classes.processor,
            &classes.monitor,
            &classes.semaphore,
            &classes.shared_queue,
            &classes.globals_accessor,
        ] {
            let name = class.borrow().name.clone();
            g.set(name, Val::Class(class.clone()));
        }
        // The scheduler singleton answers both names the sources use.
        let sched_instance = Val::Instance(Instance::new_handle(
            &classes.processor,
            NativeHandle::Scheduler,
        ));
        g.set(Rc::from("Processor"), sched_instance.clone());
        g.set(Rc::from("Scheduler"), sched_instance);
    }

    Ok(Rc::new(Kernel {
        classes,
        primitives: RefCell::new(FastHashMap::default()),
    }))
}
