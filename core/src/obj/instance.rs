use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{RtResult, RuntimeError};
use crate::obj::ClassRef;
use crate::sched::{MonitorCore, SemaphoreCore, SharedQueueCore};
use crate::val::Val;

pub type InstanceRef = Rc<RefCell<Instance>>;

/// Opaque native payload for proxy-shaped instances: the synchronization
/// primitives and process handles live behind these.
#[derive(Debug, Clone)]
pub enum NativeHandle {
    Monitor(Rc<RefCell<MonitorCore>>),
    Semaphore(Rc<RefCell<SemaphoreCore>>),
    Queue(Rc<RefCell<SharedQueueCore>>),
    Process(u64),
    Scheduler,
}

#[derive(Debug)]
pub enum InstanceBody {
    /// Plain object: one value per `all_slot_names` entry of the class.
    Slots(Vec<Val>),
    /// Proxy: class plus an opaque native handle.
    Handle(NativeHandle),
}

#[derive(Debug)]
pub struct Instance {
    pub class: ClassRef,
    pub body: InstanceBody,
}

impl Instance {
    /// Allocate a plain instance with every slot set to nil.
    pub fn new_of(class: &ClassRef) -> InstanceRef {
        let slot_count = class.borrow().all_slot_names.len();
        Rc::new(RefCell::new(Instance {
            class: class.clone(),
            body: InstanceBody::Slots(vec![Val::Nil; slot_count]),
        }))
    }

    pub fn new_handle(class: &ClassRef, handle: NativeHandle) -> InstanceRef {
        Rc::new(RefCell::new(Instance {
            class: class.clone(),
            body: InstanceBody::Handle(handle),
        }))
    }

    pub fn get_slot(&self, index: usize) -> RtResult<Val> {
        match &self.body {
            InstanceBody::Slots(slots) => slots.get(index).cloned().ok_or_else(|| {
                RuntimeError::internal(format!(
                    "slot index {} out of range for {}",
                    index,
                    self.class.borrow().name
                ))
            }),
            InstanceBody::Handle(_) => Err(RuntimeError::value(format!(
                "a {} proxy has no slots",
                self.class.borrow().name
            ))),
        }
    }

    pub fn set_slot(&mut self, index: usize, value: Val) -> RtResult<()> {
        let class = self.class.clone();
        match &mut self.body {
            InstanceBody::Slots(slots) => {
                let slot = slots.get_mut(index).ok_or_else(|| {
                    RuntimeError::internal(format!(
                        "slot index {} out of range for {}",
                        index,
                        class.borrow().name
                    ))
                })?;
                *slot = value;
                Ok(())
            }
            InstanceBody::Handle(_) => Err(RuntimeError::value(format!(
                "a {} proxy has no slots",
                class.borrow().name
            ))),
        }
    }

    pub fn handle(&self) -> Option<&NativeHandle> {
        match &self.body {
            InstanceBody::Handle(h) => Some(h),
            InstanceBody::Slots(_) => None,
        }
    }

    pub fn print_string(&self) -> String {
        let name = self.class.borrow().name.clone();
        let article = match name.chars().next() {
            Some(c) if "AEIOUaeiou".contains(c) => "an",
            _ => "a",
        };
        format!("{} {}", article, name)
    }
}
