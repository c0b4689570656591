use std::cell::RefCell;
use std::rc::Rc;

use crate::util::fast_map::FastHashMap;
use crate::val::Val;

pub type GlobalsRef = Rc<RefCell<Globals>>;

/// Process-wide namespace shared by every process of a VM. Classes register
/// themselves here on construction; top-level assignment writes here when
/// no activation scope claims the name first.
#[derive(Debug, Default)]
pub struct Globals {
    table: FastHashMap<Rc<str>, Val>,
}

impl Globals {
    pub fn new() -> GlobalsRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn get(&self, name: &str) -> Option<Val> {
        self.table.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn set(&mut self, name: Rc<str>, value: Val) {
        self.table.insert(name, value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Val> {
        self.table.remove(name)
    }

    pub fn names(&self) -> Vec<Rc<str>> {
        self.table.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
