use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::ast::{BlockTemplate, Node};
use crate::error::{RtResult, RuntimeError};
use crate::obj::Method;
use crate::util::fast_map::FastHashMap;
use crate::val::BlockValue;

pub type ClassRef = Rc<RefCell<Class>>;

/// A class: own definitions plus merged caches over the parent graph.
///
/// `parents` are strong references (a child keeps its ancestry alive);
/// `subclasses` are weak back-references used only for eager invalidation
/// walks, so the ownership graph stays acyclic — the globals table is what
/// owns classes.
pub struct Class {
    pub name: Rc<str>,
    pub tags: Vec<Rc<str>>,
    pub parents: Vec<ClassRef>,
    /// Own instance-variable names, in definition order.
    pub slot_names: Vec<Rc<str>>,
    pub methods: FastHashMap<Rc<str>, Rc<Method>>,
    pub class_methods: FastHashMap<Rc<str>, Rc<Method>>,
    /// Merged caches: parents' (left-to-right) then own. Rebuilt eagerly on
    /// every change, never consulted stale.
    pub all_slot_names: Vec<Rc<str>>,
    pub all_methods: FastHashMap<Rc<str>, Rc<Method>>,
    pub all_class_methods: FastHashMap<Rc<str>, Rc<Method>>,
    /// Slot name -> index into an instance's slot vector.
    pub slot_index: FastHashMap<Rc<str>, usize>,
    pub subclasses: Vec<Weak<RefCell<Class>>>,
}

impl Class {
    /// Create a class, wire it into its parents' subclass lists, and build
    /// its merged tables. Fails on slot or selector conflicts across
    /// parents.
    pub fn define(
        name: impl AsRef<str>,
        parents: Vec<ClassRef>,
        slot_names: Vec<Rc<str>>,
    ) -> RtResult<ClassRef> {
        let class = Rc::new(RefCell::new(Class {
            name: Rc::from(name.as_ref()),
            tags: Vec::new(),
            parents: parents.clone(),
            slot_names,
            methods: FastHashMap::default(),
            class_methods: FastHashMap::default(),
            all_slot_names: Vec::new(),
            all_methods: FastHashMap::default(),
            all_class_methods: FastHashMap::default(),
            slot_index: FastHashMap::default(),
            subclasses: Vec::new(),
        }));
        rebuild_tables(&class)?;
        for parent in &parents {
            parent.borrow_mut().subclasses.push(Rc::downgrade(&class));
        }
        Ok(class)
    }

    pub fn lookup_method(&self, selector: &str) -> Option<Rc<Method>> {
        self.all_methods.get(selector).cloned()
    }

    pub fn lookup_class_method(&self, selector: &str) -> Option<Rc<Method>> {
        self.all_class_methods.get(selector).cloned()
    }

    pub fn slot_offset(&self, name: &str) -> Option<usize> {
        self.slot_index.get(name).copied()
    }
}

/// Classes created by `derive` are anonymous until first bound to a
/// global; the binding names them.
pub fn adopt_class_name(name: &Rc<str>, value: &crate::val::Val) {
    if let crate::val::Val::Class(class) = value {
        if class.borrow().name.is_empty() {
            class.borrow_mut().name = name.clone();
        }
    }
}

/// True when `class` is `ancestor` or inherits from it through any chain.
pub fn inherits_from(class: &ClassRef, ancestor: &ClassRef) -> bool {
    if Rc::ptr_eq(class, ancestor) {
        return true;
    }
    class
        .borrow()
        .parents
        .iter()
        .any(|p| inherits_from(p, ancestor))
}

/// Install an instance method and invalidate every transitive subclass.
pub fn install_method(class: &ClassRef, selector: Rc<str>, block: Rc<BlockValue>) -> RtResult<()> {
    let method = Method::interpreted(selector.clone(), Rc::downgrade(class), block);
    class.borrow_mut().methods.insert(selector, method);
    rebuild_tables(class)
}

/// Install a class-side method and invalidate every transitive subclass.
pub fn install_class_method(
    class: &ClassRef,
    selector: Rc<str>,
    block: Rc<BlockValue>,
) -> RtResult<()> {
    let method = Method::interpreted(selector.clone(), Rc::downgrade(class), block);
    class.borrow_mut().class_methods.insert(selector, method);
    rebuild_tables(class)
}

/// Append a parent. Fails (leaving the class unchanged) when the new parent
/// would introduce a cycle, a slot-name conflict, or a selector conflict
/// the child does not override.
pub fn add_parent(class: &ClassRef, parent: &ClassRef) -> RtResult<()> {
    if inherits_from(parent, class) {
        return Err(RuntimeError::class_construction(format!(
            "adding {} as a parent of {} would create a cycle",
            parent.borrow().name,
            class.borrow().name
        )));
    }
    class.borrow_mut().parents.push(parent.clone());
    if let Err(err) = rebuild_tables(class) {
        // Roll back so a failed add leaves dispatch in its previous state.
        class.borrow_mut().parents.pop();
        rebuild_tables(class)?;
        return Err(err);
    }
    parent.borrow_mut().subclasses.push(Rc::downgrade(class));
    Ok(())
}

/// Rebuild the merged tables of `class` and, recursively, of every live
/// transitive subclass. Eager: by the time this returns, no dispatch
/// anywhere can observe a stale entry.
pub fn rebuild_tables(class: &ClassRef) -> RtResult<()> {
    {
        let mut c = class.borrow_mut();
        let c = &mut *c;
        let name = c.name.clone();
        c.all_methods.clear();
        c.all_class_methods.clear();
        c.all_slot_names.clear();
        c.slot_index.clear();

        let parents = c.parents.clone();
        for parent in &parents {
            let p = parent.borrow();
            merge_methods(
                &name,
                &p.name,
                &mut c.all_methods,
                &p.all_methods,
                &c.methods,
            )?;
            merge_methods(
                &name,
                &p.name,
                &mut c.all_class_methods,
                &p.all_class_methods,
                &c.class_methods,
            )?;
            for slot in &p.all_slot_names {
                if c.slot_index.contains_key(slot) {
                    return Err(RuntimeError::class_construction(format!(
                        "slot '{}' inherited more than once in {}",
                        slot, name
                    )));
                }
                c.slot_index.insert(slot.clone(), c.all_slot_names.len());
                c.all_slot_names.push(slot.clone());
            }
        }

        let own_methods: Vec<_> = c.methods.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (selector, method) in own_methods {
            c.all_methods.insert(selector, method);
        }
        let own_class_methods: Vec<_> = c
            .class_methods
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (selector, method) in own_class_methods {
            c.all_class_methods.insert(selector, method);
        }

        let own_slots = c.slot_names.clone();
        for slot in own_slots {
            if c.slot_index.contains_key(&slot) {
                return Err(RuntimeError::class_construction(format!(
                    "slot '{}' already defined by a parent of {}",
                    slot, name
                )));
            }
            c.slot_index.insert(slot.clone(), c.all_slot_names.len());
            c.all_slot_names.push(slot);
        }
    }

    // Top-down: children after this class, pruning dead back-references.
    let subclasses: Vec<ClassRef> = {
        let mut c = class.borrow_mut();
        c.subclasses.retain(|w| w.upgrade().is_some());
        c.subclasses.iter().filter_map(|w| w.upgrade()).collect()
    };
    for sub in subclasses {
        rebuild_tables(&sub)?;
    }
    Ok(())
}

/// Merge one parent's table into the accumulating merged table. A selector
/// supplied by two parents as *different* methods is a conflict unless the
/// child overrides it; a diamond (same method object via both paths) is
/// not.
fn merge_methods(
    class_name: &Rc<str>,
    parent_name: &Rc<str>,
    merged: &mut FastHashMap<Rc<str>, Rc<Method>>,
    parent_table: &FastHashMap<Rc<str>, Rc<Method>>,
    own: &FastHashMap<Rc<str>, Rc<Method>>,
) -> RtResult<()> {
    for (selector, method) in parent_table {
        match merged.get(selector) {
            None => {
                merged.insert(selector.clone(), method.clone());
            }
            Some(existing) if Rc::ptr_eq(existing, method) => {}
            Some(_) => {
                if !own.contains_key(selector) {
                    return Err(RuntimeError::class_construction(format!(
                        "selector '{}' conflicts between parents of {} (last: {}); override it to resolve",
                        selector, class_name, parent_name
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Generate `slot` getter / `slot:` setter methods for each of the class's
/// own slots, as direct indexed slot access. Skips selectors the class
/// already defines.
pub fn generate_accessors(class: &ClassRef) -> RtResult<()> {
    let specs: Vec<(Rc<str>, usize)> = {
        let c = class.borrow();
        c.slot_names
            .iter()
            .map(|s| (s.clone(), c.slot_index[s]))
            .collect()
    };
    let mut changed = false;
    for (slot, index) in specs {
        let getter_sel = slot.clone();
        let setter_sel: Rc<str> = Rc::from(format!("{}:", slot));
        let mut c = class.borrow_mut();
        if !c.methods.contains_key(&getter_sel) {
            let body = vec![Rc::new(Node::Return(Some(Rc::new(Node::SlotAccess {
                name: slot.clone(),
                index,
                value: None,
            }))))];
            let template = Rc::new(BlockTemplate {
                parameters: Vec::new(),
                temporaries: Vec::new(),
                body,
                is_method: true,
            });
            let block = Rc::new(BlockValue::bare(template));
            let method = Method::interpreted(getter_sel.clone(), Rc::downgrade(class), block);
            c.methods.insert(getter_sel, method);
            changed = true;
        }
        if !c.methods.contains_key(&setter_sel) {
            let param: Rc<str> = Rc::from("aValue");
            let body = vec![Rc::new(Node::SlotAccess {
                name: slot.clone(),
                index,
                value: Some(Rc::new(Node::Ident(param.clone()))),
            })];
            let template = Rc::new(BlockTemplate {
                parameters: vec![param],
                temporaries: Vec::new(),
                body,
                is_method: true,
            });
            let block = Rc::new(BlockValue::bare(template));
            let method = Method::interpreted(setter_sel.clone(), Rc::downgrade(class), block);
            c.methods.insert(setter_sel, method);
            changed = true;
        }
    }
    if changed {
        rebuild_tables(class)?;
    }
    Ok(())
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("slots", &self.all_slot_names)
            .field("selectors", &self.all_methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
