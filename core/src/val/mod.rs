mod block;
mod ops;

pub use block::BlockValue;

#[cfg(test)]
mod val_test;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{RtResult, RuntimeError};
use crate::obj::{ClassRef, InstanceRef};
use crate::util::fast_map::FastHashMap;

/// A shared mutable box. Closures that captured the same variable hold the
/// same cell, so assignment through one is visible through the others; the
/// invariant is cell identity, not cell value.
pub type MutCell = Rc<RefCell<Val>>;

pub type TableData = FastHashMap<Rc<str>, Val>;

/// Runtime value. Primitives are inline; everything heap-shaped sits behind
/// an `Rc` so cloning a `Val` is cheap. The interpreter is single-threaded
/// by contract, which is why these are `Rc` and not `Arc`.
#[derive(Debug, Clone, Default)]
pub enum Val {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Symbol(Rc<str>),
    Array(Rc<RefCell<Vec<Val>>>),
    Table(Rc<RefCell<TableData>>),
    Block(Rc<BlockValue>),
    Class(ClassRef),
    Instance(InstanceRef),
}

impl Val {
    pub fn str(s: impl AsRef<str>) -> Self {
        Val::Str(Rc::from(s.as_ref()))
    }

    pub fn symbol(s: impl AsRef<str>) -> Self {
        Val::Symbol(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Val>) -> Self {
        Val::Array(Rc::new(RefCell::new(items)))
    }

    pub fn table(data: TableData) -> Self {
        Val::Table(Rc::new(RefCell::new(data)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Nil => "UndefinedObject",
            Val::Bool(_) => "Boolean",
            Val::Int(_) => "Integer",
            Val::Float(_) => "Float",
            Val::Str(_) => "String",
            Val::Symbol(_) => "Symbol",
            Val::Array(_) => "Array",
            Val::Table(_) => "Table",
            Val::Block(_) => "Block",
            Val::Class(_) => "Class",
            Val::Instance(_) => "Instance",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Val::Nil)
    }

    // ---- unwrap helpers -------------------------------------------------

    pub fn as_bool(&self) -> RtResult<bool> {
        match self {
            Val::Bool(b) => Ok(*b),
            other => Err(type_error("Boolean", other)),
        }
    }

    pub fn as_int(&self) -> RtResult<i64> {
        match self {
            Val::Int(i) => Ok(*i),
            other => Err(type_error("Integer", other)),
        }
    }

    /// Numeric unwrap with Int → Float widening.
    pub fn as_float(&self) -> RtResult<f64> {
        match self {
            Val::Float(f) => Ok(*f),
            Val::Int(i) => Ok(*i as f64),
            other => Err(type_error("number", other)),
        }
    }

    pub fn as_str(&self) -> RtResult<&Rc<str>> {
        match self {
            Val::Str(s) => Ok(s),
            other => Err(type_error("String", other)),
        }
    }

    pub fn as_symbol(&self) -> RtResult<&Rc<str>> {
        match self {
            Val::Symbol(s) => Ok(s),
            other => Err(type_error("Symbol", other)),
        }
    }

    pub fn as_array(&self) -> RtResult<&Rc<RefCell<Vec<Val>>>> {
        match self {
            Val::Array(a) => Ok(a),
            other => Err(type_error("Array", other)),
        }
    }

    pub fn as_table(&self) -> RtResult<&Rc<RefCell<TableData>>> {
        match self {
            Val::Table(t) => Ok(t),
            other => Err(type_error("Table", other)),
        }
    }

    pub fn as_block(&self) -> RtResult<&Rc<BlockValue>> {
        match self {
            Val::Block(b) => Ok(b),
            other => Err(type_error("Block", other)),
        }
    }

    pub fn as_class(&self) -> RtResult<&ClassRef> {
        match self {
            Val::Class(c) => Ok(c),
            other => Err(type_error("Class", other)),
        }
    }

    pub fn as_instance(&self) -> RtResult<&InstanceRef> {
        match self {
            Val::Instance(i) => Ok(i),
            other => Err(type_error("Instance", other)),
        }
    }

    // ---- equality -------------------------------------------------------

    /// Identity (`==` / `~~`): same variant and same value for primitives,
    /// pointer identity for everything heap-shaped. No Int/Float crossing.
    pub fn identical(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Nil, Val::Nil) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Val::Symbol(a), Val::Symbol(b)) => a == b,
            (Val::Array(a), Val::Array(b)) => Rc::ptr_eq(a, b),
            (Val::Table(a), Val::Table(b)) => Rc::ptr_eq(a, b),
            (Val::Block(a), Val::Block(b)) => Rc::ptr_eq(a, b),
            (Val::Class(a), Val::Class(b)) => Rc::ptr_eq(a, b),
            (Val::Instance(a), Val::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    // ---- printing -------------------------------------------------------

    /// Developer-facing rendering: strings come out quoted, numbers through
    /// itoa/ryu, arrays in literal syntax.
    pub fn print_string(&self) -> String {
        match self {
            Val::Str(s) => format!("\"{}\"", s),
            other => other.display_string(),
        }
    }

    pub fn display_string(&self) -> String {
        match self {
            Val::Nil => "nil".to_string(),
            Val::Bool(b) => b.to_string(),
            Val::Int(i) => itoa::Buffer::new().format(*i).to_string(),
            Val::Float(f) => {
                if f.is_finite() {
                    ryu::Buffer::new().format(*f).to_string()
                } else {
                    f.to_string()
                }
            }
            Val::Str(s) => s.to_string(),
            Val::Symbol(s) => format!("#{}", s),
            Val::Array(items) => {
                let items = items.borrow();
                let mut out = String::from("#(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(&item.print_string());
                }
                out.push(')');
                out
            }
            Val::Table(data) => {
                let data = data.borrow();
                let mut out = String::from("#{");
                for (i, (k, v)) in data.iter().enumerate() {
                    if i > 0 {
                        out.push_str(". ");
                    }
                    out.push_str(&format!("\"{}\" -> {}", k, v.print_string()));
                }
                out.push('}');
                out
            }
            Val::Block(b) => format!("a Block/{}", b.num_args()),
            Val::Class(c) => c.borrow().name.to_string(),
            Val::Instance(i) => i.borrow().print_string(),
        }
    }
}

/// Structural equality (`=` default): primitives, strings and symbols by
/// value with Int/Float widening; heap values by identity unless a class
/// overrides `=`.
impl PartialEq for Val {
    fn eq(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Int(a), Val::Float(b)) | (Val::Float(b), Val::Int(a)) => *a as f64 == *b,
            _ => self.identical(other),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

fn type_error(expected: &str, got: &Val) -> RuntimeError {
    RuntimeError::value(format!("expected {}, got {}", expected, got.type_name()))
}
