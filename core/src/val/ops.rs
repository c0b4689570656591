use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Sub};

use crate::error::{RtResult, RuntimeError};

use super::Val;

fn err_op(lhs: &Val, op: &str, rhs: &Val) -> RuntimeError {
    RuntimeError::value(format!(
        "cannot apply '{}' to {} and {}",
        op,
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn overflow(op: &str) -> RuntimeError {
    RuntimeError::value(format!("integer overflow in '{}'", op))
}

impl Add for &Val {
    type Output = RtResult<Val>;

    /// Int + Float widens to Float; Int + Int is checked so deep arithmetic
    /// fails with a value error instead of a wrap or a panic.
    fn add(self, other: Self) -> Self::Output {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => a.checked_add(*b).map(Val::Int).ok_or_else(|| overflow("+")),
            (Val::Float(a), Val::Float(b)) => Ok(Val::Float(a + b)),
            (Val::Float(a), Val::Int(b)) => Ok(Val::Float(a + *b as f64)),
            (Val::Int(a), Val::Float(b)) => Ok(Val::Float(*a as f64 + b)),
            _ => Err(err_op(self, "+", other)),
        }
    }
}

impl Sub for &Val {
    type Output = RtResult<Val>;

    fn sub(self, other: Self) -> Self::Output {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => a.checked_sub(*b).map(Val::Int).ok_or_else(|| overflow("-")),
            (Val::Float(a), Val::Float(b)) => Ok(Val::Float(a - b)),
            (Val::Float(a), Val::Int(b)) => Ok(Val::Float(a - *b as f64)),
            (Val::Int(a), Val::Float(b)) => Ok(Val::Float(*a as f64 - b)),
            _ => Err(err_op(self, "-", other)),
        }
    }
}

impl Mul for &Val {
    type Output = RtResult<Val>;

    fn mul(self, other: Self) -> Self::Output {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => a.checked_mul(*b).map(Val::Int).ok_or_else(|| overflow("*")),
            (Val::Float(a), Val::Float(b)) => Ok(Val::Float(a * b)),
            (Val::Float(a), Val::Int(b)) => Ok(Val::Float(a * *b as f64)),
            (Val::Int(a), Val::Float(b)) => Ok(Val::Float(*a as f64 * b)),
            _ => Err(err_op(self, "*", other)),
        }
    }
}

impl Div for &Val {
    type Output = RtResult<Val>;

    /// `/` is exact on evenly-divisible Ints and widens to Float otherwise.
    fn div(self, other: Self) -> Self::Output {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => {
                if *b == 0 {
                    return Err(RuntimeError::value("division by zero"));
                }
                if a % b == 0 {
                    Ok(Val::Int(a / b))
                } else {
                    Ok(Val::Float(*a as f64 / *b as f64))
                }
            }
            (Val::Int(_) | Val::Float(_), Val::Int(_) | Val::Float(_)) => {
                let a = self.as_float()?;
                let b = other.as_float()?;
                if b == 0.0 {
                    return Err(RuntimeError::value("division by zero"));
                }
                Ok(Val::Float(a / b))
            }
            _ => Err(err_op(self, "/", other)),
        }
    }
}

impl Val {
    /// `//` floor division; integer operands only.
    pub fn int_div(&self, other: &Val) -> RtResult<Val> {
        match (self, other) {
            (Val::Int(_), Val::Int(0)) => Err(RuntimeError::value("division by zero")),
            (Val::Int(a), Val::Int(b)) => {
                a.checked_div_euclid(*b).map(Val::Int).ok_or_else(|| overflow("//"))
            }
            _ => Err(err_op(self, "//", other)),
        }
    }

    /// `\` floor modulo; integer operands only.
    pub fn modulo(&self, other: &Val) -> RtResult<Val> {
        match (self, other) {
            (Val::Int(_), Val::Int(0)) => Err(RuntimeError::value("division by zero")),
            (Val::Int(a), Val::Int(b)) => {
                a.checked_rem_euclid(*b).map(Val::Int).ok_or_else(|| overflow("\\"))
            }
            _ => Err(err_op(self, "\\", other)),
        }
    }

    /// Ordering for `<` and friends: numbers with widening, strings and
    /// symbols lexicographically.
    pub fn compare(&self, other: &Val) -> RtResult<Ordering> {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => Ok(a.cmp(b)),
            (Val::Str(a), Val::Str(b)) => Ok(a.cmp(b)),
            (Val::Symbol(a), Val::Symbol(b)) => Ok(a.cmp(b)),
            (Val::Int(_) | Val::Float(_), Val::Int(_) | Val::Float(_)) => {
                let a = self.as_float()?;
                let b = other.as_float()?;
                a.partial_cmp(&b)
                    .ok_or_else(|| RuntimeError::value("NaN is not comparable"))
            }
            _ => Err(err_op(self, "<", other)),
        }
    }
}
