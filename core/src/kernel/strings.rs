use std::rc::Rc;

use crate::error::{RtResult, RuntimeError};
use crate::kernel::{expect_args, install_raw, KernelClasses};
use crate::obj::NativeDef;
use crate::val::Val;

pub(crate) fn install(classes: &KernelClasses) {
    let string = &classes.string;
    install_raw(string, ",", NativeDef::Plain(str_concat));
    install_raw(string, "size", NativeDef::Plain(str_size));
    install_raw(string, "isEmpty", NativeDef::Plain(str_is_empty));
    install_raw(string, "asSymbol", NativeDef::Plain(str_as_symbol));
    install_raw(string, "asString", NativeDef::Plain(str_as_string));
    install_raw(string, "<", NativeDef::Plain(str_lt));
    install_raw(string, "<=", NativeDef::Plain(str_le));
    install_raw(string, ">", NativeDef::Plain(str_gt));
    install_raw(string, ">=", NativeDef::Plain(str_ge));

    let symbol = &classes.symbol;
    install_raw(symbol, "size", NativeDef::Plain(str_size));
    install_raw(symbol, "asString", NativeDef::Plain(sym_as_string));
    install_raw(symbol, "asSymbol", NativeDef::Plain(obj_self));
}

fn text_of(value: &Val) -> RtResult<&Rc<str>> {
    match value {
        Val::Str(s) | Val::Symbol(s) => Ok(s),
        other => Err(RuntimeError::value(format!(
            "expected String, got {}",
            other.type_name()
        ))),
    }
}

fn str_concat(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args(",", args, 1)?;
    let lhs = receiver.as_str()?;
    let rhs = args[0].as_str()?;
    if lhs.is_empty() {
        return Ok(args[0].clone());
    }
    if rhs.is_empty() {
        return Ok(receiver.clone());
    }
    let mut out = String::with_capacity(lhs.len() + rhs.len());
    out.push_str(lhs);
    out.push_str(rhs);
    Ok(Val::str(out))
}

fn str_size(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Int(text_of(receiver)?.chars().count() as i64))
}

fn str_is_empty(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Bool(receiver.as_str()?.is_empty()))
}

fn str_as_symbol(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Symbol(receiver.as_str()?.clone()))
}

fn str_as_string(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(receiver.clone())
}

fn sym_as_string(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Str(receiver.as_symbol()?.clone()))
}

fn obj_self(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(receiver.clone())
}

fn str_lt(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("<", args, 1)?;
    Ok(Val::Bool(receiver.compare(&args[0])?.is_lt()))
}

fn str_le(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("<=", args, 1)?;
    Ok(Val::Bool(receiver.compare(&args[0])?.is_le()))
}

fn str_gt(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args(">", args, 1)?;
    Ok(Val::Bool(receiver.compare(&args[0])?.is_gt()))
}

fn str_ge(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args(">=", args, 1)?;
    Ok(Val::Bool(receiver.compare(&args[0])?.is_ge()))
}
