use crate::error::{RtResult, RuntimeError};
use crate::kernel::{expect_args, install_raw, KernelClasses};
use crate::obj::NativeDef;
use crate::val::Val;

pub(crate) fn install(classes: &KernelClasses) {
    let number = &classes.number;
    install_raw(number, "+", NativeDef::Plain(num_add));
    install_raw(number, "-", NativeDef::Plain(num_sub));
    install_raw(number, "*", NativeDef::Plain(num_mul));
    install_raw(number, "/", NativeDef::Plain(num_div));
    install_raw(number, "//", NativeDef::Plain(num_int_div));
    install_raw(number, "\\", NativeDef::Plain(num_modulo));
    install_raw(number, "<", NativeDef::Plain(num_lt));
    install_raw(number, "<=", NativeDef::Plain(num_le));
    install_raw(number, ">", NativeDef::Plain(num_gt));
    install_raw(number, ">=", NativeDef::Plain(num_ge));
    install_raw(number, "min:", NativeDef::Plain(num_min));
    install_raw(number, "max:", NativeDef::Plain(num_max));
    install_raw(number, "abs", NativeDef::Plain(num_abs));
    install_raw(number, "negated", NativeDef::Plain(num_negated));
    install_raw(number, "asFloat", NativeDef::Plain(num_as_float));
    install_raw(number, "asInteger", NativeDef::Plain(num_as_integer));
    install_raw(number, "isZero", NativeDef::Plain(num_is_zero));
}

fn num_add(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("+", args, 1)?;
    receiver + &args[0]
}

fn num_sub(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("-", args, 1)?;
    receiver - &args[0]
}

fn num_mul(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("*", args, 1)?;
    receiver * &args[0]
}

fn num_div(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("/", args, 1)?;
    receiver / &args[0]
}

fn num_int_div(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("//", args, 1)?;
    receiver.int_div(&args[0])
}

fn num_modulo(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("\\", args, 1)?;
    receiver.modulo(&args[0])
}

fn num_lt(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("<", args, 1)?;
    Ok(Val::Bool(receiver.compare(&args[0])?.is_lt()))
}

fn num_le(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("<=", args, 1)?;
    Ok(Val::Bool(receiver.compare(&args[0])?.is_le()))
}

fn num_gt(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args(">", args, 1)?;
    Ok(Val::Bool(receiver.compare(&args[0])?.is_gt()))
}

fn num_ge(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args(">=", args, 1)?;
    Ok(Val::Bool(receiver.compare(&args[0])?.is_ge()))
}

fn num_min(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("min:", args, 1)?;
    if receiver.compare(&args[0])?.is_le() {
        Ok(receiver.clone())
    } else {
        Ok(args[0].clone())
    }
}

fn num_max(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("max:", args, 1)?;
    if receiver.compare(&args[0])?.is_ge() {
        Ok(receiver.clone())
    } else {
        Ok(args[0].clone())
    }
}

fn num_abs(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    match receiver {
        Val::Int(i) => i
            .checked_abs()
            .map(Val::Int)
            .ok_or_else(|| RuntimeError::value("integer overflow in 'abs'")),
        Val::Float(f) => Ok(Val::Float(f.abs())),
        other => Err(RuntimeError::value(format!(
            "expected number, got {}",
            other.type_name()
        ))),
    }
}

fn num_negated(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    match receiver {
        Val::Int(i) => i
            .checked_neg()
            .map(Val::Int)
            .ok_or_else(|| RuntimeError::value("integer overflow in 'negated'")),
        Val::Float(f) => Ok(Val::Float(-f)),
        other => Err(RuntimeError::value(format!(
            "expected number, got {}",
            other.type_name()
        ))),
    }
}

fn num_as_float(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Float(receiver.as_float()?))
}

fn num_as_integer(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    match receiver {
        Val::Int(_) => Ok(receiver.clone()),
        Val::Float(f) if f.is_finite() => Ok(Val::Int(f.trunc() as i64)),
        Val::Float(_) => Err(RuntimeError::value("cannot convert a non-finite float")),
        other => Err(RuntimeError::value(format!(
            "expected number, got {}",
            other.type_name()
        ))),
    }
}

fn num_is_zero(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Bool(matches!(receiver, Val::Int(0)) || matches!(receiver, Val::Float(f) if *f == 0.0)))
}
