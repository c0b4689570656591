use smalt_core::error::{RtResult, RuntimeError};
use smalt_core::kernel::{add_native_class_method, add_native_method};
use smalt_core::obj::NativeDef;
use smalt_core::val::Val;
use smalt_core::Vm;

/// Numeric natives beyond the kernel's arithmetic: rounding on Number,
/// constants on Float, and the named primitives the prelude's
/// `<primitive: "...">` method bodies resolve to.
pub fn register(vm: &mut Vm) -> RtResult<()> {
    let number = vm.kernel().classes.number.clone();
    add_native_method(&number, "floor", NativeDef::Plain(floor))?;
    add_native_method(&number, "ceiling", NativeDef::Plain(ceiling))?;
    add_native_method(&number, "rounded", NativeDef::Plain(rounded))?;
    add_native_method(&number, "truncated", NativeDef::Plain(truncated))?;

    let float = vm.kernel().classes.float.clone();
    add_native_class_method(&float, "pi", NativeDef::Plain(pi))?;
    add_native_class_method(&float, "e", NativeDef::Plain(e))?;

    let kernel = vm.kernel();
    kernel.register_primitive("numberSqrt", NativeDef::Plain(sqrt));
    kernel.register_primitive("numberLn", NativeDef::Plain(ln));
    kernel.register_primitive("numberExp", NativeDef::Plain(exp));
    kernel.register_primitive("numberRaisedTo", NativeDef::Plain(raised_to));
    Ok(())
}

fn floor(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    match receiver {
        Val::Int(_) => Ok(receiver.clone()),
        _ => Ok(Val::Int(receiver.as_float()?.floor() as i64)),
    }
}

fn ceiling(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    match receiver {
        Val::Int(_) => Ok(receiver.clone()),
        _ => Ok(Val::Int(receiver.as_float()?.ceil() as i64)),
    }
}

fn rounded(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    match receiver {
        Val::Int(_) => Ok(receiver.clone()),
        _ => Ok(Val::Int(receiver.as_float()?.round() as i64)),
    }
}

fn truncated(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    match receiver {
        Val::Int(_) => Ok(receiver.clone()),
        _ => Ok(Val::Int(receiver.as_float()?.trunc() as i64)),
    }
}

fn pi(_receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Float(std::f64::consts::PI))
}

fn e(_receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Float(std::f64::consts::E))
}

fn sqrt(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let x = receiver.as_float()?;
    if x < 0.0 {
        return Err(RuntimeError::value("sqrt of a negative number"));
    }
    Ok(Val::Float(x.sqrt()))
}

fn ln(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let x = receiver.as_float()?;
    if x <= 0.0 {
        return Err(RuntimeError::value("ln of a non-positive number"));
    }
    Ok(Val::Float(x.ln()))
}

fn exp(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Float(receiver.as_float()?.exp()))
}

fn raised_to(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    match (receiver, args.first()) {
        (Val::Int(base), Some(Val::Int(power))) if *power >= 0 => {
            let power = u32::try_from(*power)
                .map_err(|_| RuntimeError::value("exponent too large"))?;
            base.checked_pow(power)
                .map(Val::Int)
                .ok_or_else(|| RuntimeError::value("integer overflow in 'raisedTo:'"))
        }
        (_, Some(power)) => Ok(Val::Float(receiver.as_float()?.powf(power.as_float()?))),
        (_, None) => Err(RuntimeError::dispatch("raisedTo: expects 1 argument")),
    }
}
