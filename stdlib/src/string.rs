use smalt_core::error::{RtResult, RuntimeError};
use smalt_core::kernel::add_native_method;
use smalt_core::obj::NativeDef;
use smalt_core::val::Val;
use smalt_core::Vm;

pub fn register(vm: &mut Vm) -> RtResult<()> {
    let string = vm.kernel().classes.string.clone();
    add_native_method(&string, "asUppercase", NativeDef::Plain(as_uppercase))?;
    add_native_method(&string, "asLowercase", NativeDef::Plain(as_lowercase))?;
    add_native_method(&string, "reversed", NativeDef::Plain(reversed))?;
    add_native_method(&string, "startsWith:", NativeDef::Plain(starts_with))?;
    add_native_method(&string, "endsWith:", NativeDef::Plain(ends_with))?;
    add_native_method(&string, "includesSubstring:", NativeDef::Plain(includes_substring))?;
    add_native_method(&string, "at:", NativeDef::Plain(at))?;
    add_native_method(&string, "trimmed", NativeDef::Plain(trimmed))?;
    add_native_method(&string, "asInteger", NativeDef::Plain(as_integer))?;
    Ok(())
}

fn as_uppercase(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::str(receiver.as_str()?.to_uppercase()))
}

fn as_lowercase(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::str(receiver.as_str()?.to_lowercase()))
}

fn reversed(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::str(receiver.as_str()?.chars().rev().collect::<String>()))
}

fn starts_with(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    let prefix = args
        .first()
        .ok_or_else(|| RuntimeError::dispatch("startsWith: expects 1 argument"))?;
    Ok(Val::Bool(
        receiver.as_str()?.starts_with(prefix.as_str()?.as_ref()),
    ))
}

fn ends_with(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    let suffix = args
        .first()
        .ok_or_else(|| RuntimeError::dispatch("endsWith: expects 1 argument"))?;
    Ok(Val::Bool(
        receiver.as_str()?.ends_with(suffix.as_str()?.as_ref()),
    ))
}

fn includes_substring(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    let needle = args
        .first()
        .ok_or_else(|| RuntimeError::dispatch("includesSubstring: expects 1 argument"))?;
    Ok(Val::Bool(
        receiver.as_str()?.contains(needle.as_str()?.as_ref()),
    ))
}

/// 1-based character access, answering a one-character string.
fn at(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    let index = args
        .first()
        .ok_or_else(|| RuntimeError::dispatch("at: expects 1 argument"))?
        .as_int()?;
    let s = receiver.as_str()?;
    if index < 1 {
        return Err(RuntimeError::value(format!("index {} out of bounds", index)));
    }
    s.chars()
        .nth(index as usize - 1)
        .map(|c| Val::str(c.to_string()))
        .ok_or_else(|| {
            RuntimeError::value(format!(
                "index {} out of bounds (size {})",
                index,
                s.chars().count()
            ))
        })
}

fn trimmed(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::str(receiver.as_str()?.trim()))
}

fn as_integer(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let s = receiver.as_str()?;
    s.trim()
        .parse::<i64>()
        .map(Val::Int)
        .map_err(|_| RuntimeError::value(format!("'{}' is not an integer", s)))
}
