use std::cmp::Ordering;

use smalt_core::error::{RtResult, RuntimeError};
use smalt_core::kernel::add_native_method;
use smalt_core::obj::NativeDef;
use smalt_core::val::Val;
use smalt_core::vm::Interp;
use smalt_core::Vm;

pub fn register(vm: &mut Vm) -> RtResult<()> {
    let array = vm.kernel().classes.array.clone();
    add_native_method(&array, "sorted", NativeDef::Plain(sorted))?;
    add_native_method(&array, "sorted:", NativeDef::WithVm(sorted_by))?;
    add_native_method(&array, "reversed", NativeDef::Plain(reversed))?;
    add_native_method(&array, "copyFrom:to:", NativeDef::Plain(copy_from_to))?;
    Ok(())
}

/// Natural ascending order; elements must be mutually comparable.
fn sorted(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let mut items = receiver.as_array()?.borrow().clone();
    let mut failed: Option<RuntimeError> = None;
    items.sort_by(|a, b| match a.compare(b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failed.get_or_insert(err);
            Ordering::Equal
        }
    });
    match failed {
        Some(err) => Err(err),
        None => Ok(Val::array(items)),
    }
}

/// Sort with a two-argument comparison block, evaluated through the
/// native re-entry path: the block runs to completion inside this call.
fn sorted_by(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    let compare = args
        .first()
        .ok_or_else(|| RuntimeError::dispatch("sorted: expects 1 argument"))?
        .as_block()?
        .clone();
    let mut items = receiver.as_array()?.borrow().clone();
    // Insertion sort so every comparison can propagate an error cleanly.
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 {
            let keep = interp.call_block(
                &compare,
                vec![items[j - 1].clone(), items[j].clone()],
            )?;
            if keep.as_bool()? {
                break;
            }
            items.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(Val::array(items))
}

fn reversed(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let mut items = receiver.as_array()?.borrow().clone();
    items.reverse();
    Ok(Val::array(items))
}

fn copy_from_to(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    let items = receiver.as_array()?.borrow().clone();
    let from = args
        .first()
        .ok_or_else(|| RuntimeError::dispatch("copyFrom:to: expects 2 arguments"))?
        .as_int()?;
    let to = args
        .get(1)
        .ok_or_else(|| RuntimeError::dispatch("copyFrom:to: expects 2 arguments"))?
        .as_int()?;
    if from < 1 || to > items.len() as i64 || from > to + 1 {
        return Err(RuntimeError::value(format!(
            "copyFrom: {} to: {} out of bounds (size {})",
            from,
            to,
            items.len()
        )));
    }
    Ok(Val::array(items[from as usize - 1..to as usize].to_vec()))
}
