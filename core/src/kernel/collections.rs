use crate::error::{RtResult, RuntimeError};
use crate::kernel::{expect_args, install_class_raw, install_raw, name_arg, KernelClasses};
use crate::obj::NativeDef;
use crate::val::{TableData, Val};
use crate::vm::Interp;

pub(crate) fn install(classes: &KernelClasses) {
    let array = &classes.array;
    install_class_raw(array, "new", NativeDef::Plain(array_new));
    install_class_raw(array, "new:", NativeDef::Plain(array_new_sized));
    install_raw(array, "at:", NativeDef::Plain(array_at));
    install_raw(array, "at:put:", NativeDef::Plain(array_at_put));
    install_raw(array, "size", NativeDef::Plain(array_size));
    install_raw(array, "isEmpty", NativeDef::Plain(array_is_empty));
    install_raw(array, "first", NativeDef::Plain(array_first));
    install_raw(array, "last", NativeDef::Plain(array_last));
    install_raw(array, "add:", NativeDef::Plain(array_add));
    install_raw(array, "includes:", NativeDef::Plain(array_includes));
    install_raw(array, "copy", NativeDef::Plain(array_copy));
    install_raw(array, ",", NativeDef::Plain(array_concat));

    let table = &classes.table;
    install_class_raw(table, "new", NativeDef::Plain(table_new));
    install_raw(table, "at:", NativeDef::Plain(table_at));
    install_raw(table, "at:put:", NativeDef::Plain(table_at_put));
    install_raw(table, "at:ifAbsent:", NativeDef::WithVm(table_at_if_absent));
    install_raw(table, "removeKey:", NativeDef::Plain(table_remove_key));
    install_raw(table, "includesKey:", NativeDef::Plain(table_includes_key));
    install_raw(table, "keys", NativeDef::Plain(table_keys));
    install_raw(table, "values", NativeDef::Plain(table_values));
    install_raw(table, "size", NativeDef::Plain(table_size));
    install_raw(table, "isEmpty", NativeDef::Plain(table_is_empty));
}

// ---- Array -------------------------------------------------------------

fn array_new(_receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::array(Vec::new()))
}

fn array_new_sized(_receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("new:", args, 1)?;
    let n = args[0].as_int()?;
    if n < 0 {
        return Err(RuntimeError::value("array size cannot be negative"));
    }
    Ok(Val::array(vec![Val::Nil; n as usize]))
}

/// 1-based index, bounds-checked.
fn index_into(items_len: usize, index: &Val) -> RtResult<usize> {
    let i = index.as_int()?;
    if i < 1 || i as usize > items_len {
        return Err(RuntimeError::value(format!(
            "index {} out of bounds (size {})",
            i, items_len
        )));
    }
    Ok(i as usize - 1)
}

fn array_at(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("at:", args, 1)?;
    let items = receiver.as_array()?.borrow();
    let idx = index_into(items.len(), &args[0])?;
    Ok(items[idx].clone())
}

fn array_at_put(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("at:put:", args, 2)?;
    let items = receiver.as_array()?;
    let idx = index_into(items.borrow().len(), &args[0])?;
    items.borrow_mut()[idx] = args[1].clone();
    Ok(args[1].clone())
}

fn array_size(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Int(receiver.as_array()?.borrow().len() as i64))
}

fn array_is_empty(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Bool(receiver.as_array()?.borrow().is_empty()))
}

fn array_first(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    receiver
        .as_array()?
        .borrow()
        .first()
        .cloned()
        .ok_or_else(|| RuntimeError::value("first on an empty array"))
}

fn array_last(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    receiver
        .as_array()?
        .borrow()
        .last()
        .cloned()
        .ok_or_else(|| RuntimeError::value("last on an empty array"))
}

fn array_add(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("add:", args, 1)?;
    receiver.as_array()?.borrow_mut().push(args[0].clone());
    Ok(args[0].clone())
}

fn array_includes(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("includes:", args, 1)?;
    Ok(Val::Bool(
        receiver.as_array()?.borrow().iter().any(|v| v == &args[0]),
    ))
}

fn array_copy(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::array(receiver.as_array()?.borrow().clone()))
}

fn array_concat(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args(",", args, 1)?;
    let mut out = receiver.as_array()?.borrow().clone();
    out.extend(args[0].as_array()?.borrow().iter().cloned());
    Ok(Val::array(out))
}

// ---- Table -------------------------------------------------------------

fn table_new(_receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::table(TableData::default()))
}

fn table_at(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("at:", args, 1)?;
    let key = name_arg(&args[0])?;
    receiver
        .as_table()?
        .borrow()
        .get(&key)
        .cloned()
        .ok_or_else(|| RuntimeError::value(format!("key '{}' not found", key)))
}

fn table_at_put(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("at:put:", args, 2)?;
    let key = name_arg(&args[0])?;
    receiver.as_table()?.borrow_mut().insert(key, args[1].clone());
    Ok(args[1].clone())
}

fn table_at_if_absent(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("at:ifAbsent:", args, 2)?;
    let key = name_arg(&args[0])?;
    let found = receiver.as_table()?.borrow().get(&key).cloned();
    match found {
        Some(value) => Ok(value),
        None => match &args[1] {
            Val::Block(block) => interp.call_block(block, Vec::new()),
            other => Ok(other.clone()),
        },
    }
}

fn table_remove_key(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("removeKey:", args, 1)?;
    let key = name_arg(&args[0])?;
    Ok(receiver
        .as_table()?
        .borrow_mut()
        .remove(&key)
        .unwrap_or(Val::Nil))
}

fn table_includes_key(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("includesKey:", args, 1)?;
    let key = name_arg(&args[0])?;
    Ok(Val::Bool(receiver.as_table()?.borrow().contains_key(&key)))
}

fn table_keys(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let keys = receiver
        .as_table()?
        .borrow()
        .keys()
        .map(|k| Val::Str(k.clone()))
        .collect();
    Ok(Val::array(keys))
}

fn table_values(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let values = receiver.as_table()?.borrow().values().cloned().collect();
    Ok(Val::array(values))
}

fn table_size(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Int(receiver.as_table()?.borrow().len() as i64))
}

fn table_is_empty(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Bool(receiver.as_table()?.borrow().is_empty()))
}
