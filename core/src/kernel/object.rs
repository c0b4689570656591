use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::ast::BlockTemplate;
use crate::error::{RtResult, RuntimeError};
use crate::kernel::{expect_args, install_class_raw, install_raw, name_arg, KernelClasses};
use crate::obj::{
    add_parent, generate_accessors, inherits_from, install_class_method, install_method, Class,
    Instance, NativeDef,
};
use crate::val::{BlockValue, Val};
use crate::vm::{dispatch_lookup, Interp};

pub(crate) fn install(classes: &KernelClasses) {
    let object = &classes.object;

    install_raw(object, "=", NativeDef::Plain(obj_eq));
    install_raw(object, "~=", NativeDef::Plain(obj_ne));
    install_raw(object, "==", NativeDef::Plain(obj_identical));
    install_raw(object, "~~", NativeDef::Plain(obj_not_identical));
    install_raw(object, "isNil", NativeDef::Plain(obj_is_nil));
    install_raw(object, "notNil", NativeDef::Plain(obj_not_nil));
    install_raw(object, "class", NativeDef::WithVm(obj_class));
    install_raw(object, "isKindOf:", NativeDef::WithVm(obj_is_kind_of));
    install_raw(object, "respondsTo:", NativeDef::WithVm(obj_responds_to));
    install_raw(object, "printString", NativeDef::Plain(obj_print_string));
    install_raw(object, "displayString", NativeDef::Plain(obj_display_string));
    install_raw(object, "printNl", NativeDef::Plain(obj_print_nl));
    install_raw(object, "displayNl", NativeDef::Plain(obj_display_nl));
    install_raw(object, "yourself", NativeDef::Plain(obj_yourself));
    install_raw(object, "hash", NativeDef::Plain(obj_hash));
    install_raw(object, "error:", NativeDef::WithVm(obj_error));
    install_raw(
        object,
        "doesNotUnderstand:",
        NativeDef::WithVm(obj_does_not_understand),
    );

    install_class_raw(object, "new", NativeDef::Plain(class_new));
    install_class_raw(object, "derive", NativeDef::Plain(class_derive));
    install_class_raw(object, "derive:", NativeDef::Plain(class_derive_slots));
    install_class_raw(object, "selector:put:", NativeDef::Plain(class_selector_put));
    install_class_raw(
        object,
        "classSelector:put:",
        NativeDef::Plain(class_class_selector_put),
    );
    install_class_raw(object, "addParent:", NativeDef::Plain(class_add_parent));
    install_class_raw(object, "name", NativeDef::Plain(class_name));
    install_class_raw(object, "parents", NativeDef::Plain(class_parents));
    install_class_raw(object, "slotNames", NativeDef::Plain(class_slot_names));
    install_class_raw(object, "allSlotNames", NativeDef::Plain(class_all_slot_names));
    install_class_raw(object, "tags", NativeDef::Plain(class_tags));
    install_class_raw(object, "tag:", NativeDef::Plain(class_tag));

    let boolean = &classes.boolean;
    install_raw(boolean, "not", NativeDef::Plain(bool_not));
    install_raw(boolean, "&", NativeDef::Plain(bool_and));
    install_raw(boolean, "|", NativeDef::Plain(bool_or));

    // Classes themselves respond to printString through the Class class.
    install_raw(&classes.class_cls, "printString", NativeDef::Plain(cls_print_string));
}

// ---- Object ------------------------------------------------------------

fn obj_eq(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("=", args, 1)?;
    Ok(Val::Bool(receiver == &args[0]))
}

fn obj_ne(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("~=", args, 1)?;
    Ok(Val::Bool(receiver != &args[0]))
}

fn obj_identical(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("==", args, 1)?;
    Ok(Val::Bool(receiver.identical(&args[0])))
}

fn obj_not_identical(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("~~", args, 1)?;
    Ok(Val::Bool(!receiver.identical(&args[0])))
}

fn obj_is_nil(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Bool(receiver.is_nil()))
}

fn obj_not_nil(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Bool(!receiver.is_nil()))
}

fn obj_class(interp: &mut Interp, receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Class(interp.class_of(receiver)))
}

fn obj_is_kind_of(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("isKindOf:", args, 1)?;
    let target = args[0].as_class()?;
    let class = interp.class_of(receiver);
    Ok(Val::Bool(inherits_from(&class, target)))
}

fn obj_responds_to(interp: &mut Interp, receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("respondsTo:", args, 1)?;
    let selector = name_arg(&args[0])?;
    Ok(Val::Bool(
        dispatch_lookup(interp, receiver, &selector).is_some(),
    ))
}

fn obj_print_string(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::str(receiver.print_string()))
}

fn obj_display_string(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::str(receiver.display_string()))
}

fn obj_print_nl(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    println!("{}", receiver.print_string());
    Ok(receiver.clone())
}

fn obj_display_nl(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    println!("{}", receiver.display_string());
    Ok(receiver.clone())
}

fn obj_yourself(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(receiver.clone())
}

fn obj_hash(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let mut hasher = DefaultHasher::new();
    match receiver {
        Val::Nil => 0u8.hash(&mut hasher),
        Val::Bool(b) => b.hash(&mut hasher),
        Val::Int(i) => i.hash(&mut hasher),
        Val::Float(f) => f.to_bits().hash(&mut hasher),
        Val::Str(s) | Val::Symbol(s) => s.hash(&mut hasher),
        Val::Array(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
        Val::Table(t) => (Rc::as_ptr(t) as usize).hash(&mut hasher),
        Val::Block(b) => (Rc::as_ptr(b) as usize).hash(&mut hasher),
        Val::Class(c) => (Rc::as_ptr(c) as usize).hash(&mut hasher),
        Val::Instance(i) => (Rc::as_ptr(i) as usize).hash(&mut hasher),
    }
    Ok(Val::Int((hasher.finish() >> 1) as i64))
}

fn obj_error(interp: &mut Interp, _receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("error:", args, 1)?;
    let message = args[0].display_string();
    let instance = Instance::new_of(&interp.kernel().classes.error);
    let offset = instance.borrow().class.borrow().slot_offset("message");
    if let Some(offset) = offset {
        instance.borrow_mut().set_slot(offset, Val::str(&message))?;
    }
    Err(RuntimeError::signal(message, Val::Instance(instance)))
}

/// Default DNU: raise a dispatch error naming the original selector. The
/// argument is the materialized message: `#(selector arguments)`.
fn obj_does_not_understand(
    interp: &mut Interp,
    receiver: &Val,
    args: &[Val],
) -> RtResult<Val> {
    let selector = args
        .first()
        .and_then(|m| m.as_array().ok().cloned())
        .and_then(|a| a.borrow().first().cloned())
        .map(|s| s.display_string())
        .unwrap_or_else(|| "#?".to_string());
    let class = interp.class_of(receiver);
    let name = class.borrow().name.clone();
    Err(RuntimeError::dispatch(format!(
        "{} does not understand {}",
        name, selector
    )))
}

// ---- class-side --------------------------------------------------------

fn class_new(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    Ok(Val::Instance(Instance::new_of(class)))
}

fn class_derive(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let parent = receiver.as_class()?;
    let class = Class::define("", vec![parent.clone()], vec![])?;
    Ok(Val::Class(class))
}

fn class_derive_slots(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("derive:", args, 1)?;
    let parent = receiver.as_class()?;
    let slots = args[0].as_array()?;
    let mut slot_names = Vec::with_capacity(slots.borrow().len());
    for slot in slots.borrow().iter() {
        slot_names.push(name_arg(slot)?);
    }
    let class = Class::define("", vec![parent.clone()], slot_names)?;
    generate_accessors(&class)?;
    Ok(Val::Class(class))
}

/// Force method semantics onto an installed block: `is_method` governs
/// both `^` targeting and the implicit `self` result.
fn as_method_body(block: &Rc<BlockValue>) -> Rc<BlockValue> {
    if block.is_method() && block.home.is_none() {
        return block.clone();
    }
    let template = Rc::new(BlockTemplate {
        is_method: true,
        ..(*block.template).clone()
    });
    Rc::new(BlockValue {
        template,
        captured: block.captured.clone(),
        home: None,
    })
}

fn class_selector_put(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("selector:put:", args, 2)?;
    let class = receiver.as_class()?;
    let selector = name_arg(&args[0])?;
    let block = args[1].as_block()?;
    install_method(class, selector, as_method_body(block))?;
    Ok(receiver.clone())
}

fn class_class_selector_put(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("classSelector:put:", args, 2)?;
    let class = receiver.as_class()?;
    let selector = name_arg(&args[0])?;
    let block = args[1].as_block()?;
    install_class_method(class, selector, as_method_body(block))?;
    Ok(receiver.clone())
}

fn class_add_parent(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("addParent:", args, 1)?;
    let class = receiver.as_class()?;
    let parent = args[0].as_class()?;
    add_parent(class, parent)?;
    Ok(receiver.clone())
}

fn class_name(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    let name = class.borrow().name.clone();
    Ok(Val::Str(name))
}

fn class_parents(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    let parents = class.borrow().parents.iter().cloned().map(Val::Class).collect();
    Ok(Val::array(parents))
}

fn class_slot_names(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    let names = class
        .borrow()
        .slot_names
        .iter()
        .map(|s| Val::Symbol(s.clone()))
        .collect();
    Ok(Val::array(names))
}

fn class_all_slot_names(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    let names = class
        .borrow()
        .all_slot_names
        .iter()
        .map(|s| Val::Symbol(s.clone()))
        .collect();
    Ok(Val::array(names))
}

fn class_tags(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    let tags = class.borrow().tags.iter().map(|t| Val::Str(t.clone())).collect();
    Ok(Val::array(tags))
}

fn class_tag(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("tag:", args, 1)?;
    let class = receiver.as_class()?;
    let tag = name_arg(&args[0])?;
    class.borrow_mut().tags.push(tag);
    Ok(receiver.clone())
}

fn cls_print_string(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    let class = receiver.as_class()?;
    let name = class.borrow().name.clone();
    Ok(Val::Str(name))
}

// ---- Boolean -----------------------------------------------------------

fn bool_not(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    Ok(Val::Bool(!receiver.as_bool()?))
}

fn bool_and(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("&", args, 1)?;
    Ok(Val::Bool(receiver.as_bool()? && args[0].as_bool()?))
}

fn bool_or(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    expect_args("|", args, 1)?;
    Ok(Val::Bool(receiver.as_bool()? || args[0].as_bool()?))
}
