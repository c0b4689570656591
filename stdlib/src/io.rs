use std::io::Write;
use std::rc::Rc;

use smalt_core::error::RtResult;
use smalt_core::kernel::add_native_class_method;
use smalt_core::obj::{Class, NativeDef};
use smalt_core::val::Val;
use smalt_core::Vm;

/// `Transcript`: the classic console sink, as a class-side protocol on a
/// dedicated class registered into the globals.
pub fn register(vm: &mut Vm) -> RtResult<()> {
    let object = vm.kernel().classes.object.clone();
    let transcript = Class::define("Transcript", vec![object], vec![])?;
    add_native_class_method(&transcript, "show:", NativeDef::Plain(show))?;
    add_native_class_method(&transcript, "showLine:", NativeDef::Plain(show_line))?;
    add_native_class_method(&transcript, "print:", NativeDef::Plain(print_val))?;
    add_native_class_method(&transcript, "cr", NativeDef::Plain(cr))?;
    add_native_class_method(&transcript, "tab", NativeDef::Plain(tab))?;
    vm.globals()
        .borrow_mut()
        .set(Rc::from("Transcript"), Val::Class(transcript));
    Ok(())
}

fn flush() {
    let _ = std::io::stdout().flush();
}

fn show(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    if let Some(value) = args.first() {
        print!("{}", value.display_string());
        flush();
    }
    Ok(receiver.clone())
}

fn show_line(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    if let Some(value) = args.first() {
        println!("{}", value.display_string());
    }
    Ok(receiver.clone())
}

fn print_val(receiver: &Val, args: &[Val]) -> RtResult<Val> {
    if let Some(value) = args.first() {
        print!("{}", value.print_string());
        flush();
    }
    Ok(receiver.clone())
}

fn cr(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    println!();
    Ok(receiver.clone())
}

fn tab(receiver: &Val, _args: &[Val]) -> RtResult<Val> {
    print!("\t");
    flush();
    Ok(receiver.clone())
}
