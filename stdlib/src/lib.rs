//! Smalt standard library
//!
//! Native modules layered on top of the core kernel, plus the in-language
//! prelude (`prelude.smalt`) that defines the iteration protocol. Natives
//! register first so the prelude's `<primitive: "...">` bodies resolve.

pub mod array;
pub mod io;
pub mod math;
pub mod string;

#[cfg(test)]
mod prelude_test;
#[cfg(test)]
mod string_test;

use smalt_core::{RtResult, Vm};

/// The prelude source, embedded so every host gets the same library.
pub const PRELUDE: &str = include_str!("prelude.smalt");

/// Install the full standard library into a VM: native modules, then the
/// prelude through the ordinary eval entry point.
pub fn install(vm: &mut Vm) -> RtResult<()> {
    io::register(vm)?;
    math::register(vm)?;
    string::register(vm)?;
    array::register(vm)?;
    vm.eval_statements(PRELUDE)?;
    tracing::debug!("standard library installed");
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_vm() -> Vm {
    let mut vm = Vm::new();
    install(&mut vm).expect("stdlib installs");
    vm
}
