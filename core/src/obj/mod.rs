mod class;
mod instance;
mod method;

pub use class::{
    add_parent, adopt_class_name, generate_accessors, inherits_from, install_class_method,
    install_method, rebuild_tables, Class, ClassRef,
};
pub use instance::{Instance, InstanceBody, InstanceRef, NativeHandle};
pub use method::{Method, MethodBody, NativeDef, NativeFn, NativeVmFn};

#[cfg(test)]
mod class_test;
