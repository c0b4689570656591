pub(super) use crate::val::Val;
pub(super) use crate::vm::Vm;

mod closures;
mod control_flow;
mod errors;
mod semantics;
mod stack;

/// Collection/iteration methods normally supplied by the stdlib prelude;
/// the subset the core tests rely on, defined through the public
/// `selector:put:` path like any user code.
pub(super) const TEST_PRELUDE: &str = r#"
Number >> timesRepeat: aBlock [
    | i |
    i := 0.
    [i < self] whileTrue: [aBlock value. i := i + 1].
    ^ self
]

Number >> to: stop do: aBlock [
    | i |
    i := self.
    [i <= stop] whileTrue: [aBlock value: i. i := i + 1].
    ^ self
]

Array >> do: aBlock [
    | i |
    i := 1.
    [i <= self size] whileTrue: [aBlock value: (self at: i). i := i + 1].
    ^ self
]

Array >> detect: aBlock ifNone: noneBlock [
    self do: [:each | (aBlock value: each) ifTrue: [^ each]].
    ^ noneBlock value
]
"#;

pub(super) fn vm() -> Vm {
    Vm::new()
}

pub(super) fn vm_with_prelude() -> Vm {
    let mut vm = Vm::new();
    vm.eval_statements(TEST_PRELUDE).expect("test prelude loads");
    vm
}

pub(super) fn eval(vm: &mut Vm, source: &str) -> Val {
    vm.doit(source).expect("evaluation succeeds")
}
