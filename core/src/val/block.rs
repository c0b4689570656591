use std::rc::Rc;

use crate::ast::BlockTemplate;
use crate::util::fast_map::FastHashMap;
use crate::val::MutCell;
use crate::vm::ActivationRef;

/// A first-class closure: the source template plus the environment it
/// closed over and the activation it was created in.
pub struct BlockValue {
    pub template: Rc<BlockTemplate>,
    /// Captured variables by name. Cells are aliased, never copied: sibling
    /// blocks created in the same scope share the same cells.
    pub captured: FastHashMap<Rc<str>, MutCell>,
    /// The activation that was current when the block literal was
    /// evaluated. `^` from inside the block targets the nearest method
    /// activation reachable through this chain. `None` for method bodies
    /// and top-level blocks.
    pub home: Option<ActivationRef>,
}

impl BlockValue {
    /// A bare closure with nothing captured, used for method bodies and
    /// blocks created at the top level.
    pub fn bare(template: Rc<BlockTemplate>) -> Self {
        Self {
            template,
            captured: FastHashMap::default(),
            home: None,
        }
    }

    pub fn num_args(&self) -> usize {
        self.template.parameters.len()
    }

    pub fn is_method(&self) -> bool {
        self.template.is_method
    }
}

// The captured environment and home activation can reach back into the
// activation graph, which may in turn hold this block; printing those would
// recurse forever.
impl std::fmt::Debug for BlockValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockValue")
            .field("params", &self.template.parameters)
            .field("is_method", &self.template.is_method)
            .field("captured", &self.captured.keys().collect::<Vec<_>>())
            .finish()
    }
}
