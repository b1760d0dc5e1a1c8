use hashbrown::HashMap;

use crate::{
    frontend::intern::InternedSymbol,
    middle::ir::{GlobalId, ValueId},
};

/// What a resolved name refers to: either a compile-time constant integer
/// or a handle to a storage location
#[derive(Debug, Clone, Copy)]
pub enum Binding {
    Constant(i32),
    Location(Location),
}

/// An opaque storage handle naming a global symbol or a stack slot
/// (locals and copied-in function parameters)
#[derive(Debug, Clone, Copy)]
pub enum Location {
    Global(GlobalId),
    Stack(ValueId),
}

/// A data structure to assist in traversing nested block scopes
///
/// The global scope holds bindings visible everywhere (global variables,
/// constants, and functions); shallow scopes are pushed and popped around
/// function bodies and nested blocks.
#[derive(Debug)]
pub struct ScopeStack<B> {
    global_scope: HashMap<InternedSymbol, B>,
    stack: Vec<HashMap<InternedSymbol, B>>,
}

impl<B> ScopeStack<B> {
    pub fn new() -> Self {
        Self {
            global_scope: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Creates a new block or function scope
    pub fn push_shallow_scope(&mut self) {
        self.stack.push(HashMap::new());
    }

    /// Destroys the current block or function scope
    pub fn pop_shallow_scope(&mut self) {
        assert!(
            !self.stack.is_empty(),
            "Attempted to pop a shallow scope from the global context"
        );

        self.stack.pop();
    }

    /// Looks for a binding only within the current (most nested) scope
    pub fn get_shallow_binding(&self, symbol: InternedSymbol) -> Option<&B> {
        let shallow_scope = self
            .stack
            .last()
            .unwrap_or(&self.global_scope);

        shallow_scope.get(&symbol)
    }

    /// Adds a binding only within the current (most nested) scope
    pub fn add_shallow_binding(&mut self, symbol: InternedSymbol, binding: B) {
        let shallow_scope = self
            .stack
            .last_mut()
            .unwrap_or(&mut self.global_scope);

        shallow_scope.insert(symbol, binding);
    }

    /// Gets a binding from the global scope
    pub fn get_global_binding(&self, symbol: InternedSymbol) -> Option<&B> {
        self.global_scope.get(&symbol)
    }

    /// Adds a binding into the global scope which is accessible from all
    /// shallow scopes
    pub fn add_global_binding(&mut self, symbol: InternedSymbol, binding: B) {
        self.global_scope.insert(symbol, binding);
    }

    /// Traverses the scope stack from the innermost scope outwards looking
    /// for a binding before checking the global scope
    pub fn get_binding(&self, symbol: InternedSymbol) -> Option<&B> {
        for scope in self.stack.iter().rev() {
            if let Some(binding) = scope.get(&symbol) {
                return Some(binding);
            }
        }

        self.global_scope.get(&symbol)
    }
}

impl<B> Default for ScopeStack<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str) -> InternedSymbol {
        InternedSymbol::new(name)
    }

    #[test]
    fn inner_scopes_shadow_outer_scopes() {
        let mut scopes = ScopeStack::new();
        scopes.add_global_binding(symbol("x"), 1);

        scopes.push_shallow_scope();
        scopes.add_shallow_binding(symbol("x"), 2);

        assert_eq!(scopes.get_binding(symbol("x")), Some(&2));

        scopes.pop_shallow_scope();
        assert_eq!(scopes.get_binding(symbol("x")), Some(&1));
    }

    #[test]
    fn sibling_scopes_may_reuse_names() {
        let mut scopes = ScopeStack::new();

        scopes.push_shallow_scope();
        scopes.add_shallow_binding(symbol("x"), 1);
        assert!(scopes.get_shallow_binding(symbol("x")).is_some());
        scopes.pop_shallow_scope();

        scopes.push_shallow_scope();
        // A sibling scope starts fresh, so the name is free again
        assert!(scopes.get_shallow_binding(symbol("x")).is_none());
        scopes.add_shallow_binding(symbol("x"), 2);
        assert_eq!(scopes.get_binding(symbol("x")), Some(&2));
        scopes.pop_shallow_scope();
    }

    #[test]
    fn redeclaration_in_the_same_scope_is_detected() {
        let mut scopes = ScopeStack::new();

        scopes.push_shallow_scope();
        scopes.add_shallow_binding(symbol("x"), 1);

        // The lowering pass reports a fatal diagnostic when this lookup
        // succeeds at declaration time
        assert!(scopes.get_shallow_binding(symbol("x")).is_some());
    }

    #[test]
    fn lookup_walks_out_to_the_global_scope() {
        let mut scopes = ScopeStack::new();
        scopes.add_global_binding(symbol("g"), 7);

        scopes.push_shallow_scope();
        scopes.push_shallow_scope();

        assert_eq!(scopes.get_binding(symbol("g")), Some(&7));
        assert_eq!(scopes.get_binding(symbol("missing")), None);
    }
}
