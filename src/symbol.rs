// ABOUTME: Parse-time symbols and the lexically scoped symbol table

use std::rc::Rc;

use crate::ast::{Param, StmtId, Type};
use crate::scope::ScopedMap;

#[derive(Debug, Clone)]
pub enum Symbol {
    /// One of the five built-in type names, pre-inserted into every table.
    Type(Type),
    Variable {
        name: String,
        ty: Type,
    },
    /// `scope_level` is the level the process was *declared* at; the
    /// evaluator uses it to compute the callee's lexical enclosing frame
    /// via level arithmetic at call time. `body` is the arena id of the
    /// matching `Stmt::Process` node.
    Process {
        name: String,
        return_type: Type,
        params: Vec<Param>,
        scope_level: usize,
        body: StmtId,
    },
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Type(t) => t.name(),
            Symbol::Variable { name, .. } => name,
            Symbol::Process { name, .. } => name,
        }
    }
}

/// A lexical scope of symbols. Lookup walks the enclosing chain;
/// declaration is checked against the *whole* accessible chain (see the
/// shadowing-prohibition design decision), not just the current level.
///
/// `call_depth` is tracked separately from the underlying `ScopedMap`'s
/// block-nesting `level`: an `if`/`elif`/`else` arm or an `as`-loop body
/// opens a new lexical scope (for shadow-checking) but does *not* push a
/// new `ActivationRecord` at runtime, so it must not advance the number a
/// process's `scope_level` is computed from. Only a process's own
/// parameter/body scope (`proc_child`) corresponds to a genuine runtime
/// call frame, so only `proc_child` advances `call_depth`.
#[derive(Clone)]
pub struct SymbolTable {
    map: Rc<ScopedMap<Symbol>>,
    call_depth: usize,
}

impl SymbolTable {
    pub fn root() -> Self {
        let table = ScopedMap::new(1, None);
        Self::seed_builtins(&table);
        SymbolTable { map: table, call_depth: 1 }
    }

    /// A lexical child scope with no matching runtime call frame: used for
    /// `if`/`elif`/`else` arms and `as`-loop bodies.
    pub fn child(&self) -> Self {
        let table = ScopedMap::new(self.map.level() + 1, Some(Rc::clone(&self.map)));
        Self::seed_builtins(&table);
        SymbolTable { map: table, call_depth: self.call_depth }
    }

    /// A process's own parameter/body scope: this scope *does* get a
    /// matching `ActivationRecord` pushed at call time, so `call_depth`
    /// advances to match the level that record will carry.
    pub fn proc_child(&self) -> Self {
        let table = ScopedMap::new(self.map.level() + 1, Some(Rc::clone(&self.map)));
        Self::seed_builtins(&table);
        SymbolTable { map: table, call_depth: self.call_depth + 1 }
    }

    fn seed_builtins(table: &Rc<ScopedMap<Symbol>>) {
        for ty in [Type::Num, Type::Bool, Type::Str, Type::Nil, Type::Arr] {
            table.declare_local(ty.name(), Symbol::Type(ty));
        }
    }

    /// Lexical block-nesting depth (shadow-checking only; not used for the
    /// runtime frame-hop arithmetic — see `call_depth`).
    pub fn level(&self) -> usize {
        self.map.level()
    }

    /// Runtime call-nesting depth at this point in the parse: the level the
    /// activation record for a process declared here will carry once
    /// pushed.
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.map.lookup(name)
    }

    /// Declares `name` in the current scope. Returns `false` if `name` is
    /// already visible anywhere in the enclosing chain: this specification
    /// strictly prohibits shadowing across nested scopes (see the open
    /// question on scope discipline).
    pub fn declare(&self, name: &str, symbol: Symbol) -> bool {
        if self.map.contains_anywhere(name) {
            return false;
        }
        self.map.declare_local(name, symbol)
    }

    /// Overwrites an already-declared entry at this exact level, used once
    /// a process's parameter list is known (declared before its params are
    /// parsed, so recursive calls in its own body see the final arity).
    pub fn overwrite(&self, name: &str, symbol: Symbol) {
        self.map.put_local(name, symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_seeded_at_every_level() {
        let root = SymbolTable::root();
        assert!(matches!(root.lookup("num"), Some(Symbol::Type(Type::Num))));
        let child = root.child();
        assert!(matches!(child.lookup("arr"), Some(Symbol::Type(Type::Arr))));
    }

    #[test]
    fn test_declare_rejects_name_visible_in_enclosing_scope() {
        let root = SymbolTable::root();
        assert!(root.declare("x", Symbol::Variable { name: "x".into(), ty: Type::Num }));
        let child = root.child();
        assert!(!child.declare("x", Symbol::Variable { name: "x".into(), ty: Type::Bool }));
    }

    #[test]
    fn test_lookup_walks_enclosing_chain() {
        let root = SymbolTable::root();
        root.declare("x", Symbol::Variable { name: "x".into(), ty: Type::Num });
        let child = root.child();
        assert!(child.lookup("x").is_some());
    }

    #[test]
    fn test_process_declared_in_enclosing_scope_supports_recursion() {
        // Mirrors parser.rs's process(): declare in the enclosing table
        // first (so `f` resolves inside its own body), then enter its
        // param scope.
        let root = SymbolTable::root();
        let body = StmtId(0);
        let declared_level = root.call_depth() + 1;
        let declared = root.declare(
            "f",
            Symbol::Process {
                name: "f".into(),
                return_type: Type::Num,
                params: vec![],
                scope_level: declared_level,
                body,
            },
        );
        assert!(declared);

        let proc_scope = root.proc_child();
        assert!(proc_scope.lookup("f").is_some());
        assert_eq!(proc_scope.call_depth(), declared_level);
    }

    #[test]
    fn test_lexical_child_does_not_advance_call_depth() {
        let root = SymbolTable::root();
        let if_arm = root.child();
        assert_eq!(if_arm.call_depth(), root.call_depth());
        assert_eq!(if_arm.level(), root.level() + 1);
    }

    #[test]
    fn test_proc_child_advances_call_depth() {
        let root = SymbolTable::root();
        let proc_scope = root.proc_child();
        assert_eq!(proc_scope.call_depth(), root.call_depth() + 1);
    }

    #[test]
    fn test_nested_block_inside_process_does_not_inflate_call_depth() {
        // proc outer() { if (true) { proc inner() { ... } } }
        let root = SymbolTable::root();
        let outer_scope = root.proc_child();
        let if_arm = outer_scope.child();
        let inner_declared_level = if_arm.call_depth() + 1;
        assert_eq!(inner_declared_level, outer_scope.call_depth() + 1);
    }
}
