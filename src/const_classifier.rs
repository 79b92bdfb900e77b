//! Constant classifier (C5).
//!
//! `is_constant` decides whether a case-value dispatch map can be built
//! once and cached (`spec.md` §4.9.2), or in general whether an AST is a
//! pure constant expression with no observable side effects.

use crate::ast::{AstStore, NodeId, NodeKind};
use crate::symtab::{LiteralValue, SymbolAux, SymbolTable};

/// True iff `ast` is a single symbol-leaf referencing a pure literal
/// (`has_rvalue && !has_lvalue`). False for every other shape, including
/// internal nodes that happen to fold to a constant at runtime — this
/// classifier is purely syntactic, matching `spec.md` §4.5.
pub fn is_constant(ast: &AstStore, symtab: &SymbolTable, node: NodeId) -> bool {
    if ast.kind(node) != NodeKind::Symtab {
        return false;
    }
    match ast.get(node).symbol() {
        Some(sym) => symtab.get(sym).is_pure_literal(),
        None => false,
    }
}

/// True iff `node` is a symbol-leaf bound to a literal integer value —
/// the narrower check the arithmetic iterator (`spec.md` §4.9.1) uses to
/// decide whether an endpoint needs a runtime `intcheck`, as opposed to
/// `is_constant`'s generic "some literal" test.
pub fn is_literal_integer(ast: &AstStore, symtab: &SymbolTable, node: NodeId) -> bool {
    if ast.kind(node) != NodeKind::Symtab {
        return false;
    }
    match ast.get(node).symbol() {
        Some(sym) => matches!(symtab.get(sym).aux, SymbolAux::Literal(LiteralValue::Integer(_))),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FilePos;
    use crate::namtab::NameId;
    use crate::symtab::LiteralValue;

    #[test]
    fn literal_leaf_is_constant() {
        let mut ast = AstStore::new();
        let mut symtab = SymbolTable::new();
        let lit = symtab.enter_literal(LiteralValue::Integer("7".to_string()), FilePos::UNKNOWN);
        let node = ast.alloc_leaf(
            NodeKind::Symtab,
            crate::ast::LeafRef::Symbol(lit),
            FilePos::UNKNOWN,
        );
        assert!(is_constant(&ast, &symtab, node));
    }

    #[test]
    fn identifier_leaf_is_not_constant() {
        let mut ast = AstStore::new();
        let mut symtab = SymbolTable::new();
        let id = symtab.enter_symbol(
            crate::symtab::SymbolKind::Identifier,
            Some("x".to_string()),
            FilePos::UNKNOWN,
        );
        symtab.get_mut(id).has_lvalue = true;
        symtab.get_mut(id).has_rvalue = true;
        let node = ast.alloc_leaf(
            NodeKind::Symtab,
            crate::ast::LeafRef::Symbol(id),
            FilePos::UNKNOWN,
        );
        assert!(!is_constant(&ast, &symtab, node));
    }

    #[test]
    fn internal_node_is_never_constant_even_if_foldable() {
        let mut ast = AstStore::new();
        let symtab = SymbolTable::new();
        let a = ast.alloc_internal(NodeKind::Add, vec![], FilePos::UNKNOWN);
        assert!(!is_constant(&ast, &symtab, a));
        let _ = NameId(0);
    }
}
