//! Quadruple code generation.
//!
//! This module lowers a type-annotated AST into a stream of three-
//! address quadruples for a later bytecode assembler/VM. Generation is
//! split into focused submodules, one per component `spec.md` names:
//!
//! - `state.rs`: the `CodeGen` context (C1-C4 pools, diagnostics) and
//!   the shared low-level emit helpers every other module builds on.
//! - `error.rs`: the three-category error taxonomy (§7).
//! - `tables.rs`: opcode-selection and comparison-flip tables (§4.10).
//! - `boolean.rs`: boolean-context lowering, C6.
//! - `expr.rs`: value-context lowering, C7.
//! - `stmt.rs`: statement-context lowering, C8.
//! - `iter.rs`: the shared iteration drive loop, C9.
//! - `lhs.rs`: assignment-target lowering and the nested-LHS rewrite, C10.
//! - `case_guard.rs`: `case`/`guard` dispatch lowering (§4.9.2).
//!
//! Entry points here (`gen_procedure`) tie the pieces together: reset
//! the per-procedure pools, lower a procedure body, and let the caller
//! decide what to do with the resulting sink.

mod boolean;
mod case_guard;
pub mod error;
mod expr;
mod iter;
mod lhs;
pub mod state;
mod stmt;
mod tables;

pub use error::CodeGenError;
pub use iter::IterKind;
pub use state::CodeGen;

use crate::ast::NodeId;

impl CodeGen {
    /// Lowers one procedure body from scratch: resets the temp/label/
    /// loop pools (`spec.md` §4.3's "reset between procedures"), then
    /// walks `body` as a statement list. The caller owns opening and
    /// closing the sink around calls to this, since a compilation unit
    /// may call it once per procedure while sharing one sink.
    pub fn gen_procedure(&mut self, body: NodeId) -> Result<(), CodeGenError> {
        self.reset_for_procedure();
        self.gen_stmt(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FilePos, LeafRef, NodeKind};
    use crate::config::CodeGenConfig;
    use crate::quads::Opcode;

    #[test]
    fn gen_procedure_resets_pools_and_lowers_the_body() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let x = cg.symtab.enter_symbol(
            crate::symtab::SymbolKind::Identifier,
            Some("x".to_string()),
            FilePos::UNKNOWN,
        );
        cg.symtab.get_mut(x).has_lvalue = true;
        cg.symtab.get_mut(x).has_rvalue = true;
        let x_leaf = cg.ast.alloc_leaf(NodeKind::Symtab, LeafRef::Symbol(x), FilePos::UNKNOWN);
        let one = cg
            .symtab
            .enter_literal(crate::symtab::LiteralValue::Integer("1".to_string()), FilePos::UNKNOWN);
        let one_leaf = cg.ast.alloc_leaf(NodeKind::Symtab, LeafRef::Symbol(one), FilePos::UNKNOWN);
        let assign = cg
            .ast
            .alloc_internal(NodeKind::Assign, vec![x_leaf, one_leaf], FilePos::UNKNOWN);
        let body = cg.ast.alloc_internal(NodeKind::List, vec![assign], FilePos::UNKNOWN);

        let before = cg.symtab.len();
        let _t = cg.fresh_temp();
        cg.gen_procedure(body).unwrap();

        // The leftover temp from before the call was reclaimed by the reset.
        assert_eq!(cg.symtab.len(), before + 1);
        assert_eq!(cg.sink.len(), 1);
        let quads = cg.sink.as_list_mut().unwrap();
        assert_eq!(quads[0].opcode, Opcode::Assign);
    }
}
