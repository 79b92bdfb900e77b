//! Statement code generator (C8).
//!
//! `gen_stmt` walks a statement-position AST node, discarding any value
//! the underlying expression machinery produces unless the statement
//! form itself needs it (an assignment's right-hand side, an `exit`
//! expression's value). Control-flow statement forms reuse the same
//! loop-frame and boolean-branch machinery as their expression-position
//! counterparts in `codegen::expr`, just without a `value_target`.

use crate::ast::{FilePos, NodeId, NodeKind};
use crate::codegen::error::CodeGenError;
use crate::codegen::state::CodeGen;
use crate::codegen::tables;
use crate::quads::{Opcode, Operand, Quad};
use crate::symtab::SymbolKind;

impl CodeGen {
    pub fn gen_stmt(&mut self, node: NodeId) -> Result<(), CodeGenError> {
        let pos = self.pos_of(node);
        match self.ast.kind(node) {
            NodeKind::List => {
                for child in self.ast.children(node).to_vec() {
                    self.gen_stmt(child)?;
                }
                Ok(())
            }

            NodeKind::Assign => self.gen_stmt_assign(node, pos),
            // Same lowering as a plain assignment; the parser marks a
            // call-valued right-hand side distinctly for an upstream
            // pass this generator does not otherwise need to see.
            NodeKind::Cassign => self.gen_stmt_assign(node, pos),
            NodeKind::Assignop => self.gen_stmt_assignop(node, pos),

            NodeKind::IfStmt => self.gen_stmt_if(node, pos),
            NodeKind::While | NodeKind::Until | NodeKind::Loop | NodeKind::For => {
                self.gen_stmt_loop(node, pos)
            }

            NodeKind::CaseStmt => self.gen_case_stmt(node, pos),
            NodeKind::GuardStmt => self.gen_guard_stmt(node, pos),

            NodeKind::Call | NodeKind::Slotof | NodeKind::Slotcall => {
                let v = self.gen_expr(node, None)?;
                self.free_if_temp(v);
                Ok(())
            }

            NodeKind::Return => {
                let children = self.ast.children(node);
                if children.is_empty() || self.ast.kind(children[0]) == NodeKind::Null {
                    self.sink.emit(Quad::new(Opcode::Return, [Operand::Unused, Operand::Unused, Operand::Unused], pos))
                } else {
                    let v = self.gen_expr(children[0], None)?;
                    self.sink.emit(Quad::new(Opcode::Return, [Operand::Symbol(v), Operand::Unused, Operand::Unused], pos))?;
                    self.free_if_temp(v);
                    Ok(())
                }
            }

            NodeKind::Stop => self.sink.emit(Quad::new(Opcode::Stop, [Operand::Unused, Operand::Unused, Operand::Unused], pos)),

            NodeKind::Exit => {
                let frame = *self.loops.top().ok_or_else(|| {
                    CodeGenError::Trap("exit statement outside any loop".to_string())
                })?;
                let children = self.ast.children(node);
                if !children.is_empty() && self.ast.kind(children[0]) != NodeKind::Null {
                    let v = self.gen_expr(children[0], None)?;
                    if let Some(target) = frame.value_target {
                        self.emit_assign(target, v, pos)?;
                    }
                    self.free_if_temp(v);
                }
                self.emit_go(frame.exit_label, pos)
            }

            NodeKind::Continue => {
                let frame = *self.loops.top().ok_or_else(|| {
                    CodeGenError::Trap("continue statement outside any loop".to_string())
                })?;
                self.emit_go(frame.continue_label, pos)
            }

            NodeKind::Assert => {
                let cond = self.ast.child(node, 0);
                let v = self.gen_expr(cond, None)?;
                self.sink.emit(Quad::new(Opcode::Assert, [Operand::Symbol(v), Operand::Unused, Operand::Unused], pos))?;
                self.free_if_temp(v);
                Ok(())
            }

            NodeKind::Symtab => self.gen_stmt_bare_symbol(node, pos),

            // Anything else in statement position is an expression
            // evaluated for effect; its value is discarded.
            _ => {
                let v = self.gen_expr(node, None)?;
                self.free_if_temp(v);
                Ok(())
            }
        }
    }

    fn gen_stmt_assign(&mut self, node: NodeId, pos: FilePos) -> Result<(), CodeGenError> {
        let lhs = self.ast.child(node, 0);
        let rhs = self.ast.child(node, 1);
        let rhs_val = self.gen_expr(rhs, None)?;
        if self.ast.kind(lhs) == NodeKind::Symtab {
            let target = self.ast.get(lhs).symbol().ok_or_else(|| {
                CodeGenError::Trap("symtab LHS leaf missing a symbol".to_string())
            })?;
            self.emit_assign(target, rhs_val, pos)?;
        } else {
            self.gen_lhs(lhs, rhs_val, pos)?;
        }
        self.free_if_temp(rhs_val);
        Ok(())
    }

    /// `lhs op:= rhs`: reads the current value, combines it with `rhs`,
    /// writes the result back. When the nested-assign optimization is
    /// enabled and `lhs` is a single index application, the index
    /// expression and key are each evaluated exactly once and reused
    /// for both the read and the write-back (`spec.md` §4.9.3); disabled
    /// (or for any other LHS shape) falls back to evaluating `lhs` for
    /// its value and separately routing the result through `gen_lhs`,
    /// which re-evaluates it.
    fn gen_stmt_assignop(&mut self, node: NodeId, pos: FilePos) -> Result<(), CodeGenError> {
        let lhs = self.ast.child(node, 0);
        let op_tag = self.ast.child(node, 1);
        let rhs = self.ast.child(node, 2);
        let op = tables::default_opcode(self.ast.kind(op_tag)).ok_or_else(|| {
            CodeGenError::Trap("augmented-assignment operator tag has no default opcode".to_string())
        })?;

        let use_combined = self.config.optimize_augmented_assign
            && matches!(self.ast.kind(lhs), NodeKind::Of | NodeKind::Ofa);
        self.log_optimizer("augmented-assign", pos, use_combined);

        if use_combined {
            let expr = self.ast.child(lhs, 0);
            let key = self.ast.child(lhs, 1);
            let expr_val = self.gen_expr(expr, None)?;
            let key_val = self.gen_expr(key, None)?;
            let read_opcode = if self.ast.kind(lhs) == NodeKind::Ofa { Opcode::Ofa } else { Opcode::Of1 };
            let old = self.fresh_temp();
            self.emit_sss(read_opcode, old, expr_val, key_val, pos)?;
            let rhs_val = self.gen_expr(rhs, None)?;
            let result = self.fresh_temp();
            self.emit_sss(op, result, old, rhs_val, pos)?;
            self.free_temp(old);
            self.free_if_temp(rhs_val);
            let write_opcode = if self.ast.kind(lhs) == NodeKind::Ofa { Opcode::Sofa } else { Opcode::Sof };
            self.sink.emit(Quad::new(
                write_opcode,
                [Operand::Symbol(expr_val), Operand::Symbol(key_val), Operand::Symbol(result)],
                pos,
            ))?;
            self.free_if_temp(expr_val);
            self.free_if_temp(key_val);
            self.free_temp(result);
            Ok(())
        } else {
            let old = self.gen_expr(lhs, None)?;
            let rhs_val = self.gen_expr(rhs, None)?;
            let result = self.fresh_temp();
            self.emit_sss(op, result, old, rhs_val, pos)?;
            self.free_if_temp(old);
            self.free_if_temp(rhs_val);
            self.gen_lhs(lhs, result, pos)?;
            self.free_temp(result);
            Ok(())
        }
    }

    fn gen_stmt_if(&mut self, node: NodeId, pos: FilePos) -> Result<(), CodeGenError> {
        let cond = self.ast.child(node, 0);
        let then_branch = self.ast.child(node, 1);
        let else_branch = self.ast.child(node, 2);

        let t = self.fresh_label();
        let f = self.fresh_label();
        self.gen_boolean(cond, t, f, t)?;
        self.emit_label(t, pos)?;
        self.gen_stmt(then_branch)?;
        if self.ast.kind(else_branch) == NodeKind::Null {
            self.emit_label(f, pos)?;
        } else {
            let done = self.fresh_label();
            self.emit_go(done, pos)?;
            self.emit_label(f, pos)?;
            self.gen_stmt(else_branch)?;
            self.emit_label(done, pos)?;
        }
        Ok(())
    }

    fn gen_stmt_loop(&mut self, node: NodeId, pos: FilePos) -> Result<(), CodeGenError> {
        let kind = self.ast.kind(node);
        let top = self.fresh_label();
        let exit_label = self.fresh_label();
        let continue_label = self.fresh_label();
        self.loops.push(exit_label, continue_label, None);
        self.emit_label(top, pos)?;

        match kind {
            NodeKind::While => {
                let cond = self.ast.child(node, 0);
                let body = self.ast.child(node, 1);
                self.gen_boolean(cond, continue_label, exit_label, continue_label)?;
                self.emit_label(continue_label, pos)?;
                self.gen_stmt(body)?;
                self.emit_go(top, pos)?;
            }
            NodeKind::Until => {
                let cond = self.ast.child(node, 0);
                let body = self.ast.child(node, 1);
                self.gen_boolean(cond, exit_label, continue_label, continue_label)?;
                self.emit_label(continue_label, pos)?;
                self.gen_stmt(body)?;
                self.emit_go(top, pos)?;
            }
            NodeKind::Loop => {
                let body = self.ast.child(node, 0);
                self.gen_stmt(body)?;
                self.emit_label(continue_label, pos)?;
                self.emit_go(top, pos)?;
            }
            NodeKind::For => {
                let iter_list = self.ast.child(node, 0);
                let body = self.ast.child(node, 1);
                self.gen_iter_varvals(iter_list, None, pos, |cg| cg.gen_stmt(body))?;
                self.emit_label(continue_label, pos)?;
                self.emit_go(top, pos)?;
            }
            _ => unreachable!(),
        }
        self.emit_label(exit_label, pos)?;
        self.loops.pop();
        Ok(())
    }

    /// A bare identifier used directly as a statement: a niladic
    /// procedure or method call by name, with its result discarded.
    /// Anything else reaching here (reading a plain variable for no
    /// effect) is reported as a non-fatal diagnostic but still lowered,
    /// per `spec.md` §7's category-2 handling.
    fn gen_stmt_bare_symbol(&mut self, node: NodeId, pos: FilePos) -> Result<(), CodeGenError> {
        let sym = self.ast.get(node).symbol().ok_or_else(|| {
            CodeGenError::Trap("symtab statement leaf missing a symbol".to_string())
        })?;
        let callable = matches!(self.symtab.get(sym).kind, SymbolKind::Procedure | SymbolKind::Method);
        if callable {
            self.sink.emit(Quad::new(
                Opcode::Lcall,
                [Operand::Symbol(sym), Operand::Unused, Operand::Unused],
                pos,
            ))?;
            let zero = self.materialize_count(0, pos);
            let result = self.fresh_temp();
            self.emit_sss(Opcode::Call, result, zero, zero, pos)?;
            self.free_temp(result);
            Ok(())
        } else {
            self.report(pos, "statement's value is discarded");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LeafRef;
    use crate::config::CodeGenConfig;

    #[test]
    fn bare_nullary_procedure_statement_emits_lcall_then_call() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let proc_sym = cg.symtab.enter_symbol(
            SymbolKind::Procedure,
            Some("greet".to_string()),
            FilePos::UNKNOWN,
        );
        let leaf = cg.ast.alloc_leaf(NodeKind::Symtab, LeafRef::Symbol(proc_sym), FilePos::UNKNOWN);

        cg.gen_stmt(leaf).unwrap();

        let quads = cg.sink.as_list_mut().unwrap();
        let lcall_idx = quads.iter().position(|q| q.opcode == Opcode::Lcall).expect("missing lcall");
        let call_idx = quads.iter().position(|q| q.opcode == Opcode::Call).expect("missing call");
        assert!(lcall_idx < call_idx, "lcall must precede call: {:?}", quads);
        assert_eq!(quads[lcall_idx].operands[0], Operand::Symbol(proc_sym));
    }

    #[test]
    fn bare_non_callable_symbol_statement_reports_a_diagnostic() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let sym = cg.symtab.enter_symbol(
            SymbolKind::Identifier,
            Some("x".to_string()),
            FilePos::UNKNOWN,
        );
        cg.symtab.get_mut(sym).has_lvalue = true;
        cg.symtab.get_mut(sym).has_rvalue = true;
        let leaf = cg.ast.alloc_leaf(NodeKind::Symtab, LeafRef::Symbol(sym), FilePos::UNKNOWN);

        cg.gen_stmt(leaf).unwrap();

        assert_eq!(cg.sink.len(), 0);
        assert_eq!(cg.diagnostics.len(), 1);
    }
}
