//! Boolean expression code generator (C6).
//!
//! `gen_boolean` emits code whose postcondition is: control reaches
//! `true_label` if the expression is logically true, `false_label`
//! otherwise. The generator omits the terminal unconditional jump to
//! whichever label is the caller's fall-through, and picks between a
//! kind's "branch-if-true" and "branch-if-false" opcode so at most one
//! conditional branch is ever emitted per comparison (`spec.md` §4.6).

use crate::ast::{FilePos, NodeKind};
use crate::codegen::error::CodeGenError;
use crate::codegen::state::CodeGen;
use crate::codegen::tables;
use crate::quads::{LabelId, Opcode, Operand, Quad};

impl CodeGen {
    pub fn gen_boolean(
        &mut self,
        node: crate::ast::NodeId,
        true_label: LabelId,
        false_label: LabelId,
        fall_label: LabelId,
    ) -> Result<(), CodeGenError> {
        let pos = self.pos_of(node);
        let kind = self.ast.kind(node);

        match kind {
            NodeKind::Null => {
                // Null (missing) conditions are unconditionally true.
                if fall_label != true_label {
                    self.emit_go(true_label, pos)?;
                }
                Ok(())
            }

            NodeKind::Not => {
                let child = self.ast.child(node, 0);
                // `not` recurses with swapped labels.
                self.gen_boolean(child, false_label, true_label, fall_label)
            }

            NodeKind::And => {
                let left = self.ast.child(node, 0);
                let right = self.ast.child(node, 1);
                if fall_label == true_label {
                    // Short circuit: if left is false, skip straight to
                    // false_label; otherwise fall through to right.
                    let mid = self.fresh_label();
                    self.gen_boolean(left, mid, false_label, mid)?;
                    self.emit_label(mid, pos)?;
                    self.gen_boolean(right, true_label, false_label, fall_label)
                } else {
                    let mid = self.fresh_label();
                    self.gen_boolean(left, mid, false_label, mid)?;
                    self.emit_label(mid, pos)?;
                    self.gen_boolean(right, true_label, false_label, fall_label)
                }
            }

            NodeKind::Or => {
                let left = self.ast.child(node, 0);
                let right = self.ast.child(node, 1);
                let mid = self.fresh_label();
                self.gen_boolean(left, true_label, mid, mid)?;
                self.emit_label(mid, pos)?;
                self.gen_boolean(right, true_label, false_label, fall_label)
            }

            kind if tables::is_comparison_kind(kind) => {
                self.gen_comparison_branch(node, kind, true_label, false_label, fall_label, pos)
            }

            _ => {
                // Not a boolean-yielding kind: lower as a general
                // expression into a temporary and branch on its value.
                let value = self.gen_expr(node, None)?;
                if fall_label == true_label {
                    self.sink.emit(Quad::new(
                        Opcode::Gofalse,
                        [Operand::Label(false_label), Operand::Symbol(value), Operand::Unused],
                        pos,
                    ))?;
                } else {
                    self.sink.emit(Quad::new(
                        Opcode::Gotrue,
                        [Operand::Label(true_label), Operand::Symbol(value), Operand::Unused],
                        pos,
                    ))?;
                }
                self.free_if_temp(value);
                Ok(())
            }
        }
    }

    fn gen_comparison_branch(
        &mut self,
        node: crate::ast::NodeId,
        kind: NodeKind,
        true_label: LabelId,
        false_label: LabelId,
        fall_label: LabelId,
        pos: FilePos,
    ) -> Result<(), CodeGenError> {
        let mut lhs = self.ast.child(node, 0);
        let mut rhs = self.ast.child(node, 1);
        if tables::is_flipped(kind) {
            std::mem::swap(&mut lhs, &mut rhs);
        }

        let left = self.gen_expr(lhs, None)?;
        let right = self.gen_expr(rhs, None)?;

        // Tie-break: when the caller wants fall-through to be the true
        // side, emit the false-branch opcode (jumping away only on
        // failure); otherwise emit the true-branch opcode.
        let (opcode, target) = if fall_label == true_label {
            (
                tables::false_branch_opcode(kind).ok_or_else(|| {
                    CodeGenError::Trap(format!("no false-branch opcode for {:?}", kind))
                })?,
                false_label,
            )
        } else {
            (
                tables::true_branch_opcode(kind).ok_or_else(|| {
                    CodeGenError::Trap(format!("no true-branch opcode for {:?}", kind))
                })?,
                true_label,
            )
        };

        self.sink.emit(Quad::new(
            opcode,
            [Operand::Label(target), Operand::Symbol(left), Operand::Symbol(right)],
            pos,
        ))?;

        self.free_if_temp(left);
        self.free_if_temp(right);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FilePos, LeafRef, NodeKind};
    use crate::config::CodeGenConfig;

    fn leaf_var(cg: &mut CodeGen, name: &str) -> crate::ast::NodeId {
        let sym = cg.symtab.enter_symbol(
            crate::symtab::SymbolKind::Identifier,
            Some(name.to_string()),
            FilePos::UNKNOWN,
        );
        cg.symtab.get_mut(sym).has_lvalue = true;
        cg.symtab.get_mut(sym).has_rvalue = true;
        cg.ast
            .alloc_leaf(NodeKind::Symtab, LeafRef::Symbol(sym), FilePos::UNKNOWN)
    }

    #[test]
    fn null_condition_jumps_to_true_unless_it_is_fall_through() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let node = cg
            .ast
            .alloc_internal(NodeKind::Null, vec![], FilePos::UNKNOWN);
        let t = cg.fresh_label();
        let f = cg.fresh_label();

        cg.gen_boolean(node, t, f, t).unwrap();
        assert!(cg.sink.len() == 0, "no jump needed when true is fall-through");

        cg.gen_boolean(node, t, f, f).unwrap();
        assert_eq!(cg.sink.len(), 1);
    }

    #[test]
    fn short_circuit_and_never_evaluates_right_if_left_is_false_branch_shape() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let x = leaf_var(&mut cg, "x");
        let y = leaf_var(&mut cg, "y");
        let lt = cg
            .ast
            .alloc_internal(NodeKind::Lt, vec![x, y], FilePos::UNKNOWN);
        let and = cg
            .ast
            .alloc_internal(NodeKind::And, vec![lt, lt], FilePos::UNKNOWN);

        let t = cg.fresh_label();
        let f = cg.fresh_label();
        cg.gen_boolean(and, t, f, f).unwrap();
        // Two comparisons, each producing one conditional branch, plus one
        // label marking the short-circuit midpoint.
        assert!(cg.sink.len() >= 2);
    }

    #[test]
    fn gt_flips_operands_and_reuses_lt_opcode_family() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let a = leaf_var(&mut cg, "a");
        let b = leaf_var(&mut cg, "b");
        let gt = cg
            .ast
            .alloc_internal(NodeKind::Gt, vec![a, b], FilePos::UNKNOWN);
        let t = cg.fresh_label();
        let f = cg.fresh_label();
        cg.gen_boolean(gt, t, f, f).unwrap();

        let quads = cg.sink.as_list_mut().unwrap();
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].opcode, Opcode::Golt);
    }
}
