//! LHS (sinister) code generator and rewriter (C10).
//!
//! `gen_lhs` walks an assignment target and emits the read-modify-write
//! idiom appropriate to its shape (`spec.md` §4.9.3's table). A chain of
//! `of`/`ofa` applications (`a(i)(j)(k) := v`, nesting depth `L > 1`) is
//! collected from the outermost application down to its base expression
//! first, then processed in a single pass: each intermediate container
//! is read exactly once, innermost first, with the nested-LHS rewrite
//! enabled that read uses the kill-after-use opcode (`kof1`/`kofa`)
//! instead of a plain load, and the same already-computed value is
//! reused — never re-read — when writing it back into its own parent a
//! moment later. Every intermediate temporary's runtime value is queued
//! for release once the whole chain has been written back.

use crate::ast::{FilePos, NodeId, NodeKind};
use crate::codegen::error::CodeGenError;
use crate::codegen::state::CodeGen;
use crate::quads::{Opcode, Operand, Quad};
use crate::symtab::SymbolId;

impl CodeGen {
    /// Lowers `lhs := source`, where `source` already holds the value to
    /// store.
    pub fn gen_lhs(&mut self, lhs: NodeId, source: SymbolId, pos: FilePos) -> Result<(), CodeGenError> {
        let mut release = Vec::new();
        self.gen_lhs_rec(lhs, source, pos, &mut release)?;
        if self.config.optimize_nested_lhs && !release.is_empty() {
            for t in &release {
                self.emit_assign(*t, self.canon.sym_omega, pos)?;
            }
            self.log_optimizer("nested-lhs", pos, true);
        } else if !release.is_empty() {
            self.log_optimizer("nested-lhs", pos, false);
        }
        Ok(())
    }

    fn gen_lhs_rec(
        &mut self,
        lhs: NodeId,
        source: SymbolId,
        pos: FilePos,
        release: &mut Vec<SymbolId>,
    ) -> Result<(), CodeGenError> {
        match self.ast.kind(lhs) {
            NodeKind::Symtab => {
                let target = self.ast.get(lhs).symbol().ok_or_else(|| {
                    CodeGenError::Trap("symtab LHS leaf missing a symbol".to_string())
                })?;
                self.emit_assign(target, source, pos)
            }

            NodeKind::Placeholder => Ok(()),

            NodeKind::EnumTup => self.gen_lhs_tuple_pattern(lhs, source, pos, release),

            NodeKind::Of | NodeKind::Ofa => self.gen_lhs_index(lhs, source, pos, release),

            NodeKind::Slice => {
                let expr = self.ast.child(lhs, 0);
                let b = self.ast.child(lhs, 1);
                let e = self.ast.child(lhs, 2);
                let expr_val = self.gen_expr(expr, None)?;
                let b_val = self.gen_expr(b, None)?;
                let e_val = self.gen_expr(e, None)?;
                self.push_chunked(&[expr_val, b_val, source], pos)?;
                self.sink.emit(Quad::new(
                    Opcode::Sslice,
                    [Operand::Symbol(e_val), Operand::Unused, Operand::Unused],
                    pos,
                ))?;
                self.free_if_temp(expr_val);
                self.free_if_temp(b_val);
                self.free_if_temp(e_val);
                Ok(())
            }

            NodeKind::End => {
                let expr = self.ast.child(lhs, 0);
                let b = self.ast.child(lhs, 1);
                let expr_val = self.gen_expr(expr, None)?;
                let b_val = self.gen_expr(b, None)?;
                self.sink.emit(Quad::new(
                    Opcode::Send,
                    [Operand::Symbol(source), Operand::Symbol(b_val), Operand::Symbol(expr_val)],
                    pos,
                ))?;
                self.free_if_temp(expr_val);
                self.free_if_temp(b_val);
                Ok(())
            }

            NodeKind::Slot => {
                let obj = self.ast.child(lhs, 0);
                let obj_val = self.gen_expr(obj, None)?;
                let slot_name = self.ast.get(lhs).extension.ok_or_else(|| {
                    CodeGenError::Trap("slot LHS missing a slot-name symbol".to_string())
                })?;
                self.sink.emit(Quad::new(
                    Opcode::Sslot,
                    [Operand::Symbol(obj_val), Operand::Symbol(slot_name), Operand::Symbol(source)],
                    pos,
                ))?;
                self.free_if_temp(obj_val);
                Ok(())
            }

            other => Err(CodeGenError::Trap(format!(
                "{:?} is not a valid assignment target",
                other
            ))),
        }
    }

    /// `[x1, ..., xn] := source`: copy `source` to a temp `t`, project
    /// each position out with `tupof`, recurse into sub-patterns or skip
    /// placeholders, then erase `t`.
    fn gen_lhs_tuple_pattern(
        &mut self,
        lhs: NodeId,
        source: SymbolId,
        pos: FilePos,
        release: &mut Vec<SymbolId>,
    ) -> Result<(), CodeGenError> {
        let t = self.fresh_temp();
        self.emit_assign(t, source, pos)?;

        let positions = self.ast.children(lhs).to_vec();
        for (i, xi) in positions.iter().enumerate() {
            if self.ast.kind(*xi) == NodeKind::Placeholder {
                continue;
            }
            let ti = self.fresh_temp();
            self.emit_ssi(Opcode::Tupof, ti, t, (i + 1) as i64, pos)?;
            self.gen_lhs_rec(*xi, ti, pos, release)?;
            self.free_if_temp(ti);
        }

        self.emit_assign(t, self.canon.sym_omega, pos)?;
        self.free_temp(t);
        Ok(())
    }

    /// `expr(key) := source` / `expr{key} := source`, generalized to a
    /// full chain of index applications. Collects every level from `lhs`
    /// down to its base expression, reads each intermediate container
    /// once (innermost first, aliasing-copying the base first if it is
    /// textually the same identifier as `source`), writes `source` into
    /// the innermost one, then propagates each level's updated value
    /// back into its own parent's slot by reusing the very same read —
    /// never re-deriving it (`spec.md` §4.9.3 "nested-LHS rewrite").
    fn gen_lhs_index(
        &mut self,
        lhs: NodeId,
        source: SymbolId,
        pos: FilePos,
        release: &mut Vec<SymbolId>,
    ) -> Result<(), CodeGenError> {
        // levels[0] is the innermost application (its own `expr` child is
        // `base`); levels.last() == lhs.
        let mut levels = vec![(lhs, self.ast.child(lhs, 1))];
        let mut probe = self.ast.child(lhs, 0);
        while self.ast.kind(probe) == NodeKind::Of || self.ast.kind(probe) == NodeKind::Ofa {
            levels.push((probe, self.ast.child(probe, 1)));
            probe = self.ast.child(probe, 0);
        }
        levels.reverse();
        let base = probe;
        let depth = levels.len();
        let use_kill = self.config.optimize_nested_lhs && depth > 1;

        let aliasing =
            self.ast.kind(base) == NodeKind::Symtab && self.ast.get(base).symbol() == Some(source);
        let base_val = if aliasing {
            let copy = self.fresh_temp();
            let original = self.ast.get(base).symbol().unwrap();
            self.emit_assign(copy, original, pos)?;
            copy
        } else {
            self.gen_expr(base, None)?
        };

        // `containers[0] == base_val`; `containers[n]` (n > 0) is the
        // value read at `levels[n - 1]`, i.e. the container `levels[n]`
        // indexes into.
        let mut containers = Vec::with_capacity(depth);
        containers.push(base_val);
        let mut key_vals = Vec::with_capacity(depth);
        for (idx, &(node, key)) in levels.iter().enumerate() {
            let key_val = self.gen_expr(key, None)?;
            key_vals.push(key_val);
            if idx + 1 < depth {
                let parent = containers[idx];
                let value = self.fresh_temp();
                let opcode = if use_kill {
                    if self.ast.kind(node) == NodeKind::Ofa { Opcode::Kofa } else { Opcode::Kof1 }
                } else if self.ast.kind(node) == NodeKind::Ofa {
                    Opcode::Ofa
                } else {
                    Opcode::Of1
                };
                self.emit_sss(opcode, value, parent, key_val, pos)?;
                containers.push(value);
            }
        }

        let outer = depth - 1;
        let (outer_node, _) = levels[outer];
        let opcode = if self.ast.kind(outer_node) == NodeKind::Ofa { Opcode::Sofa } else { Opcode::Sof };
        self.sink.emit(Quad::new(
            opcode,
            [Operand::Symbol(containers[outer]), Operand::Symbol(key_vals[outer]), Operand::Symbol(source)],
            pos,
        ))?;
        self.free_if_temp(key_vals[outer]);

        // Propagate each level's updated container back into its own
        // parent's slot, outermost first, reusing `containers`/`key_vals`
        // rather than re-reading anything.
        let mut value_to_store = containers[outer];
        for idx in (0..outer).rev() {
            let (node, _) = levels[idx];
            let parent = containers[idx];
            let key_val = key_vals[idx];
            let opcode = if self.ast.kind(node) == NodeKind::Ofa { Opcode::Sofa } else { Opcode::Sof };
            self.sink.emit(Quad::new(
                opcode,
                [Operand::Symbol(parent), Operand::Symbol(key_val), Operand::Symbol(value_to_store)],
                pos,
            ))?;
            self.free_if_temp(key_val);
            if use_kill {
                release.push(value_to_store);
            }
            self.free_if_temp(value_to_store);
            value_to_store = parent;
        }

        if self.ast.kind(base) != NodeKind::Symtab {
            self.gen_lhs_rec(base, base_val, pos, release)?;
        }
        self.free_if_temp(base_val);

        if aliasing {
            let original = self.ast.get(base).symbol().unwrap();
            self.emit_assign(original, self.canon.sym_omega, pos)?;
        }
        Ok(())
    }
}
