//! Iterator code generator (C9).
//!
//! The original threads a distinct compiler-side record per iteration
//! flavour (set, map, tuple, string, domain, power set, ...) through a
//! shared drive loop. The flavour only changes what the *runtime*
//! iterator does with the source value; the drive loop the generator
//! emits — `iter`, a top label, `inext` with an embedded fail target,
//! the body, a jump back, the fail label — is identical across all of
//! them. So here the flavour is carried as a tag on the `iter` quad
//! instead of as a different code shape, and `gen_iter_values` /
//! `gen_iter_varvals` stay single functions instead of eighteen.

use crate::ast::{FilePos, NodeId, NodeKind};
use crate::codegen::error::CodeGenError;
use crate::codegen::state::CodeGen;
use crate::quads::Opcode;
use crate::quads::Operand;
use crate::quads::Quad;
use crate::symtab::SymbolId;

/// The iteration-type tag `spec.md` §4.9.1 lists, carried as an
/// immediate operand on the `iter` quad so the runtime knows how to
/// step the underlying value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterKind {
    Set,
    Map,
    Tuple,
    String,
    Object,
    Domain,
    Pow,
    Npow,
    MapPair,
    TuplePair,
    AltTuplePair,
    StringPair,
    ObjectPair,
    MapMulti,
    ObjectMulti,
    Single,
    Pair,
    Multi,
    Arith,
}

impl IterKind {
    pub(crate) fn tag(self) -> i64 {
        self as i64
    }
}

impl CodeGen {
    /// Drives a single-value iteration over `source`, invoking `on_value`
    /// once per element with the symbol holding that element. Used by set
    /// and tuple formers and by `apply`/`binapply` (`spec.md` §4.9.1's
    /// `gen_iter_values`).
    pub fn gen_iter_values(
        &mut self,
        source: NodeId,
        kind: IterKind,
        pos: FilePos,
        mut on_value: impl FnMut(&mut CodeGen, SymbolId) -> Result<(), CodeGenError>,
    ) -> Result<(), CodeGenError> {
        let source_val = self.gen_expr(source, None)?;
        let iter_sym = self.fresh_temp();
        let top = self.fresh_label();
        let fail = self.fresh_label();

        self.sink.emit(Quad::new(
            Opcode::Iter,
            [Operand::Symbol(iter_sym), Operand::Symbol(source_val), Operand::Immediate(kind.tag())],
            pos,
        ))?;
        self.free_if_temp(source_val);

        self.emit_label(top, pos)?;
        let value = self.fresh_temp();
        self.sink.emit(Quad::new(
            Opcode::Inext,
            [Operand::Symbol(value), Operand::Symbol(iter_sym), Operand::Label(fail)],
            pos,
        ))?;

        on_value(self, value)?;
        self.free_temp(value);
        self.emit_go(top, pos)?;
        self.emit_label(fail, pos)?;
        self.free_temp(iter_sym);
        Ok(())
    }

    /// Drives a bound-variable iteration for `for`/`exists`/`forall`, one
    /// clause at a time, with an optional guard condition
    /// (`gen_iter_varvals`). Supports the common single-clause `x in S`
    /// shape; clause lists with more than one binding chain through
    /// nested `gen_iter_values` calls, one per clause, matching how the
    /// original threads a linked list of iterator records.
    pub fn gen_iter_varvals(
        &mut self,
        iter_list: NodeId,
        cond: Option<NodeId>,
        pos: FilePos,
        mut on_each: impl FnMut(&mut CodeGen) -> Result<(), CodeGenError>,
    ) -> Result<(), CodeGenError> {
        let clauses = self.ast.children(iter_list).to_vec();
        self.gen_iter_varvals_rec(&clauses, cond, pos, &mut on_each)
    }

    fn gen_iter_varvals_rec(
        &mut self,
        clauses: &[NodeId],
        cond: Option<NodeId>,
        pos: FilePos,
        on_each: &mut dyn FnMut(&mut CodeGen) -> Result<(), CodeGenError>,
    ) -> Result<(), CodeGenError> {
        match clauses.split_first() {
            None => {
                match cond {
                    Some(c) => {
                        let t = self.fresh_label();
                        let f = self.fresh_label();
                        self.gen_boolean(c, t, f, t)?;
                        self.emit_label(t, pos)?;
                        on_each(self)?;
                        self.emit_label(f, pos)?;
                        Ok(())
                    }
                    None => on_each(self),
                }
            }
            Some((clause, rest)) => {
                let bound = self.ast.child(*clause, 0);
                let source = self.ast.child(*clause, 1);
                self.gen_iter_values(source, IterKind::Set, pos, |cg, value| {
                    cg.bind_iteration_target(bound, value, pos)?;
                    cg.gen_iter_varvals_rec(rest, cond, pos, on_each)
                })
            }
        }
    }

    /// Writes the current iteration value into a bound-variable pattern.
    /// A bare identifier is assigned directly; anything else (a tuple
    /// pattern like `[a, b]`) is routed through the LHS writer
    /// (`spec.md` §4.9.1 "bound-variable unpacking").
    fn bind_iteration_target(
        &mut self,
        bound: NodeId,
        value: SymbolId,
        pos: FilePos,
    ) -> Result<(), CodeGenError> {
        if self.ast.kind(bound) == NodeKind::Symtab {
            let target = self.ast.get(bound).symbol().ok_or_else(|| {
                CodeGenError::Trap("bound variable leaf missing a symbol".to_string())
            })?;
            self.emit_assign(target, value, pos)
        } else {
            self.gen_lhs(bound, value, pos)
        }
    }

    /// Arithmetic iterator (`first, second .. last`), per `spec.md`
    /// §4.9.1 and end-to-end scenario S5: decrement the start by the
    /// inferred increment, then at the loop top add the increment and
    /// compare against `last`. An explicit `second` means the increment's
    /// sign isn't known at compile time (it could be descending, e.g.
    /// `[9, 7 .. 1]`), so the bound check branches on that sign rather
    /// than emitting a single direction-agnostic compare; any endpoint
    /// that isn't itself a literal integer additionally gets a runtime
    /// `intcheck` before the loop (`spec.md` §7 category 4).
    pub fn gen_arith_iter(
        &mut self,
        bound: SymbolId,
        first: NodeId,
        second: Option<NodeId>,
        last: NodeId,
        pos: FilePos,
        mut on_each: impl FnMut(&mut CodeGen) -> Result<(), CodeGenError>,
    ) -> Result<(), CodeGenError> {
        let mut intcheck_operands: Vec<SymbolId> = Vec::new();

        let first_val = self.gen_expr(first, None)?;
        if !self.is_literal_integer(first) {
            intcheck_operands.push(first_val);
        }

        let increment = match second {
            Some(s) => {
                let second_val = self.gen_expr(s, None)?;
                if !self.is_literal_integer(s) {
                    intcheck_operands.push(second_val);
                }
                let inc = self.fresh_temp();
                self.emit_sss(Opcode::Sub, inc, second_val, first_val, pos)?;
                self.free_if_temp(second_val);
                inc
            }
            None => self.canon.sym_one,
        };

        let last_val = self.gen_expr(last, None)?;
        if !self.is_literal_integer(last) {
            intcheck_operands.push(last_val);
        }

        if !intcheck_operands.is_empty() {
            let mut operands = [Operand::Unused, Operand::Unused, Operand::Unused];
            for (slot, sym) in operands.iter_mut().zip(intcheck_operands.iter()) {
                *slot = Operand::Symbol(*sym);
            }
            self.sink.emit(Quad::new(Opcode::Intcheck, operands, pos))?;
        }

        self.emit_sss(Opcode::Sub, bound, first_val, increment, pos)?;
        self.free_if_temp(first_val);

        let top = self.fresh_label();
        let fail = self.fresh_label();
        self.emit_label(top, pos)?;
        self.emit_sss(Opcode::Add, bound, bound, increment, pos)?;

        if second.is_none() {
            self.sink.emit(Quad::new(
                Opcode::Golt,
                [Operand::Label(fail), Operand::Symbol(last_val), Operand::Symbol(bound)],
                pos,
            ))?;
        } else {
            // Increment's sign is unknown at compile time: branch on it
            // and check ascending (`last < bound` fails) or descending
            // (`bound < last` fails, with a zero increment failing
            // outright since it makes no progress).
            let flip = self.fresh_label();
            let found = self.fresh_label();
            self.sink.emit(Quad::new(
                Opcode::Gole,
                [Operand::Label(flip), Operand::Symbol(increment), Operand::Symbol(self.canon.sym_zero)],
                pos,
            ))?;
            self.sink.emit(Quad::new(
                Opcode::Golt,
                [Operand::Label(fail), Operand::Symbol(last_val), Operand::Symbol(bound)],
                pos,
            ))?;
            self.emit_go(found, pos)?;
            self.emit_label(flip, pos)?;
            self.sink.emit(Quad::new(
                Opcode::Goeq,
                [Operand::Label(fail), Operand::Symbol(increment), Operand::Symbol(self.canon.sym_zero)],
                pos,
            ))?;
            self.sink.emit(Quad::new(
                Opcode::Golt,
                [Operand::Label(fail), Operand::Symbol(bound), Operand::Symbol(last_val)],
                pos,
            ))?;
            self.emit_label(found, pos)?;
        }

        on_each(self)?;
        self.emit_go(top, pos)?;
        self.emit_label(fail, pos)?;

        if second.is_some() {
            self.free_if_temp(increment);
        }
        self.free_if_temp(last_val);
        Ok(())
    }

    fn is_literal_integer(&self, node: NodeId) -> bool {
        crate::const_classifier::is_literal_integer(&self.ast, &self.symtab, node)
    }
}
