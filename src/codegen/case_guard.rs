//! `case`/`guard` code generator.
//!
//! Both forms dispatch across a list of `when` clauses with a shared
//! fallback body. `case` compares a single control value against each
//! clause's value; `guard` evaluates each clause's own boolean
//! condition in order. `spec.md` §4.9.2 calls for caching the dispatch
//! structure across repeated executions of the same statement when the
//! clause values are compile-time constants, so both forms build their
//! dispatch structure once behind a `gone <cache>, omega` bypass guard
//! and reuse it on every subsequent visit.

use crate::ast::{FilePos, NodeId, NodeKind};
use crate::codegen::error::CodeGenError;
use crate::codegen::iter::IterKind;
use crate::codegen::state::CodeGen;
use crate::quads::{LabelId, Opcode, Operand, Quad};
use crate::symtab::{SymbolId, SymbolKind};

struct WhenClause {
    key: NodeId,
    body: NodeId,
    label: LabelId,
    label_sym: SymbolId,
}

impl CodeGen {
    pub fn gen_case_expr(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        self.emit_assign(result, self.canon.sym_omega, pos)?;
        let (control, whens, otherwise) = self.case_parts(node);
        self.gen_case(control, &whens, otherwise, pos, |cg, body| {
            cg.gen_expr(body, Some(result)).map(|_| ())
        })?;
        Ok(result)
    }

    pub fn gen_case_stmt(&mut self, node: NodeId, pos: FilePos) -> Result<(), CodeGenError> {
        let (control, whens, otherwise) = self.case_parts(node);
        self.gen_case(control, &whens, otherwise, pos, |cg, body| cg.gen_stmt(body))
    }

    pub fn gen_guard_expr(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        self.emit_assign(result, self.canon.sym_omega, pos)?;
        let (whens, otherwise) = self.guard_parts(node);
        self.gen_guard(&whens, otherwise, pos, |cg, body| {
            cg.gen_expr(body, Some(result)).map(|_| ())
        })?;
        Ok(result)
    }

    pub fn gen_guard_stmt(&mut self, node: NodeId, pos: FilePos) -> Result<(), CodeGenError> {
        let (whens, otherwise) = self.guard_parts(node);
        self.gen_guard(&whens, otherwise, pos, |cg, body| cg.gen_stmt(body))
    }

    fn case_parts(&self, node: NodeId) -> (NodeId, Vec<(NodeId, NodeId)>, Option<NodeId>) {
        let control = self.ast.child(node, 0);
        let whens_list = self.ast.child(node, 1);
        let whens = self
            .ast
            .children(whens_list)
            .iter()
            .map(|w| (self.ast.child(*w, 0), self.ast.child(*w, 1)))
            .collect();
        let otherwise = self.opt_body(self.ast.child(node, 2));
        (control, whens, otherwise)
    }

    fn guard_parts(&self, node: NodeId) -> (Vec<(NodeId, NodeId)>, Option<NodeId>) {
        let whens_list = self.ast.child(node, 0);
        let whens = self
            .ast
            .children(whens_list)
            .iter()
            .map(|w| (self.ast.child(*w, 0), self.ast.child(*w, 1)))
            .collect();
        let otherwise = self.opt_body(self.ast.child(node, 1));
        (whens, otherwise)
    }

    fn opt_body(&self, node: NodeId) -> Option<NodeId> {
        match self.ast.kind(node) {
            NodeKind::Null => None,
            _ => Some(node),
        }
    }

    /// `case ctrl of when v1: b1 when v2: b2 ... otherwise: bo end`. When
    /// every clause value is a syntactic constant, builds a value→label
    /// map once and dispatches with a single lookup; otherwise falls
    /// back to a sequential chain of equality tests.
    fn gen_case(
        &mut self,
        control: NodeId,
        whens: &[(NodeId, NodeId)],
        otherwise: Option<NodeId>,
        pos: FilePos,
        mut emit_body: impl FnMut(&mut CodeGen, NodeId) -> Result<(), CodeGenError>,
    ) -> Result<(), CodeGenError> {
        let control_val = self.gen_expr(control, None)?;
        let clauses = self.alloc_clauses(whens, pos);
        let done = self.fresh_label();
        let otherwise_label = self.fresh_label();

        let all_constant = clauses.iter().all(|c| self.is_constant(c.key));
        if all_constant && !clauses.is_empty() {
            self.gen_case_dispatch_map(&clauses, control_val, otherwise_label, pos)?;
            self.log_optimizer("case-dispatch-map", pos, true);
        } else {
            self.log_optimizer("case-dispatch-map", pos, false);
            for clause in &clauses {
                let value_val = self.gen_expr(clause.key, None)?;
                self.sink.emit(Quad::new(
                    Opcode::Goeq,
                    [Operand::Label(clause.label), Operand::Symbol(control_val), Operand::Symbol(value_val)],
                    pos,
                ))?;
                self.free_if_temp(value_val);
            }
            self.emit_go(otherwise_label, pos)?;
        }
        self.free_if_temp(control_val);

        for clause in &clauses {
            self.emit_label(clause.label, pos)?;
            emit_body(self, clause.body)?;
            self.emit_go(done, pos)?;
        }

        self.emit_label(otherwise_label, pos)?;
        if let Some(body) = otherwise {
            emit_body(self, body)?;
        }
        self.emit_label(done, pos)?;
        Ok(())
    }

    /// Builds `{(v1, L1), (v2, L2), ...}`, promotes it to a map with
    /// `smap`, and dispatches with a single `of1` lookup plus an
    /// indirect jump. The cache symbol reads as `omega` until first
    /// built, matching how an uninitialized symbol reads in the source
    /// language.
    fn gen_case_dispatch_map(
        &mut self,
        clauses: &[WhenClause],
        control_val: SymbolId,
        otherwise_label: LabelId,
        pos: FilePos,
    ) -> Result<(), CodeGenError> {
        let map_sym = self.symtab.enter_symbol(SymbolKind::Identifier, None, pos);
        let bypass = self.fresh_label();

        self.sink.emit(Quad::new(
            Opcode::Gone,
            [Operand::Label(bypass), Operand::Symbol(map_sym), Operand::Symbol(self.canon.sym_omega)],
            pos,
        ))?;

        let mut pairs = Vec::with_capacity(clauses.len());
        for clause in clauses {
            let value_val = self.gen_expr(clause.key, None)?;
            self.push_chunked(&[value_val, clause.label_sym], pos)?;
            let pair_count = self.materialize_count(2, pos);
            let pair = self.fresh_temp();
            self.emit_sss(Opcode::Tuple, pair, pair_count, pair_count, pos)?;
            self.free_if_temp(value_val);
            pairs.push(pair);
        }
        self.push_chunked(&pairs, pos)?;
        for p in &pairs {
            self.free_temp(*p);
        }
        let set_count = self.materialize_count(pairs.len() as i64, pos);
        let built_set = self.fresh_temp();
        self.emit_sss(Opcode::Set, built_set, set_count, set_count, pos)?;

        // `smap`'s third operand names the pair's key arity (1 here); a
        // quirk carried over from the opcode's generalised n-ary form.
        let arity = self.materialize_count(1, pos);
        self.sink.emit(Quad::new(
            Opcode::Smap,
            [Operand::Symbol(map_sym), Operand::Symbol(built_set), Operand::Symbol(arity)],
            pos,
        ))?;
        self.free_temp(built_set);

        self.emit_label(bypass, pos)?;
        let looked_up = self.fresh_temp();
        self.emit_sss(Opcode::Of1, looked_up, map_sym, control_val, pos)?;
        self.sink.emit(Quad::new(
            Opcode::Goeq,
            [Operand::Label(otherwise_label), Operand::Symbol(looked_up), Operand::Symbol(self.canon.sym_omega)],
            pos,
        ))?;
        self.sink.emit(Quad::new(
            Opcode::Goind,
            [Operand::Symbol(looked_up), Operand::Unused, Operand::Unused],
            pos,
        ))?;
        self.free_temp(looked_up);
        Ok(())
    }

    /// `guard when c1: b1 when c2: b2 ... otherwise: bo end`: unlike
    /// `case`, each clause has its own boolean condition rather than a
    /// shared control value compared against a key. The clause labels
    /// are collected into a set once (same cache idiom as the case
    /// dispatch map) and driven with the ordinary iterator loop so the
    /// generated code is identical in shape whether there are two
    /// clauses or twenty.
    fn gen_guard(
        &mut self,
        whens: &[(NodeId, NodeId)],
        otherwise: Option<NodeId>,
        pos: FilePos,
        mut emit_body: impl FnMut(&mut CodeGen, NodeId) -> Result<(), CodeGenError>,
    ) -> Result<(), CodeGenError> {
        let clauses = self.alloc_clauses(whens, pos);
        let done = self.fresh_label();

        if clauses.is_empty() {
            if let Some(body) = otherwise {
                emit_body(self, body)?;
            }
            self.emit_label(done, pos)?;
            return Ok(());
        }

        let set_sym = self.symtab.enter_symbol(SymbolKind::Identifier, None, pos);
        let bypass = self.fresh_label();
        self.sink.emit(Quad::new(
            Opcode::Gone,
            [Operand::Label(bypass), Operand::Symbol(set_sym), Operand::Symbol(self.canon.sym_omega)],
            pos,
        ))?;
        let label_syms: Vec<SymbolId> = clauses.iter().map(|c| c.label_sym).collect();
        self.push_chunked(&label_syms, pos)?;
        let count = self.materialize_count(label_syms.len() as i64, pos);
        self.emit_sss(Opcode::Set, set_sym, count, count, pos)?;
        self.emit_label(bypass, pos)?;

        let iter_sym = self.fresh_temp();
        let top = self.fresh_label();
        let iter_fail = self.fresh_label();
        self.sink.emit(Quad::new(
            Opcode::Iter,
            [Operand::Symbol(iter_sym), Operand::Symbol(set_sym), Operand::Immediate(IterKind::Single.tag())],
            pos,
        ))?;
        self.emit_label(top, pos)?;
        let cur = self.fresh_temp();
        self.sink.emit(Quad::new(
            Opcode::Inext,
            [Operand::Symbol(cur), Operand::Symbol(iter_sym), Operand::Label(iter_fail)],
            pos,
        ))?;
        self.sink.emit(Quad::new(
            Opcode::Goind,
            [Operand::Symbol(cur), Operand::Unused, Operand::Unused],
            pos,
        ))?;
        self.free_temp(cur);

        for clause in &clauses {
            let body_label = self.fresh_label();
            self.emit_label(clause.label, pos)?;
            self.gen_boolean(clause.key, body_label, top, body_label)?;
            self.emit_label(body_label, pos)?;
            emit_body(self, clause.body)?;
            self.emit_go(done, pos)?;
        }

        self.emit_label(iter_fail, pos)?;
        self.free_temp(iter_sym);
        if let Some(body) = otherwise {
            emit_body(self, body)?;
        }
        self.emit_label(done, pos)?;
        Ok(())
    }

    fn alloc_clauses(&mut self, whens: &[(NodeId, NodeId)], pos: FilePos) -> Vec<WhenClause> {
        whens
            .iter()
            .map(|(key, body)| {
                let label = self.fresh_label();
                let label_sym = self.symtab.enter_label(label.0, pos);
                WhenClause { key: *key, body: *body, label, label_sym }
            })
            .collect()
    }
}
