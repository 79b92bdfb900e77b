//! Expression code generator (C7).
//!
//! `gen_expr(ast, target?)` dispatches on AST kind and emits
//! value-producing quadruples, placing the result in a caller-supplied
//! target or a fresh temporary (`spec.md` §4.7).

use crate::ast::{FilePos, NodeId, NodeKind};
use crate::codegen::error::CodeGenError;
use crate::codegen::iter::IterKind;
use crate::codegen::state::CodeGen;
use crate::codegen::tables;
use crate::quads::{Opcode, Operand, Quad};
use crate::symtab::SymbolId;

impl CodeGen {
    pub fn gen_expr(&mut self, node: NodeId, target: Option<SymbolId>) -> Result<SymbolId, CodeGenError> {
        let pos = self.pos_of(node);
        let kind = self.ast.kind(node);

        if let Some(opcode) = tables::default_opcode(kind) {
            return self.gen_binop_or_unop(node, kind, opcode, target, pos);
        }

        match kind {
            NodeKind::Symtab => {
                let sym = self.ast.get(node).symbol().ok_or_else(|| {
                    CodeGenError::Trap("symtab leaf missing a symbol".to_string())
                })?;
                match target {
                    Some(t) => {
                        self.emit_assign(t, sym, pos)?;
                        Ok(t)
                    }
                    None => Ok(sym),
                }
            }

            NodeKind::And | NodeKind::Or => self.gen_expr_boolean_value(node, target, pos),

            NodeKind::Question => self.gen_expr_question(node, target, pos),

            NodeKind::EnumSet | NodeKind::EnumTup => self.gen_expr_enumerated(node, kind, target, pos),

            NodeKind::Genset | NodeKind::Gentup | NodeKind::GensetNoexp | NodeKind::GentupNoexp => {
                self.gen_expr_former(node, kind, target, pos)
            }

            NodeKind::ArithSet | NodeKind::ArithTup => self.gen_expr_arith_former(node, kind, target, pos),

            NodeKind::Exists | NodeKind::Forall => self.gen_expr_quantifier(node, kind, target, pos),

            NodeKind::Apply | NodeKind::Binapply => self.gen_expr_fold(node, kind, target, pos),

            NodeKind::IfExpr => self.gen_expr_if(node, target, pos),
            NodeKind::While | NodeKind::Until | NodeKind::Loop | NodeKind::For => {
                self.gen_expr_loop(node, kind, target, pos)
            }

            NodeKind::CaseExpr => self.gen_case_expr(node, target, pos),
            NodeKind::GuardExpr => self.gen_guard_expr(node, target, pos),

            NodeKind::Call => self.gen_expr_call(node, target, pos),

            NodeKind::Initobj => self.gen_expr_initobj(node, target, pos),

            NodeKind::Slotof | NodeKind::Slotcall => self.gen_expr_slot(node, kind, target, pos),

            NodeKind::Of | NodeKind::Ofa => self.gen_expr_index(node, kind, target, pos),

            NodeKind::Slice => self.gen_expr_slice(node, target, pos),
            NodeKind::End => self.gen_expr_end(node, target, pos),

            NodeKind::From | NodeKind::Fromb | NodeKind::Frome => self.gen_expr_stream_pop(node, kind, target, pos),

            NodeKind::Self_ => self.gen_expr_nullary(Opcode::Self_, target, pos),
            NodeKind::Menviron => self.gen_expr_nullary(Opcode::Menviron, target, pos),
            NodeKind::Penviron => self.gen_expr_nullary(Opcode::Penviron, target, pos),

            NodeKind::Null => {
                let result = target.unwrap_or_else(|| self.fresh_temp());
                self.emit_assign(result, self.canon.sym_omega, pos)?;
                Ok(result)
            }

            other => Err(CodeGenError::Trap(format!(
                "{:?} is not a value-producing expression kind",
                other
            ))),
        }
    }

    fn gen_binop_or_unop(
        &mut self,
        node: NodeId,
        kind: NodeKind,
        opcode: Opcode,
        target: Option<SymbolId>,
        pos: FilePos,
    ) -> Result<SymbolId, CodeGenError> {
        let children = self.ast.children(node);
        let result = target.unwrap_or_else(|| self.fresh_temp());

        if children.len() == 1 {
            let child = children[0];
            let v = self.gen_expr(child, None)?;
            self.emit_sss(opcode, result, v, v, pos)?;
            self.free_if_temp(v);
            return Ok(result);
        }

        let mut lhs = children[0];
        let mut rhs = children[1];
        if tables::is_flipped(kind) {
            std::mem::swap(&mut lhs, &mut rhs);
        }
        let left = self.gen_expr(lhs, None)?;
        let right = self.gen_expr(rhs, None)?;
        self.emit_sss(opcode, result, left, right, pos)?;
        self.free_if_temp(left);
        self.free_if_temp(right);
        Ok(result)
    }

    /// `and`/`or` used in value position: lower the boolean, then
    /// materialise `true`/`false` into the target (`spec.md` §4.7).
    fn gen_expr_boolean_value(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let true_label = self.fresh_label();
        let false_label = self.fresh_label();
        let done = self.fresh_label();

        self.gen_boolean(node, true_label, false_label, true_label)?;
        self.emit_label(true_label, pos)?;
        self.emit_assign(result, self.canon.sym_true, pos)?;
        self.emit_go(done, pos)?;
        self.emit_label(false_label, pos)?;
        self.emit_assign(result, self.canon.sym_false, pos)?;
        self.emit_label(done, pos)?;
        Ok(result)
    }

    /// `left ? right`: value of `left` unless it is `omega`, else value
    /// of `right`.
    fn gen_expr_question(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let left = self.ast.child(node, 0);
        let right = self.ast.child(node, 1);

        let left_val = self.gen_expr(left, None)?;
        self.emit_assign(result, left_val, pos)?;
        self.free_if_temp(left_val);

        let done = self.fresh_label();
        self.sink.emit(Quad::new(
            Opcode::Gone,
            [Operand::Label(done), Operand::Symbol(result), Operand::Symbol(self.canon.sym_omega)],
            pos,
        ))?;
        self.gen_expr(right, Some(result))?;
        self.emit_label(done, pos)?;
        Ok(result)
    }

    /// Enumerated set/tuple former: evaluate every element, push them in
    /// chunks of three, emit a single construction opcode with the
    /// materialised cardinality.
    fn gen_expr_enumerated(&mut self, node: NodeId, kind: NodeKind, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let elements = self.ast.children(node).to_vec();
        let mut values = Vec::with_capacity(elements.len());
        for e in &elements {
            values.push(self.gen_expr(*e, None)?);
        }
        self.push_chunked(&values, pos)?;
        for v in &values {
            self.free_if_temp(*v);
        }
        let count = self.materialize_count(values.len() as i64, pos);
        let opcode = if kind == NodeKind::EnumSet { Opcode::Set } else { Opcode::Tuple };
        self.emit_sss(opcode, result, count, count, pos)?;
        Ok(result)
    }

    /// `{e : iters | cond}` / `[e : iters | cond]`: iterate the source,
    /// pushing the template value and bumping a cardinality counter on
    /// each step, then build the collection.
    fn gen_expr_former(&mut self, node: NodeId, kind: NodeKind, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let template = self.ast.child(node, 0);
        let iter_list = self.ast.child(node, 1);
        let cond = match self.ast.kind(self.ast.child(node, 2)) {
            NodeKind::Null => None,
            _ => Some(self.ast.child(node, 2)),
        };

        let count = self.fresh_temp();
        self.emit_assign(count, self.canon.sym_zero, pos)?;
        let one = self.canon.sym_one;
        let pushed = std::cell::RefCell::new(Vec::new());

        self.gen_iter_varvals(iter_list, cond, pos, |cg| {
            let v = cg.gen_expr(template, None)?;
            pushed.borrow_mut().push(v);
            cg.emit_sss(Opcode::Add, count, count, one, pos)?;
            Ok(())
        })?;

        let values = pushed.into_inner();
        self.push_chunked(&values, pos)?;
        for v in &values {
            self.free_if_temp(*v);
        }
        let opcode = if matches!(kind, NodeKind::Genset | NodeKind::GensetNoexp) { Opcode::Set } else { Opcode::Tuple };
        self.emit_sss(opcode, result, count, count, pos)?;
        self.free_temp(count);
        Ok(result)
    }

    /// `{first, second .. last}` / `[first, second .. last]`: driven by
    /// the arithmetic iterator (C9), collecting each stepped value.
    fn gen_expr_arith_former(&mut self, node: NodeId, kind: NodeKind, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let first = self.ast.child(node, 0);
        let second_node = self.ast.child(node, 1);
        let second = match self.ast.kind(second_node) {
            NodeKind::Null => None,
            _ => Some(second_node),
        };
        let last = self.ast.child(node, 2);

        let bound = self.fresh_temp();
        let count = self.fresh_temp();
        self.emit_assign(count, self.canon.sym_zero, pos)?;
        let one = self.canon.sym_one;
        let pushed = std::cell::RefCell::new(Vec::new());

        self.gen_arith_iter(bound, first, second, last, pos, |cg| {
            let v = cg.fresh_temp();
            cg.emit_assign(v, bound, pos)?;
            pushed.borrow_mut().push(v);
            cg.emit_sss(Opcode::Add, count, count, one, pos)?;
            Ok(())
        })?;
        self.free_temp(bound);

        let values = pushed.into_inner();
        self.push_chunked(&values, pos)?;
        for v in &values {
            self.free_temp(*v);
        }
        let opcode = if kind == NodeKind::ArithSet { Opcode::Set } else { Opcode::Tuple };
        self.emit_sss(opcode, result, count, count, pos)?;
        self.free_temp(count);
        Ok(result)
    }

    /// `exists x in S | p(x)` / `forall x in S | p(x)`: default result is
    /// `false`/`true`; a hit flips it and breaks.
    fn gen_expr_quantifier(&mut self, node: NodeId, kind: NodeKind, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let iter_list = self.ast.child(node, 0);
        let cond = self.ast.child(node, 1);

        let (default, hit) = if kind == NodeKind::Exists {
            (self.canon.sym_false, self.canon.sym_true)
        } else {
            (self.canon.sym_true, self.canon.sym_false)
        };
        self.emit_assign(result, default, pos)?;

        let done = self.fresh_label();
        let clauses = self.ast.children(iter_list).to_vec();
        let bound = self.ast.child(clauses[0], 0);
        let source = self.ast.child(clauses[0], 1);

        self.gen_iter_values(source, IterKind::Set, pos, |cg, value| {
            if cg.ast.kind(bound) == NodeKind::Symtab {
                let b = cg.ast.get(bound).symbol().unwrap();
                cg.emit_assign(b, value, pos)?;
            }
            let t = cg.fresh_label();
            let f = cg.fresh_label();
            let want_true = kind == NodeKind::Exists;
            if want_true {
                cg.gen_boolean(cond, t, f, f)?;
            } else {
                cg.gen_boolean(cond, t, f, t)?;
            }
            if want_true {
                cg.emit_label(t, pos)?;
                cg.emit_assign(result, hit, pos)?;
                cg.emit_go(done, pos)?;
                cg.emit_label(f, pos)?;
            } else {
                cg.emit_label(f, pos)?;
                cg.emit_assign(result, hit, pos)?;
                cg.emit_go(done, pos)?;
                cg.emit_label(t, pos)?;
            }
            Ok(())
        })?;
        self.emit_label(done, pos)?;
        Ok(result)
    }

    /// `op/ S` (apply) and `seed op/ S` (binapply): fold a binary
    /// operator across elements.
    fn gen_expr_fold(&mut self, node: NodeId, kind: NodeKind, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let op = tables::default_opcode(self.ast.kind(self.ast.child(node, 0)))
            .ok_or_else(|| CodeGenError::Trap("apply/binapply operator tag has no default opcode".to_string()))?;

        let (source, seed) = if kind == NodeKind::Apply {
            (self.ast.child(node, 1), None)
        } else {
            (self.ast.child(node, 2), Some(self.ast.child(node, 1)))
        };

        let first = std::cell::Cell::new(seed.is_none());
        match seed {
            Some(s) => {
                let v = self.gen_expr(s, None)?;
                self.emit_assign(result, v, pos)?;
                self.free_if_temp(v);
            }
            None => {}
        }

        self.gen_iter_values(source, IterKind::Set, pos, |cg, value| {
            if first.get() {
                cg.emit_assign(result, value, pos)?;
                first.set(false);
            } else {
                cg.emit_sss(op, result, result, value, pos)?;
            }
            Ok(())
        })?;
        Ok(result)
    }

    /// `if cond then a else b end` in expression position: both arms
    /// assign into `target`/a fresh temp.
    fn gen_expr_if(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let cond = self.ast.child(node, 0);
        let then_branch = self.ast.child(node, 1);
        let else_branch = self.ast.child(node, 2);

        let t = self.fresh_label();
        let f = self.fresh_label();
        let done = self.fresh_label();
        self.gen_boolean(cond, t, f, t)?;
        self.emit_label(t, pos)?;
        self.gen_expr(then_branch, Some(result))?;
        self.emit_go(done, pos)?;
        self.emit_label(f, pos)?;
        if self.ast.kind(else_branch) == NodeKind::Null {
            self.emit_assign(result, self.canon.sym_omega, pos)?;
        } else {
            self.gen_expr(else_branch, Some(result))?;
        }
        self.emit_label(done, pos)?;
        Ok(result)
    }

    /// `while`/`until`/`loop`/`for` in expression position: a loop frame
    /// whose `value_target` receives `exit <expr>`'s value, defaulting
    /// to `omega` if the loop finishes normally.
    fn gen_expr_loop(&mut self, node: NodeId, kind: NodeKind, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        self.emit_assign(result, self.canon.sym_omega, pos)?;

        let top = self.fresh_label();
        let exit_label = self.fresh_label();
        let continue_label = self.fresh_label();
        self.loops.push(exit_label, continue_label, Some(result));
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
        Ok(result)
    }

    fn gen_expr_call(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        self.gen_call(node, target, pos)
    }

    /// `proc(args)`: push the argument values, `lcall` the procedure,
    /// invoke with `call`, then pop back any argument that was itself a
    /// valid assignment target so write-parameters see their updated
    /// value (`spec.md` §4.7). Which formals are actually `var` lives in
    /// the out-of-scope symbol table's procedure record; lacking that,
    /// every lvalue-shaped argument is treated as a write-parameter
    /// candidate, matching the conservative behaviour the generator
    /// falls back to when formal-parameter mode information is
    /// unavailable.
    pub fn gen_call(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let callee = self.ast.child(node, 0);
        let proc_sym = self.ast.get(callee).symbol().ok_or_else(|| {
            CodeGenError::Trap("call target is not a bare procedure reference".to_string())
        })?;
        let args = self.ast.children(self.ast.child(node, 1)).to_vec();

        let mut values = Vec::with_capacity(args.len());
        for a in &args {
            values.push(self.gen_expr(*a, None)?);
        }
        self.push_chunked(&values, pos)?;
        for v in &values {
            self.free_if_temp(*v);
        }

        self.sink.emit(Quad::new(
            Opcode::Lcall,
            [Operand::Symbol(proc_sym), Operand::Unused, Operand::Unused],
            pos,
        ))?;
        let argc = self.materialize_count(args.len() as i64, pos);
        self.emit_sss(Opcode::Call, result, argc, argc, pos)?;

        let wparam_args: Vec<NodeId> = args
            .iter()
            .copied()
            .filter(|a| {
                matches!(
                    self.ast.kind(*a),
                    NodeKind::Symtab | NodeKind::Of | NodeKind::Ofa | NodeKind::Slot
                )
            })
            .collect();
        if !wparam_args.is_empty() {
            let popped = self.pop_chunked(wparam_args.len(), pos)?;
            for (arg, value) in wparam_args.into_iter().zip(popped) {
                self.gen_lhs(arg, value, pos)?;
                self.free_temp(value);
            }
        }
        Ok(result)
    }

    /// `initobj class(args)`: `q_initobj class ; q_lcall InitObj ;
    /// q_lcall Create n ; q_initend target class` (`spec.md` §4.7); the
    /// `Create` call is omitted when the class has no explicit create
    /// method.
    fn gen_expr_initobj(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let class_leaf = self.ast.child(node, 0);
        let class_sym = self.ast.get(class_leaf).symbol().ok_or_else(|| {
            CodeGenError::Trap("initobj class leaf missing a symbol".to_string())
        })?;
        let args = self.ast.children(self.ast.child(node, 1)).to_vec();

        self.sink.emit(Quad::new(
            Opcode::Initobj,
            [Operand::Symbol(class_sym), Operand::Unused, Operand::Unused],
            pos,
        ))?;
        self.sink.emit(Quad::new(
            Opcode::Lcall,
            [Operand::Symbol(class_sym), Operand::Unused, Operand::Unused],
            pos,
        ))?;

        let has_create = matches!(
            &self.symtab.get(class_sym).aux,
            crate::symtab::SymbolAux::Procedure(p) if p.has_create_method
        );
        if has_create {
            let mut values = Vec::with_capacity(args.len());
            for a in &args {
                values.push(self.gen_expr(*a, None)?);
            }
            self.push_chunked(&values, pos)?;
            for v in &values {
                self.free_if_temp(*v);
            }
            let argc = self.materialize_count(values.len() as i64, pos);
            self.emit_sss(Opcode::Lcall, class_sym, argc, argc, pos)?;
        }

        self.sink.emit(Quad::new(
            Opcode::Initend,
            [Operand::Symbol(result), Operand::Symbol(class_sym), Operand::Unused],
            pos,
        ))?;
        Ok(result)
    }

    /// `obj.slot` / `obj.slot(args)`: the `slotof` idiom that lets the VM
    /// tell a method call from an instance-variable read apart at
    /// runtime. The following quadruple only executes in the
    /// instance-variable case.
    fn gen_expr_slot(&mut self, node: NodeId, kind: NodeKind, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let obj = self.ast.child(node, 0);
        let obj_val = self.gen_expr(obj, None)?;
        let slot_name = self.ast.get(node).extension.ok_or_else(|| {
            CodeGenError::Trap("slot access missing a slot-name symbol".to_string())
        })?;

        self.sink.emit(Quad::new(
            Opcode::Slotof,
            [Operand::Symbol(result), Operand::Symbol(obj_val), Operand::Symbol(slot_name)],
            pos,
        ))?;

        if kind == NodeKind::Slotcall {
            let args = self.ast.children(self.ast.child(node, 1)).to_vec();
            let mut values = Vec::with_capacity(args.len());
            for a in &args {
                values.push(self.gen_expr(*a, None)?);
            }
            self.push_chunked(&values, pos)?;
            for v in &values {
                self.free_if_temp(*v);
            }
            let argc = self.materialize_count(values.len() as i64, pos);
            self.emit_sss(Opcode::Call, result, argc, argc, pos)?;
        } else {
            self.sink.emit(Quad::new(
                Opcode::Slot,
                [Operand::Symbol(result), Operand::Symbol(obj_val), Operand::Symbol(slot_name)],
                pos,
            ))?;
        }
        self.free_if_temp(obj_val);
        Ok(result)
    }

    fn gen_expr_index(&mut self, node: NodeId, kind: NodeKind, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let expr = self.ast.child(node, 0);
        let key = self.ast.child(node, 1);
        let expr_val = self.gen_expr(expr, None)?;
        let key_val = self.gen_expr(key, None)?;
        let opcode = if kind == NodeKind::Ofa { Opcode::Ofa } else { Opcode::Of1 };
        self.emit_sss(opcode, result, expr_val, key_val, pos)?;
        self.free_if_temp(expr_val);
        self.free_if_temp(key_val);
        Ok(result)
    }

    fn gen_expr_slice(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let expr = self.ast.child(node, 0);
        let b = self.ast.child(node, 1);
        let e = self.ast.child(node, 2);
        let expr_val = self.gen_expr(expr, None)?;
        let b_val = self.gen_expr(b, None)?;
        let e_val = self.gen_expr(e, None)?;
        self.push_chunked(&[expr_val, b_val, e_val], pos)?;
        self.sink.emit(Quad::new(
            Opcode::Slice,
            [Operand::Symbol(result), Operand::Unused, Operand::Unused],
            pos,
        ))?;
        self.free_if_temp(expr_val);
        self.free_if_temp(b_val);
        self.free_if_temp(e_val);
        Ok(result)
    }

    fn gen_expr_end(&mut self, node: NodeId, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let expr = self.ast.child(node, 0);
        let b = self.ast.child(node, 1);
        let expr_val = self.gen_expr(expr, None)?;
        let b_val = self.gen_expr(b, None)?;
        self.emit_sss(Opcode::End, result, expr_val, b_val, pos)?;
        self.free_if_temp(expr_val);
        self.free_if_temp(b_val);
        Ok(result)
    }

    /// `from`/`fromb`/`frome`: destructive pop-like operators that
    /// return a value and modify their argument in place; if the
    /// modified operand is not a bare identifier, write it back through
    /// C10.
    fn gen_expr_stream_pop(&mut self, node: NodeId, kind: NodeKind, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        let arg = self.ast.child(node, 0);
        let arg_val = self.gen_expr(arg, None)?;
        let opcode = match kind {
            NodeKind::From => Opcode::From,
            NodeKind::Fromb => Opcode::Fromb,
            _ => Opcode::Frome,
        };
        self.emit_sss(opcode, result, arg_val, arg_val, pos)?;
        if self.ast.kind(arg) != NodeKind::Symtab {
            self.gen_lhs(arg, arg_val, pos)?;
        }
        self.free_if_temp(arg_val);
        Ok(result)
    }

    fn gen_expr_nullary(&mut self, opcode: Opcode, target: Option<SymbolId>, pos: FilePos) -> Result<SymbolId, CodeGenError> {
        let result = target.unwrap_or_else(|| self.fresh_temp());
        self.sink.emit(Quad::new(
            opcode,
            [Operand::Symbol(result), Operand::Unused, Operand::Unused],
            pos,
        ))?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LeafRef;
    use crate::config::CodeGenConfig;

    fn leaf_var(cg: &mut CodeGen, name: &str) -> NodeId {
        let sym = cg.symtab.enter_symbol(
            crate::symtab::SymbolKind::Identifier,
            Some(name.to_string()),
            FilePos::UNKNOWN,
        );
        cg.symtab.get_mut(sym).has_lvalue = true;
        cg.symtab.get_mut(sym).has_rvalue = true;
        cg.ast.alloc_leaf(NodeKind::Symtab, LeafRef::Symbol(sym), FilePos::UNKNOWN)
    }

    #[test]
    fn simple_add_emits_a_single_quad_into_the_target() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let a = leaf_var(&mut cg, "a");
        let b = leaf_var(&mut cg, "b");
        let add = cg.ast.alloc_internal(NodeKind::Add, vec![a, b], FilePos::UNKNOWN);
        let x = cg.fresh_temp();

        cg.gen_expr(add, Some(x)).unwrap();

        let quads = cg.sink.as_list_mut().unwrap();
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].opcode, Opcode::Add);
        assert_eq!(quads[0].operands[0], Operand::Symbol(x));
    }

    #[test]
    fn enumerated_set_pushes_then_constructs() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let a = leaf_var(&mut cg, "a");
        let b = leaf_var(&mut cg, "b");
        let set = cg.ast.alloc_internal(NodeKind::EnumSet, vec![a, b], FilePos::UNKNOWN);

        cg.gen_expr(set, None).unwrap();

        let quads = cg.sink.as_list_mut().unwrap();
        assert!(quads.iter().any(|q| q.opcode == Opcode::Push2));
        assert_eq!(quads.last().unwrap().opcode, Opcode::Set);
    }

    #[test]
    fn question_short_circuits_when_left_is_not_omega() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let a = leaf_var(&mut cg, "a");
        let b = leaf_var(&mut cg, "b");
        let q = cg.ast.alloc_internal(NodeKind::Question, vec![a, b], FilePos::UNKNOWN);

        cg.gen_expr(q, None).unwrap();

        let quads = cg.sink.as_list_mut().unwrap();
        assert!(quads.iter().any(|quad| quad.opcode == Opcode::Gone));
    }

    #[test]
    fn if_expression_assigns_into_target_on_both_arms() {
        let mut cg = CodeGen::new(CodeGenConfig::default());
        let p = leaf_var(&mut cg, "p");
        let a = leaf_var(&mut cg, "a");
        let b = leaf_var(&mut cg, "b");
        let if_expr = cg.ast.alloc_internal(NodeKind::IfExpr, vec![p, a, b], FilePos::UNKNOWN);
        let x = cg.fresh_temp();

        cg.gen_expr(if_expr, Some(x)).unwrap();

        let quads = cg.sink.as_list_mut().unwrap();
        assert!(quads.iter().filter(|q| q.opcode == Opcode::Label).count() >= 3);
    }
}
