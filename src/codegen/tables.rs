//! Opcode selection tables (`spec.md` §4.10).
//!
//! The original keeps three parallel function-pointer tables (default,
//! true-branch, false-branch) plus a 1-bit operand-flip table, indexed by
//! AST kind. Per the Design Notes, those become exhaustive `match` arms
//! here instead of C-style tables — the compiler checks exhaustiveness for
//! us, so adding a new `NodeKind` variant without updating these functions
//! is a build error rather than a silent `noop`.

use crate::ast::NodeKind;
use crate::quads::Opcode;

/// The default (value-producing) opcode for a binary/unary operator kind.
/// `None` for kinds with no single default opcode (control flow, calls,
/// collection formers, ...), which C7/C8 handle with bespoke sequences
/// rather than a single emit.
pub fn default_opcode(kind: NodeKind) -> Option<Opcode> {
    use NodeKind::*;
    Some(match kind {
        Add => Opcode::Add,
        Sub => Opcode::Sub,
        Mult => Opcode::Mult,
        Div => Opcode::Div,
        Expon => Opcode::Exp,
        Mod => Opcode::Mod,
        Min => Opcode::Min,
        Max => Opcode::Max,
        With => Opcode::With,
        Less => Opcode::Less,
        Lessf => Opcode::Lessf,
        Npow => Opcode::Npow,
        Uminus => Opcode::Uminus,
        Ufrom => Opcode::Ufrom,
        Domain => Opcode::Domain,
        Range => Opcode::Range,
        Not => Opcode::Not,
        Arb => Opcode::Arb,
        Nelt => Opcode::Nelt,
        And => Opcode::And,
        Or => Opcode::Or,
        From => Opcode::From,
        Fromb => Opcode::Fromb,
        Frome => Opcode::Frome,
        // Of/Ofa/Slice/End take more operands than a plain binop emit can
        // carry (a key plus the stored value, or a begin/end pair) and are
        // lowered by bespoke sequences in codegen::expr / codegen::lhs
        // instead.
        _ => return None,
    })
}

/// Whether a comparison/membership kind is "flippable": the runtime only
/// implements `lt`/`le`/`in`/`incs` as primitives, so `>`, `>=`, and
/// `subset` are lowered by swapping operands and using the flipped
/// primitive's opcode (`spec.md` §4.10, Open Questions).
pub fn is_flipped(kind: NodeKind) -> bool {
    matches!(kind, NodeKind::Gt | NodeKind::Ge | NodeKind::Subset)
}

/// Maps a (possibly flipped) comparison kind onto its canonical,
/// non-flipped counterpart for opcode lookup purposes. `Gt` shares `Lt`'s
/// opcodes with swapped operands, `Ge` shares `Le`'s, `Subset` shares
/// `Incs`'s.
fn canonical_comparison(kind: NodeKind) -> NodeKind {
    match kind {
        NodeKind::Gt => NodeKind::Lt,
        NodeKind::Ge => NodeKind::Le,
        NodeKind::Subset => NodeKind::Incs,
        other => other,
    }
}

/// The "branch-if-true" opcode for a comparison/membership/logical kind,
/// used when the caller's fall-through label is the false branch.
pub fn true_branch_opcode(kind: NodeKind) -> Option<Opcode> {
    use NodeKind::*;
    Some(match canonical_comparison(kind) {
        Eq => Opcode::Goeq,
        Ne => Opcode::Gone,
        Lt => Opcode::Golt,
        Le => Opcode::Gole,
        In => Opcode::Goin,
        Notin => Opcode::Gonotin,
        Incs => Opcode::Goincs,
        _ => return None,
    })
}

/// The "branch-if-false" opcode for the same kinds, used when the
/// caller's fall-through label is the true branch (`spec.md` §4.6's
/// tie-break rule).
pub fn false_branch_opcode(kind: NodeKind) -> Option<Opcode> {
    use NodeKind::*;
    Some(match canonical_comparison(kind) {
        Eq => Opcode::Gone,
        Ne => Opcode::Goeq,
        Lt => Opcode::Gonlt,
        Le => Opcode::Gonle,
        In => Opcode::Gonotin,
        Notin => Opcode::Goin,
        Incs => Opcode::Gonincs,
        _ => return None,
    })
}

/// True for every AST kind that gen_boolean handles as a comparison or
/// membership predicate directly (as opposed to falling back to a
/// value-based conditional jump).
pub fn is_comparison_kind(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Eq
            | NodeKind::Ne
            | NodeKind::Lt
            | NodeKind::Le
            | NodeKind::Gt
            | NodeKind::Ge
            | NodeKind::In
            | NodeKind::Notin
            | NodeKind::Incs
            | NodeKind::Subset
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gt_shares_lt_opcodes_via_flip() {
        assert!(is_flipped(NodeKind::Gt));
        assert_eq!(true_branch_opcode(NodeKind::Gt), true_branch_opcode(NodeKind::Lt));
        assert_eq!(false_branch_opcode(NodeKind::Gt), false_branch_opcode(NodeKind::Lt));
    }

    #[test]
    fn subset_shares_incs_opcodes_via_flip() {
        assert!(is_flipped(NodeKind::Subset));
        assert_eq!(
            true_branch_opcode(NodeKind::Subset),
            true_branch_opcode(NodeKind::Incs)
        );
    }

    #[test]
    fn lt_is_not_flipped() {
        assert!(!is_flipped(NodeKind::Lt));
    }

    #[test]
    fn default_opcode_is_none_for_control_flow_kinds() {
        assert_eq!(default_opcode(NodeKind::IfStmt), None);
        assert_eq!(default_opcode(NodeKind::Add), Some(Opcode::Add));
    }
}
