//! Symbol-table stand-in (external collaborator per `spec.md` §6).
//!
//! The real symbol/name table — scope resolution, overload sets, procedure
//! records — lives upstream of the code generator and is out of scope here.
//! This module implements exactly the operations `spec.md` §6 lists the
//! generator as depending on (`enter_symbol`, literal parsing) plus the
//! read accessors C3/C6/C7/C8/C9/C10 need, so the generator has something
//! concrete to compile against and test with.

use serde::{Deserialize, Serialize};

use crate::ast::FilePos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Identifier,
    Slot,
    Selector,
    Literal,
    Label,
    Procedure,
    Method,
    Class,
    ProcessClass,
    Package,
    UseClause,
    Temp,
}

/// A parsed literal value. Integers are arbitrary precision in the source
/// language (`spec.md` §1); represented here as a decimal string so the
/// generator never needs to reason about magnitude, matching how `quads.c`
/// treats literal operands as opaque symbol references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Integer(String),
    Real(f64),
    String(String),
    Boolean(bool),
    Omega,
}

/// Placeholder for the out-of-scope procedure-table record a `Procedure`
/// or `Method` symbol aux field would carry (formal count, entry label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcRef {
    pub formal_count: u32,
    pub has_create_method: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolAux {
    Literal(LiteralValue),
    Procedure(ProcRef),
    Label(u32),
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub kind: SymbolKind,
    pub name: Option<String>,
    pub has_lvalue: bool,
    pub has_rvalue: bool,
    pub is_rparam: bool,
    pub is_wparam: bool,
    pub is_temp: bool,
    pub is_initialized: bool,
    pub aux: SymbolAux,
    pub pos: FilePos,
}

impl SymbolEntry {
    fn new(kind: SymbolKind, name: Option<String>, pos: FilePos) -> Self {
        SymbolEntry {
            kind,
            name,
            has_lvalue: false,
            has_rvalue: false,
            is_rparam: false,
            is_wparam: false,
            is_temp: false,
            is_initialized: false,
            aux: SymbolAux::None,
            pos,
        }
    }

    /// True iff this symbol is a pure literal: has an rvalue, no lvalue.
    /// Used directly by the constant classifier (C5).
    pub fn is_pure_literal(&self) -> bool {
        self.has_rvalue && !self.has_lvalue
    }
}

/// Owns every symbol entry for the active compilation unit. Lives for the
/// enclosing compilation unit (`spec.md` §3 "Lifetimes"), longer than the
/// per-procedure `AstStore`.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            entries: Vec::new(),
        }
    }

    /// `enter_symbol(name?, pos)`: a fresh anonymous entry when `name` is
    /// `None`, per `spec.md` §6.
    pub fn enter_symbol(&mut self, kind: SymbolKind, name: Option<String>, pos: FilePos) -> SymbolId {
        let id = SymbolId(self.entries.len() as u32);
        self.entries.push(SymbolEntry::new(kind, name, pos));
        id
    }

    /// Interns a literal and returns a fresh rvalue-only symbol for it, the
    /// way the generator materialises element counts and argument counts
    /// as symbols (`spec.md` §4.10).
    pub fn enter_literal(&mut self, value: LiteralValue, pos: FilePos) -> SymbolId {
        let id = self.enter_symbol(SymbolKind::Literal, None, pos);
        let entry = self.get_mut(id);
        entry.has_rvalue = true;
        entry.has_lvalue = false;
        entry.is_initialized = true;
        entry.aux = SymbolAux::Literal(value);
        id
    }

    pub fn enter_label(&mut self, label: u32, pos: FilePos) -> SymbolId {
        let id = self.enter_symbol(SymbolKind::Label, None, pos);
        let entry = self.get_mut(id);
        entry.aux = SymbolAux::Label(label);
        id
    }

    pub fn get(&self, id: SymbolId) -> &SymbolEntry {
        &self.entries[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolEntry {
        &mut self.entries[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `char_to_int`: parse an integer literal's textual form. Arbitrary
/// precision is preserved by keeping the decimal digits as text; the
/// generator never evaluates the magnitude itself.
pub fn char_to_int(text: &str) -> Option<String> {
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        Some(text.to_string())
    } else {
        None
    }
}

/// `char_to_string`: parse a (possibly escaped) string literal's textual
/// form into its value. Escapes are limited to what the source language's
/// string literals support; unknown escapes pass through unchanged.
pub fn char_to_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Canonical process-wide literal symbols (`spec.md` §4.10). All
/// generators refer to these by id rather than interning fresh copies.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalSymbols {
    pub sym_omega: SymbolId,
    pub sym_true: SymbolId,
    pub sym_false: SymbolId,
    pub sym_zero: SymbolId,
    pub sym_one: SymbolId,
    pub sym_two: SymbolId,
}

impl CanonicalSymbols {
    pub fn install(symtab: &mut SymbolTable) -> Self {
        let pos = FilePos::UNKNOWN;
        CanonicalSymbols {
            sym_omega: symtab.enter_literal(LiteralValue::Omega, pos),
            sym_true: symtab.enter_literal(LiteralValue::Boolean(true), pos),
            sym_false: symtab.enter_literal(LiteralValue::Boolean(false), pos),
            sym_zero: symtab.enter_literal(LiteralValue::Integer("0".to_string()), pos),
            sym_one: symtab.enter_literal(LiteralValue::Integer("1".to_string()), pos),
            sym_two: symtab.enter_literal(LiteralValue::Integer("2".to_string()), pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_entry_has_rvalue_but_not_lvalue() {
        let mut symtab = SymbolTable::new();
        let lit = symtab.enter_literal(LiteralValue::Integer("3".to_string()), FilePos::UNKNOWN);
        assert!(symtab.get(lit).is_pure_literal());
    }

    #[test]
    fn identifier_entry_is_not_a_pure_literal() {
        let mut symtab = SymbolTable::new();
        let id = symtab.enter_symbol(
            SymbolKind::Identifier,
            Some("x".to_string()),
            FilePos::UNKNOWN,
        );
        let entry = symtab.get_mut(id);
        entry.has_lvalue = true;
        entry.has_rvalue = true;
        assert!(!symtab.get(id).is_pure_literal());
    }

    #[test]
    fn char_to_string_handles_common_escapes() {
        assert_eq!(char_to_string(r"a\nb"), "a\nb");
        assert_eq!(char_to_string(r#"\"q\""#), "\"q\"");
    }
}
