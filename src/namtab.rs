//! Name-table stand-in (external collaborator per `spec.md` §6).
//!
//! Interns identifier and literal textual forms. `get_namtab` is the one
//! operation the generator calls directly (`spec.md` §6) — to intern the
//! decimal text of a materialised count before looking up or creating its
//! backing literal symbol.

use std::collections::HashMap;

use crate::symtab::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameId(pub u32);

struct NameEntry {
    text: String,
    /// Current binding in the active scope, or `None` if unbound.
    symtab_ptr: Option<SymbolId>,
}

/// Owns the interning table mapping source text to a stable `NameId`.
#[derive(Default)]
pub struct NameTable {
    entries: Vec<NameEntry>,
    index: HashMap<String, NameId>,
}

impl NameTable {
    pub fn new() -> Self {
        NameTable {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// `get_namtab(text)`: intern `text`, returning the existing entry if
    /// already present.
    pub fn get_namtab(&mut self, text: &str) -> NameId {
        if let Some(&id) = self.index.get(text) {
            return id;
        }
        let id = NameId(self.entries.len() as u32);
        self.entries.push(NameEntry {
            text: text.to_string(),
            symtab_ptr: None,
        });
        self.index.insert(text.to_string(), id);
        id
    }

    pub fn text(&self, id: NameId) -> &str {
        &self.entries[id.0 as usize].text
    }

    pub fn binding(&self, id: NameId) -> Option<SymbolId> {
        self.entries[id.0 as usize].symtab_ptr
    }

    pub fn bind(&mut self, id: NameId, symbol: SymbolId) {
        self.entries[id.0 as usize].symtab_ptr = Some(symbol);
    }

    pub fn unbind(&mut self, id: NameId) {
        self.entries[id.0 as usize].symtab_ptr = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_text_returns_the_same_id() {
        let mut names = NameTable::new();
        let a = names.get_namtab("count");
        let b = names.get_namtab("count");
        assert_eq!(a, b);
    }

    #[test]
    fn unbound_name_has_no_binding() {
        let mut names = NameTable::new();
        let id = names.get_namtab("x");
        assert_eq!(names.binding(id), None);
    }
}
