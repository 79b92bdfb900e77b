//! Temporary & label pool (C3).
//!
//! Temporaries are a process-wide LIFO free list (`spec.md` §5); the only
//! reentrancy hazard in the core is a nested expression generator handing
//! out a temporary the outer caller still considers live. `ParkedTemp` is
//! the explicit handle the Design Notes ask for in place of the original's
//! "clear `is_temp`, park on a side list, restore on reuse" dance.

use crate::symtab::{SymbolAux, SymbolKind, SymbolTable};

/// A temporary that has been set aside so a nested `new_temp()` call can't
/// reissue it. Holding one is the only way to get it back via `unpark`.
#[derive(Debug)]
pub struct ParkedTemp(crate::symtab::SymbolId);

#[derive(Debug, Default)]
pub struct TempPool {
    free_list: Vec<crate::symtab::SymbolId>,
}

impl TempPool {
    pub fn new() -> Self {
        TempPool {
            free_list: Vec::new(),
        }
    }

    /// Resets the free list between procedures (`spec.md` §4.3 invariant:
    /// "the free list is reset between procedures").
    pub fn clear(&mut self) {
        self.free_list.clear();
    }

    /// `new_temp()`: returns an unused temporary, creating one if the free
    /// list is empty. The returned symbol has `has_lvalue = has_rvalue =
    /// true` and `is_temp = true`, per `spec.md` §3.
    pub fn new_temp(&mut self, symtab: &mut SymbolTable) -> crate::symtab::SymbolId {
        if let Some(id) = self.free_list.pop() {
            let entry = symtab.get_mut(id);
            entry.is_temp = true;
            entry.has_lvalue = true;
            entry.has_rvalue = true;
            entry.is_initialized = false;
            return id;
        }
        let id = symtab.enter_symbol(SymbolKind::Temp, None, crate::ast::FilePos::UNKNOWN);
        let entry = symtab.get_mut(id);
        entry.is_temp = true;
        entry.has_lvalue = true;
        entry.has_rvalue = true;
        entry.aux = SymbolAux::None;
        id
    }

    /// `free_temp(t)`: links the temporary back onto the free list so it
    /// may be reissued. Invariant: a temporary is live at most once at a
    /// time (`spec.md` §3); callers must not free a temporary still held
    /// elsewhere.
    pub fn free_temp(&mut self, symtab: &mut SymbolTable, id: crate::symtab::SymbolId) {
        symtab.get_mut(id).is_initialized = false;
        self.free_list.push(id);
    }

    /// Parks `t`, clearing its `is_temp` bit so an inner `new_temp()` call
    /// cannot reissue it while the caller still holds it live across a
    /// nested allocation.
    pub fn park(&mut self, symtab: &mut SymbolTable, id: crate::symtab::SymbolId) -> ParkedTemp {
        symtab.get_mut(id).is_temp = false;
        ParkedTemp(id)
    }

    /// Restores a parked temporary's `is_temp` bit once the nested
    /// evaluation that required parking it has completed.
    pub fn unpark(&mut self, symtab: &mut SymbolTable, parked: ParkedTemp) -> crate::symtab::SymbolId {
        symtab.get_mut(parked.0).is_temp = true;
        parked.0
    }
}

/// `new_label()`: monotonically increasing integer labels, live only
/// within a procedure.
#[derive(Debug, Default)]
pub struct LabelAlloc {
    next: u32,
}

impl LabelAlloc {
    pub fn new() -> Self {
        LabelAlloc { next: 0 }
    }

    pub fn clear(&mut self) {
        self.next = 0;
    }

    pub fn new_label(&mut self) -> crate::quads::LabelId {
        let id = crate::quads::LabelId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FilePos;

    #[test]
    fn freed_temp_is_reissued_before_allocating_fresh() {
        let mut symtab = SymbolTable::new();
        let mut pool = TempPool::new();

        let t1 = pool.new_temp(&mut symtab);
        pool.free_temp(&mut symtab, t1);
        let t2 = pool.new_temp(&mut symtab);

        assert_eq!(t1, t2);
    }

    #[test]
    fn parking_clears_is_temp_until_unparked() {
        let mut symtab = SymbolTable::new();
        let mut pool = TempPool::new();

        let outer = pool.new_temp(&mut symtab);
        let parked = pool.park(&mut symtab, outer);
        assert!(!symtab.get(outer).is_temp);

        let restored = pool.unpark(&mut symtab, parked);
        assert!(symtab.get(restored).is_temp);
    }

    #[test]
    fn labels_are_monotonic_and_unique() {
        let mut labels = LabelAlloc::new();
        let a = labels.new_label();
        let b = labels.new_label();
        assert_ne!(a, b);
    }

    #[test]
    fn clear_resets_free_list_between_procedures() {
        let mut symtab = SymbolTable::new();
        let mut pool = TempPool::new();
        let t = pool.new_temp(&mut symtab);
        pool.free_temp(&mut symtab, t);
        pool.clear();
        // After clear, the freed temp is no longer recycled; a fresh
        // symbol-table entry is allocated instead (note the unused binding
        // to ensure allocation happens at all).
        let _next = pool.new_temp(&mut symtab);
        assert_eq!(symtab.len(), 2);
        let _ = FilePos::UNKNOWN;
    }
}
