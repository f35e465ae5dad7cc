use std::collections::HashMap;

use crate::error::CompileError;
use crate::span::Location;

/// Local slots of one function, numbered from 0 in first-seen order.
#[derive(Debug, Default)]
pub struct SymbolTable {
    slots: HashMap<String, u32>,
    names: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `name`, allocating one the first time the name is declared.
    pub fn declare(&mut self, name: &str) -> u32 {
        if let Some(slot) = self.slots.get(name) {
            return *slot;
        }
        let slot = self.names.len() as u32;
        self.slots.insert(name.to_string(), slot);
        self.names.push(name.to_string());
        slot
    }

    pub fn resolve(&self, name: &str) -> Option<u32> {
        self.slots.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Declared names in slot order.
    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Source of block/loop ids for one compilation unit.
#[derive(Debug, Default)]
pub struct LabelCounter {
    next: u32,
}

impl LabelCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub fn next_id(&mut self, location: Location) -> Result<u32, CompileError> {
        let id = self.next;
        self.next = id
            .checked_add(1)
            .ok_or_else(|| CompileError::codegen(location, "too many blocks in one unit"))?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_follow_declaration_order() {
        let mut symbols = SymbolTable::new();
        assert_eq!(symbols.declare("b"), 0);
        assert_eq!(symbols.declare("a"), 1);
        assert_eq!(symbols.declare("b"), 0);
        assert_eq!(symbols.resolve("a"), Some(1));
        assert_eq!(symbols.resolve("c"), None);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols.into_names(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_counter_refuses_to_wrap() {
        let mut labels = LabelCounter::starting_at(u32::MAX - 1);
        let at = Location::default();
        assert_eq!(labels.next_id(at).unwrap(), u32::MAX - 1);
        assert!(matches!(labels.next_id(at), Err(CompileError::CodegenError { .. })));
    }
}
