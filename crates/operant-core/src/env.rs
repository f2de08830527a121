//! Register environment
//!
//! One `Env` exists per run. It starts empty, is written only by the
//! interpreter and is never shared between runs, so it needs no locking.

use crate::model::{Address, Param};
use serde::Serialize;
use std::collections::BTreeMap;

/// Address → value register file of a single run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Env {
    slots: BTreeMap<Address, Param>,

    #[serde(skip)]
    writes: u64,
}

impl Env {
    /// Empty register file
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a register, `None` if nothing wrote it this run
    pub fn read(&self, address: &Address) -> Option<&Param> {
        self.slots.get(address)
    }

    /// Write a register, returning the value it replaced
    pub(crate) fn write(&mut self, address: Address, param: Param) -> Option<Param> {
        self.writes += 1;
        self.slots.insert(address, param)
    }

    /// True if anything wrote `address` this run
    pub fn is_bound(&self, address: &Address) -> bool {
        self.slots.contains_key(address)
    }

    /// Number of distinct bound registers
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no register is bound
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total writes performed, overwrites included
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Bound registers in address order
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Param)> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unwritten_register_is_unbound() {
        let env = Env::new();
        assert!(env.read(&Address::from("prompt")).is_none());
        assert!(env.is_empty());
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let mut env = Env::new();
        let slot = Address::from("draft");

        assert!(env.write(slot.clone(), Param::from("first")).is_none());
        let previous = env.write(slot.clone(), Param::from("second"));

        assert_eq!(previous.and_then(|p| p.text().map(str::to_string)).as_deref(), Some("first"));
        assert_eq!(env.read(&slot).and_then(Param::text), Some("second"));
        assert_eq!(env.len(), 1);
        assert_eq!(env.writes(), 2);
    }

    proptest! {
        #[test]
        fn prop_last_write_wins(writes in prop::collection::vec((0u8..8, any::<i64>()), 1..64)) {
            let mut env = Env::new();
            let mut expected = BTreeMap::new();

            for (slot, value) in &writes {
                let address = Address::new(format!("r{slot}"));
                env.write(address.clone(), Param::from(*value));
                expected.insert(address, *value);
            }

            prop_assert_eq!(env.len(), expected.len());
            prop_assert_eq!(env.writes(), writes.len() as u64);
            for (address, value) in &expected {
                prop_assert_eq!(env.read(address).and_then(|p| p.value.as_integer()), Some(*value));
            }
        }
    }
}
