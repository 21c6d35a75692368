//! Hits store: the dense, append-only result set of a scan or filter pass.

use crate::value::{Value, ValueType};

/// A target address whose contents satisfied a scan/filter expression, plus
/// the value captured there at that moment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hit {
    pub addr: u64,
    pub value: Value,
}

/// Growable dense array of hits from one scan or filter pass, sharing a
/// common address width and value type. `with_capacity`-backed by `Vec`,
/// which already gives amortized doubling; exposed here as a named type so
/// the driver can track `addr_type`/`value_type` alongside the items.
#[derive(Debug, Clone)]
pub struct HitsStore {
    items: Vec<Hit>,
    pub addr_type: ValueType,
    pub value_type: ValueType,
}

const INITIAL_CAPACITY: usize = 256;

impl HitsStore {
    pub fn new(addr_type: ValueType, value_type: ValueType) -> Self {
        HitsStore { items: Vec::with_capacity(INITIAL_CAPACITY), addr_type, value_type }
    }

    pub fn push(&mut self, addr: u64, value: Value) {
        self.items.push(Hit { addr, value });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hit> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Hit] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a HitsStore {
    type Item = &'a Hit;
    type IntoIter = std::slice::Iter<'a, Hit>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
