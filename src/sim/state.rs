// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::btor2::{Model, Sort};
use crate::sim::value::{ArrayModel, Value};
use baa::BitVecValue;

/// A slot of the current or next state. The variant is fixed when the model is
/// loaded; a `None` payload means the slot has not been set this step.
#[derive(Debug, Clone, Default)]
pub enum StateSlot {
    #[default]
    Invalid,
    BitVec(Option<BitVecValue>),
    Array(Option<ArrayModel>),
}

impl StateSlot {
    pub fn is_set(&self) -> bool {
        match self {
            StateSlot::Invalid => false,
            StateSlot::BitVec(v) => v.is_some(),
            StateSlot::Array(v) => v.is_some(),
        }
    }

    /// Replaces the payload. The new value must match the slot variant.
    pub fn update(&mut self, value: Value) {
        match (self, value) {
            (StateSlot::BitVec(slot), Value::BitVec(v)) => *slot = Some(v),
            (StateSlot::Array(slot), Value::Array(v)) => *slot = Some(v),
            (slot, value) => panic!("state slot type mismatch: {slot:?} <- {value:?}"),
        }
    }

    /// Releases the payload, keeping the variant.
    pub fn clear(&mut self) {
        match self {
            StateSlot::Invalid => {}
            StateSlot::BitVec(v) => *v = None,
            StateSlot::Array(v) => *v = None,
        }
    }

    /// Moves the payload out, leaving the slot unset.
    pub fn take(&mut self) -> Option<Value> {
        match self {
            StateSlot::Invalid => None,
            StateSlot::BitVec(v) => v.take().map(Value::BitVec),
            StateSlot::Array(v) => v.take().map(Value::Array),
        }
    }

    /// Copies the payload out.
    pub fn value(&self) -> Option<Value> {
        match self {
            StateSlot::Invalid => None,
            StateSlot::BitVec(v) => v.clone().map(Value::BitVec),
            StateSlot::Array(v) => v.clone().map(Value::Array),
        }
    }

    pub fn bit_vec(&self) -> Option<&BitVecValue> {
        match self {
            StateSlot::BitVec(v) => v.as_ref(),
            _ => None,
        }
    }

    pub fn array(&self) -> Option<&ArrayModel> {
        match self {
            StateSlot::Array(v) => v.as_ref(),
            _ => None,
        }
    }

    pub fn array_mut(&mut self) -> Option<&mut ArrayModel> {
        match self {
            StateSlot::Array(v) => v.as_mut(),
            _ => None,
        }
    }
}

/// Id-indexed storage for the values of one time step.
#[derive(Debug)]
pub struct StateStore {
    slots: Vec<StateSlot>,
}

impl StateStore {
    /// Allocates one slot per line, typed by the line's sort. Meta lines keep
    /// an `Invalid` slot and never store a value.
    pub fn new(model: &Model) -> Self {
        let mut slots = vec![StateSlot::Invalid; model.max_id() + 1];
        for id in 1..=model.max_id() {
            let Some(line) = model.line(id) else { continue };
            if line.tag.is_meta() {
                continue;
            }
            slots[id] = match line.sort {
                Some(Sort::BitVec(_)) => StateSlot::BitVec(None),
                Some(Sort::Array { .. }) => StateSlot::Array(None),
                None => StateSlot::Invalid,
            };
        }
        StateStore { slots }
    }

    pub fn slot(&self, id: usize) -> &StateSlot {
        &self.slots[id]
    }

    pub fn slot_mut(&mut self, id: usize) -> &mut StateSlot {
        &mut self.slots[id]
    }

    /// Releases the old value and adopts the new one.
    pub fn update(&mut self, id: usize, value: Value) {
        self.slots[id].update(value);
    }

    /// Releases the value and leaves the slot unset.
    pub fn delete(&mut self, id: usize) {
        self.slots[id].clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btor2::parse_str;
    use baa::BitVecOps;

    #[test]
    fn slot_lifecycle() {
        let mut slot = StateSlot::BitVec(None);
        assert!(!slot.is_set());
        slot.update(Value::BitVec(BitVecValue::from_u64(3, 4)));
        assert!(slot.is_set());
        assert_eq!(slot.bit_vec().unwrap().to_u64().unwrap(), 3);
        let taken = slot.take().unwrap();
        assert!(!slot.is_set());
        assert_eq!(taken.as_bit_vec().unwrap().to_u64().unwrap(), 3);
    }

    #[test]
    #[should_panic]
    fn slot_variant_mismatch() {
        let mut slot = StateSlot::BitVec(None);
        slot.update(Value::Array(ArrayModel::new(2, 2)));
    }

    #[test]
    fn store_typed_by_sort() {
        let m = parse_str(
            r#"
1 sort bitvec 4
2 sort array 1 1
3 state 1 a
4 state 2 b
5 init 1 3 3
"#,
            None,
        )
        .unwrap();
        let store = StateStore::new(&m);
        assert!(matches!(store.slot(3), StateSlot::BitVec(None)));
        assert!(matches!(store.slot(4), StateSlot::Array(None)));
        // meta lines (init) keep an invalid slot
        assert!(matches!(store.slot(5), StateSlot::Invalid));
    }
}
