//! State channels and their reducers
//!
//! A channel is a named slot of workflow state. It owns its current value and
//! the merge function that folds a node's partial update into it.

use std::collections::BTreeMap;

/// Folds an update into the current value of a channel
pub type MergeFn<T> = fn(&mut T, T);

#[derive(Debug, Clone)]
pub struct Channel<T> {
    name: &'static str,
    value: T,
    merge: MergeFn<T>,
}

impl<T> Channel<T> {
    pub fn new(name: &'static str, default: impl FnOnce() -> T, merge: MergeFn<T>) -> Self {
        Self {
            name,
            value: default(),
            merge,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn merge(&mut self, update: T) {
        (self.merge)(&mut self.value, update);
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Default> Channel<T> {
    /// Replace-with-latest channel starting from `T::default()`
    pub fn replacing(name: &'static str) -> Self {
        Self::new(name, T::default, replace)
    }
}

impl<T> Channel<Vec<T>> {
    /// List channel; updates are concatenated in arrival order
    pub fn appending(name: &'static str) -> Self {
        Self::new(name, Vec::new, append)
    }
}

impl<V> Channel<BTreeMap<String, V>> {
    /// Record channel; keys from later updates win
    pub fn records(name: &'static str) -> Self {
        Self::new(name, BTreeMap::new, merge_records)
    }
}

pub fn replace<T>(slot: &mut T, update: T) {
    *slot = update;
}

pub fn append<T>(slot: &mut Vec<T>, update: Vec<T>) {
    slot.extend(update);
}

pub fn merge_records<V>(slot: &mut BTreeMap<String, V>, update: BTreeMap<String, V>) {
    slot.extend(update);
}
