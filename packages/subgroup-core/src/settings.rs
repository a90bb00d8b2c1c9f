use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::ids::RecordId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Value types a settings entry can hold.
pub trait SettingsValue: Copy {
    fn into_raw(self) -> u64;
    fn from_raw(raw: u64) -> Self;
}

impl SettingsValue for u64 {
    fn into_raw(self) -> u64 {
        self
    }

    fn from_raw(raw: u64) -> Self {
        raw
    }
}

impl SettingsValue for u32 {
    fn into_raw(self) -> u64 {
        u64::from(self)
    }

    fn from_raw(raw: u64) -> Self {
        raw as u32
    }
}

impl SettingsValue for RecordId {
    fn into_raw(self) -> u64 {
        self.0
    }

    fn from_raw(raw: u64) -> Self {
        RecordId(raw)
    }
}

/// Typed handle to one named settings entry.
#[derive(Clone, Copy, Debug)]
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<T>,
}

impl<T: SettingsValue> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Typed key-value bag for record types that keep their tree fields in a
/// settings blob rather than first-class columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SettingsBag {
    values: BTreeMap<String, u64>,
}

impl SettingsBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: SettingsValue>(&self, key: Key<T>) -> Option<T> {
        self.values.get(key.name).map(|raw| T::from_raw(*raw))
    }

    pub fn set<T: SettingsValue>(&mut self, key: Key<T>, value: T) {
        self.values.insert(key.name.to_string(), value.into_raw());
    }

    pub fn unset<T: SettingsValue>(&mut self, key: Key<T>) {
        self.values.remove(key.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNT: Key<u32> = Key::new("count");
    const OWNER: Key<RecordId> = Key::new("owner");

    #[test]
    fn typed_roundtrip() {
        let mut bag = SettingsBag::new();
        bag.set(COUNT, 7);
        bag.set(OWNER, RecordId(42));

        assert_eq!(bag.get(COUNT), Some(7));
        assert_eq!(bag.get(OWNER), Some(RecordId(42)));
    }

    #[test]
    fn unset_removes_the_entry() {
        let mut bag = SettingsBag::new();
        bag.set(COUNT, 1);
        bag.unset(COUNT);
        assert_eq!(bag.get(COUNT), None);
    }
}
