//! A single key-value record of the persisted list.
use serde::{Deserialize, Serialize};

/// One key-value pair of a [`SerializedMap`](crate::SerializedMap)'s persisted list.
///
/// On its own an entry carries no uniqueness guarantee, keys only become unique once the list is
/// loaded into the map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry<K, V> {
    /// The key.
    pub key: K,
    /// The value.
    pub value: V,
}

impl<K, V> Entry<K, V> {
    /// Returns a new entry.
    pub fn new(key: K, value: V) -> Self {
        Entry { key, value }
    }
    /// Returns a reference to the key.
    pub fn key(&self) -> &K {
        &self.key
    }
    /// Returns a reference to the value.
    pub fn value(&self) -> &V {
        &self.value
    }
    /// Returns a mutable reference to the value.
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }
    /// Splits the entry into its key and value.
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V> From<(K, V)> for Entry<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Entry { key, value }
    }
}

impl<K, V> From<Entry<K, V>> for (K, V) {
    fn from(entry: Entry<K, V>) -> Self {
        entry.into_pair()
    }
}
