//! [SerializedMap] is a map that persists itself as an ordered list of entries.
use crate::{
    entry::Entry, error::SerializedMapError, lookup_table::LookupTable, options::SyncOptions,
    DefaultBuildHasher,
};
use core::hash::Hash;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{borrow::Borrow, hash::BuildHasher};

/// A map that persists itself as an ordered list of [`Entry`] records.
///
/// The entry list is what gets serialized and what external tooling edits. The table is what
/// lookups see. The two are reconciled by [`load`](Self::load), which the persistence layer calls
/// after filling the list, and by [`prepare_for_persist`](Self::prepare_for_persist), which it
/// calls before writing the list out.
///
/// Lookups only reflect the state established by the most recent `load`. Edits made through
/// [`add_serialized`](Self::add_serialized), [`remove_serialized`](Self::remove_serialized),
/// [`set_serialized`](Self::set_serialized) or [`entries_mut`](Self::entries_mut) become visible
/// after the next `load`.
///
/// The table iterates in the order in which keys first occur in the list.
#[derive(Clone)]
pub struct SerializedMap<K, V, S = DefaultBuildHasher> {
    table: IndexMap<K, V, S>,
    entries: Vec<Entry<K, V>>,
    lookup: LookupTable<S>,
    options: SyncOptions,
    /// The entries were moved into the table by a load that didn't retain them.
    entries_freed: bool,
}

impl<K, V, S: Default> Default for SerializedMap<K, V, S> {
    fn default() -> Self {
        SerializedMap::with_options(SyncOptions::default())
    }
}

impl<K, V, S: Default> SerializedMap<K, V, S> {
    /// Returns an empty map using the default [`SyncOptions`].
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns an empty map using the specified options.
    pub fn with_options(options: SyncOptions) -> Self {
        SerializedMap {
            table: IndexMap::default(),
            entries: Vec::new(),
            lookup: LookupTable::default(),
            options,
            entries_freed: false,
        }
    }
}

impl<K, V, S: Clone> SerializedMap<K, V, S> {
    /// Returns an empty map using the specified options and the provided BuildHasher.
    pub fn with_hasher(options: SyncOptions, build_hasher: S) -> Self {
        SerializedMap {
            table: IndexMap::with_hasher(build_hasher.clone()),
            entries: Vec::new(),
            lookup: LookupTable::with_hasher(build_hasher),
            options,
            entries_freed: false,
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher + Default> SerializedMap<K, V, S> {
    /// Returns a map loaded from the given entry list using the default [`SyncOptions`].
    pub fn from_entries(entries: Vec<Entry<K, V>>) -> Self {
        let mut map = Self::new();
        map.replace_entries(entries);
        map.load();
        map
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug, S> std::fmt::Debug for SerializedMap<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedMap")
            .field("table", &self.table)
            .field("entries", &self.entries)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<K, V, S> SerializedMap<K, V, S> {
    /// Returns the options controlling synchronization.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }
    /// Returns the options controlling synchronization, allowing mutation.
    ///
    /// The host sets [`SyncOptions::final_build`] here before the last persist.
    pub fn options_mut(&mut self) -> &mut SyncOptions {
        &mut self.options
    }
    /// Returns the number of keys in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }
    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
    /// Returns a reference to the table.
    pub fn table(&self) -> &IndexMap<K, V, S> {
        &self.table
    }
    /// Returns an iterator over all key-value pairs of the table.
    pub fn iter(&self) -> indexmap::map::Iter<'_, K, V> {
        self.table.iter()
    }
    /// Returns an iterator over all keys of the table.
    pub fn keys(&self) -> indexmap::map::Keys<'_, K, V> {
        self.table.keys()
    }
    /// Returns an iterator over all values of the table.
    pub fn values(&self) -> indexmap::map::Values<'_, K, V> {
        self.table.values()
    }
    /// Returns the persisted entry list.
    ///
    /// After a load that didn't [retain](SyncOptions::retain_entries_after_load) the entries,
    /// this only holds entries added since. The table's contents are put back in front of them by
    /// the next edit or [`prepare_for_persist`](Self::prepare_for_persist).
    pub fn entries(&self) -> &[Entry<K, V>] {
        &self.entries
    }
    /// Returns the persisted entry list for direct editing.
    ///
    /// The lookup table is considered out of date afterwards, and the table won't reflect the
    /// edits until the next [`load`](Self::load). See [`entries`](Self::entries) for what the list
    /// holds after a load that didn't retain it.
    pub fn entries_mut(&mut self) -> &mut Vec<Entry<K, V>> {
        self.lookup.invalidate();
        &mut self.entries
    }
    /// Replaces the whole entry list and returns the previous one.
    ///
    /// The table won't reflect the new list until the next [`load`](Self::load).
    pub fn replace_entries(&mut self, entries: Vec<Entry<K, V>>) -> Vec<Entry<K, V>> {
        self.lookup.invalidate();
        self.entries_freed = false;
        std::mem::replace(&mut self.entries, entries)
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> SerializedMap<K, V, S> {
    /// Returns a reference to the value corresponding to the specified key, if it exists.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.table.get(key)
    }
    /// Returns references to the key and value corresponding to the specified key, if it exists.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.table.get_key_value(key)
    }
    /// Returns `true` if the table contains the specified key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.table.contains_key(key)
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> SerializedMap<K, V, S> {
    /// Puts the table's contents back in front of the entry list if a previous load freed it.
    fn restore_entries(&mut self) {
        if !self.entries_freed {
            return;
        }
        self.entries_freed = false;
        let pending = std::mem::take(&mut self.entries);
        self.entries = self
            .table
            .iter()
            .map(|(key, value)| Entry::new(key.clone(), value.clone()))
            .chain(pending)
            .collect();
        self.lookup.invalidate();
    }

    /// Returns `true` if any key occurs more than once in the entry list.
    pub fn has_duplicates(&mut self) -> bool {
        self.restore_entries();
        self.lookup.refresh(&self.entries);
        self.lookup.len() != self.entries.len()
    }
    /// Returns the positions of every key that occurs more than once in the entry list, ordered
    /// by the position of its first occurrence.
    ///
    /// Editors use this to highlight conflicting entries.
    pub fn duplicate_positions(&mut self) -> Vec<Vec<usize>> {
        self.restore_entries();
        self.lookup.refresh(&self.entries);
        self.lookup.duplicates()
    }

    /// Appends a new entry to the entry list.
    ///
    /// Fails with [`SerializedMapError::DuplicateKey`] if an entry with the same key exists, in
    /// which case the list is left unchanged. The table is not updated.
    pub fn add_serialized(&mut self, key: K, value: V) -> Result<(), SerializedMapError<K>> {
        self.restore_entries();
        self.lookup.refresh(&self.entries);
        if self.lookup.count(&key, &self.entries) != 0 {
            return Err(SerializedMapError::DuplicateKey { key });
        }
        self.entries.push(Entry::new(key, value));
        self.lookup.push(&self.entries);
        Ok(())
    }

    /// Removes every entry with the specified key from the entry list and returns how many were
    /// removed.
    ///
    /// Removing all matches rather than the first one also clears out duplicates left behind by
    /// earlier edits. Absent keys are ignored. The table is not updated.
    pub fn remove_serialized<Q>(&mut self, key: &Q) -> usize
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.restore_entries();
        let len = self.entries.len();
        self.entries.retain(|entry| entry.key.borrow() != key);
        let removed = len - self.entries.len();
        if removed != 0 {
            self.lookup.recompute(&self.entries);
        }
        removed
    }

    /// Replaces the value of the first entry with the specified key and returns the previous
    /// value.
    ///
    /// Fails with [`SerializedMapError::KeyNotFound`] if no entry has that key. The length and
    /// order of the entry list never change. The table is not updated.
    pub fn set_serialized(&mut self, key: K, value: V) -> Result<V, SerializedMapError<K>> {
        self.restore_entries();
        self.lookup.refresh(&self.entries);
        match self.lookup.first_position(&key, &self.entries) {
            Some(position) => Ok(std::mem::replace(
                &mut self.entries[position].value,
                value,
            )),
            None => Err(SerializedMapError::KeyNotFound { key }),
        }
    }

    /// Rebuilds the table from the entry list.
    ///
    /// Entries are visited in list order and a key that was already seen is skipped, so the
    /// first occurrence of a duplicated key wins. Duplicates are never an error here, they are
    /// expected after manual edits or merges.
    ///
    /// With [`SyncOptions::retain_entries_after_load`] the list is kept and the lookup table is
    /// recomputed. Otherwise the entries are moved into the table and the list is freed.
    pub fn load(&mut self) {
        self.restore_entries();
        self.table.clear();
        let mut skipped = 0;

        if self.options.retain_entries_after_load {
            self.table.reserve(self.entries.len());
            for entry in &self.entries {
                match self.table.entry(entry.key.clone()) {
                    indexmap::map::Entry::Occupied(_) => skipped += 1,
                    indexmap::map::Entry::Vacant(vacant) => {
                        vacant.insert(entry.value.clone());
                    }
                }
            }
            self.lookup.recompute(&self.entries);
            self.entries_freed = false;
        } else {
            let entries = std::mem::take(&mut self.entries);
            self.table.reserve(entries.len());
            for Entry { key, value } in entries {
                match self.table.entry(key) {
                    indexmap::map::Entry::Occupied(_) => skipped += 1,
                    indexmap::map::Entry::Vacant(vacant) => {
                        vacant.insert(value);
                    }
                }
            }
            self.lookup.clear();
            self.entries_freed = true;
        }

        if skipped != 0 {
            log::debug!(
                "load kept the first occurrence of duplicated keys, skipping {skipped} entries"
            );
        }
    }

    /// Brings the entry list into the shape that should be persisted.
    ///
    /// Outside of a [final build](SyncOptions::final_build) duplicates are left in place, so
    /// whoever edits the list can still see and resolve them. In a final build they are removed,
    /// keeping the first occurrence of each key.
    ///
    /// If the list was freed by a previous [`load`](Self::load) it is first rebuilt from the
    /// table, so persisting never drops the map's contents.
    pub fn prepare_for_persist(&mut self) {
        self.restore_entries();

        if self.options.final_build {
            let removed = self.lookup.remove_duplicates(&mut self.entries);
            if removed != 0 {
                log::debug!("final build removed {removed} entries with duplicate keys");
            }
        }
    }

    /// Replaces the entry list with the contents of `source` and loads it.
    ///
    /// Afterwards the table equals `source`. Pairs are stored in the iteration order of
    /// `source`, and should `source` repeat a key, its first value wins.
    pub fn clone_from_map<I: IntoIterator<Item = (K, V)>>(&mut self, source: I) {
        self.replace_entries(source.into_iter().map(Entry::from).collect());
        self.load();
    }
}

impl<K, V, S> FromIterator<(K, V)> for SerializedMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.clone_from_map(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a SerializedMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = indexmap::map::Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Writes the entry list as a sequence, exactly in its stored order.
///
/// Call [`prepare_for_persist`](SerializedMap::prepare_for_persist) first.
impl<K: Serialize, V: Serialize, S> Serialize for SerializedMap<K, V, S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        self.entries.serialize(serializer)
    }
}

/// Reads a sequence of entries and loads it with the default [`SyncOptions`].
impl<'de, K, V, S> Deserialize<'de> for SerializedMap<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq + Clone,
    V: Deserialize<'de> + Clone,
    S: BuildHasher + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<Entry<K, V>>::deserialize(deserializer)?;
        Ok(SerializedMap::from_entries(entries))
    }
}

#[cfg(test)]
impl<K: Hash + Eq + std::fmt::Debug, V: PartialEq + std::fmt::Debug, S: BuildHasher>
    SerializedMap<K, V, S>
{
    /// Asserts that the lookup table describes the entry list unless it is known to be stale.
    pub(crate) fn check(&self) {
        if !self.lookup.is_stale() {
            assert!(self.lookup.verify(&self.entries));
        }
    }

    /// Asserts that the table was loaded from the current entry list.
    pub(crate) fn check_loaded(&self) {
        self.check();
        if !self.options.retain_entries_after_load {
            assert!(self.entries.is_empty());
            return;
        }
        assert_eq!(self.lookup.len(), self.table.len());
        for (key, value) in &self.table {
            let first = self.entries.iter().find(|entry| entry.key == *key);
            assert_eq!(first.map(|entry| &entry.value), Some(value));
        }
    }
}

#[test]
fn test() {
    let mut map: SerializedMap<String, usize> = SerializedMap::new();
    map.add_serialized("adam".into(), 10).unwrap();
    map.add_serialized("eve".into(), 25).unwrap();
    map.add_serialized("mallory".into(), 8).unwrap();
    assert!(map.is_empty());
    map.load();
    assert_eq!(map.len(), 3);
    assert_eq!(map.get("eve"), Some(&25));
    map.entries_mut().push(Entry::new("adam".into(), 99));
    assert!(map.has_duplicates());
    assert_eq!(map.duplicate_positions(), [vec![0, 3]]);
    map.load();
    assert_eq!(map.get("adam"), Some(&10));
    dbg!(&map);
    map.check_loaded();
}
