//! [LookupTable] records at which positions of an entry list each key occurs.
//!
//! The table never stores keys. Like the index table of an insertion ordered hash map, it only
//! stores positions into the entry list and rehashes keys from that list whenever it needs to
//! compare or move them. Every operation therefore takes the entry list as an argument, and the
//! caller is responsible for passing the same list the table was computed from.
//!
//! The table is derived state. It is only guaranteed to describe a list right after
//! [`recompute`](LookupTable::recompute), and editing the list by any other means than the
//! incremental [`push`](LookupTable::push) leaves it stale. Callers that hand out mutable access
//! to the list should call [`invalidate`](LookupTable::invalidate). Queries on a stale table may
//! return wrong counts, but [`remove_duplicates`](LookupTable::remove_duplicates) never depends
//! on the table being up to date.
use crate::{entry::Entry, DefaultBuildHasher};
use core::hash::Hash;
use hashbrown::hash_table::{self, HashTable};
use std::{borrow::Borrow, hash::BuildHasher};

/// All positions holding one key, in ascending order.
#[derive(Clone, Debug)]
struct Occurrences {
    first: usize,
    /// Empty unless the key is duplicated, so unique keys don't allocate.
    rest: Vec<usize>,
}

impl Occurrences {
    fn new(first: usize) -> Self {
        Occurrences {
            first,
            rest: Vec::new(),
        }
    }
    fn count(&self) -> usize {
        1 + self.rest.len()
    }
    fn contains(&self, position: usize) -> bool {
        position == self.first || self.rest.binary_search(&position).is_ok()
    }
    fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.first).chain(self.rest.iter().copied())
    }
}

/// Maps each key of an entry list to the positions it occupies.
#[derive(Clone)]
pub struct LookupTable<S = DefaultBuildHasher> {
    table: HashTable<Occurrences>,
    synced_len: usize,
    stale: bool,
    build_hasher: S,
}

impl<S: Default> Default for LookupTable<S> {
    fn default() -> Self {
        LookupTable::with_hasher(S::default())
    }
}

impl<S: Default> LookupTable<S> {
    /// Returns a table describing an empty entry list.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> std::fmt::Debug for LookupTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupTable")
            .field("table", &self.table)
            .field("synced_len", &self.synced_len)
            .field("stale", &self.stale)
            .finish_non_exhaustive()
    }
}

impl<S> LookupTable<S> {
    /// Returns a table describing an empty entry list, using the provided BuildHasher.
    ///
    /// The BuildHasher must agree with the one used by the owning map, otherwise lookups by
    /// borrowed keys may miss.
    pub fn with_hasher(build_hasher: S) -> Self {
        LookupTable {
            table: HashTable::new(),
            synced_len: 0,
            stale: false,
            build_hasher,
        }
    }
    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }
    /// Returns `true` if no key is recorded.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
    /// Returns `true` if the entry list was edited since the table was last computed.
    pub fn is_stale(&self) -> bool {
        self.stale
    }
    /// Marks the table as no longer describing its entry list.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }
    /// Resets the table so that it describes an empty entry list.
    pub fn clear(&mut self) {
        self.table.clear();
        self.synced_len = 0;
        self.stale = false;
    }
    /// Returns the positions of every key that occurs more than once, ordered by the position of
    /// its first occurrence.
    pub fn duplicates(&self) -> Vec<Vec<usize>> {
        let mut duplicates: Vec<&Occurrences> = self
            .table
            .iter()
            .filter(|occurrences| !occurrences.rest.is_empty())
            .collect();
        duplicates.sort_unstable_by_key(|occurrences| occurrences.first);
        duplicates
            .into_iter()
            .map(|occurrences| occurrences.positions().collect())
            .collect()
    }
}

impl<S: BuildHasher> LookupTable<S> {
    /// Rebuilds the table from scratch with a single scan over `entries`.
    pub fn recompute<K: Hash + Eq, V>(&mut self, entries: &[Entry<K, V>]) {
        let Self {
            table,
            build_hasher,
            ..
        } = self;
        table.clear();
        for (position, entry) in entries.iter().enumerate() {
            match table.entry(
                build_hasher.hash_one(&entry.key),
                |occurrences| entries[occurrences.first].key == entry.key,
                |occurrences| build_hasher.hash_one(&entries[occurrences.first].key),
            ) {
                hash_table::Entry::Occupied(mut occupied) => occupied.get_mut().rest.push(position),
                hash_table::Entry::Vacant(vacant) => {
                    vacant.insert(Occurrences::new(position));
                }
            }
        }
        self.synced_len = entries.len();
        self.stale = false;
        log::trace!(
            "recomputed lookup table for {} entries with {} distinct keys",
            entries.len(),
            self.table.len()
        );
    }

    /// Recomputes the table if it is known to be out of date for `entries`.
    ///
    /// This catches invalidation and length changes, but not in-place edits of keys made without
    /// calling [`invalidate`](Self::invalidate).
    pub fn refresh<K: Hash + Eq, V>(&mut self, entries: &[Entry<K, V>]) {
        if self.needs_recompute(entries) {
            self.recompute(entries);
        }
    }

    fn needs_recompute<K, V>(&self, entries: &[Entry<K, V>]) -> bool {
        self.stale || self.synced_len != entries.len()
    }

    /// Returns `true` if the table exactly describes `entries`.
    ///
    /// Every position must be recorded under its own key and the recorded positions must add up
    /// to the length of the list, so no position can be recorded twice or be out of range.
    pub(crate) fn verify<K: Hash + Eq, V>(&self, entries: &[Entry<K, V>]) -> bool {
        let recorded: usize = self.table.iter().map(Occurrences::count).sum();
        recorded == entries.len()
            && entries.iter().enumerate().all(|(position, entry)| {
                self.find(&entry.key, entries)
                    .is_some_and(|occurrences| occurrences.contains(position))
            })
    }

    fn find<Q, K, V>(&self, key: &Q, entries: &[Entry<K, V>]) -> Option<&Occurrences>
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.table.find(self.build_hasher.hash_one(key), |occurrences| {
            entries
                .get(occurrences.first)
                .is_some_and(|entry| entry.key.borrow() == key)
        })
    }

    /// Returns the number of entries with the specified key.
    pub fn count<Q, K, V>(&self, key: &Q, entries: &[Entry<K, V>]) -> usize
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.find(key, entries).map_or(0, Occurrences::count)
    }

    /// Returns the position of the first entry with the specified key, if it exists.
    pub fn first_position<Q, K, V>(&self, key: &Q, entries: &[Entry<K, V>]) -> Option<usize>
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.find(key, entries).map(|occurrences| occurrences.first)
    }

    /// Returns an iterator over the positions of all entries with the specified key, in list
    /// order.
    pub fn positions<'a, Q, K, V>(
        &'a self,
        key: &Q,
        entries: &[Entry<K, V>],
    ) -> impl Iterator<Item = usize> + 'a
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.find(key, entries)
            .into_iter()
            .flat_map(Occurrences::positions)
    }

    /// Records that the last entry of `entries` was just appended.
    ///
    /// A stale table stays stale, the next [`refresh`](Self::refresh) will pick up the new entry.
    pub fn push<K: Hash + Eq, V>(&mut self, entries: &[Entry<K, V>]) {
        if self.stale || self.synced_len + 1 != entries.len() {
            self.stale = true;
            return;
        }
        let position = entries.len() - 1;
        let key = &entries[position].key;
        let Self {
            table,
            build_hasher,
            ..
        } = self;
        match table.entry(
            build_hasher.hash_one(key),
            |occurrences| entries[occurrences.first].key == *key,
            |occurrences| build_hasher.hash_one(&entries[occurrences.first].key),
        ) {
            hash_table::Entry::Occupied(mut occupied) => occupied.get_mut().rest.push(position),
            hash_table::Entry::Vacant(vacant) => {
                vacant.insert(Occurrences::new(position));
            }
        }
        self.synced_len = entries.len();
    }

    /// Removes every entry whose key already occurred earlier in the list and returns the number
    /// of removed entries.
    ///
    /// The first occurrence of each key is kept and the relative order of the kept entries is
    /// preserved. The recorded positions are used when they still describe `entries` and
    /// recomputed otherwise, so the result never depends on the table being up to date. The
    /// table is consistent with `entries` afterwards.
    pub fn remove_duplicates<K: Hash + Eq, V>(&mut self, entries: &mut Vec<Entry<K, V>>) -> usize {
        if self.needs_recompute(entries) || !self.verify(entries) {
            self.recompute(entries);
        }

        let mut doomed = vec![false; entries.len()];
        let mut removed = 0;
        for occurrences in self.table.iter_mut() {
            removed += occurrences.rest.len();
            for position in occurrences.rest.drain(..) {
                doomed[position] = true;
            }
        }
        if removed == 0 {
            return 0;
        }

        let mut kept_before = Vec::with_capacity(doomed.len());
        let mut kept = 0;
        for &is_doomed in &doomed {
            kept_before.push(kept);
            kept += usize::from(!is_doomed);
        }

        let mut position = 0;
        entries.retain(|_| {
            let keep = !doomed[position];
            position += 1;
            keep
        });

        for occurrences in self.table.iter_mut() {
            occurrences.first = kept_before[occurrences.first];
        }
        self.synced_len = entries.len();

        removed
    }
}
