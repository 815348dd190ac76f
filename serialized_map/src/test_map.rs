#![allow(missing_docs)]
use crate::{Entry, SerializedMap, SerializedMapError, SyncOptions};
use indexmap::IndexMap;
use rand::{rngs::SmallRng, Rng, SeedableRng};

type Key = u8;
type Value = u32;

/// A [`SerializedMap`] checked against a plain list and a first-occurrence table built from it.
struct CheckedMap {
    dut: SerializedMap<Key, Value>,
    ref_entries: Vec<(Key, Value)>,
    ref_table: IndexMap<Key, Value>,
    ref_freed: bool,
}

impl CheckedMap {
    fn new(options: SyncOptions) -> Self {
        CheckedMap {
            dut: SerializedMap::with_options(options),
            ref_entries: Vec::new(),
            ref_table: IndexMap::new(),
            ref_freed: false,
        }
    }
    fn restore(&mut self) {
        if std::mem::take(&mut self.ref_freed) {
            let pending = std::mem::take(&mut self.ref_entries);
            self.ref_entries = self.ref_table.iter().map(|(&k, &v)| (k, v)).collect();
            self.ref_entries.extend(pending);
        }
    }
    fn add_serialized(&mut self, key: Key, value: Value) {
        self.restore();
        let dut_result = self.dut.add_serialized(key, value);
        if self.ref_entries.iter().any(|&(k, _)| k == key) {
            assert_eq!(dut_result, Err(SerializedMapError::DuplicateKey { key }));
        } else {
            assert_eq!(dut_result, Ok(()));
            self.ref_entries.push((key, value));
        }
    }
    fn remove_serialized(&mut self, key: Key) {
        self.restore();
        let len = self.ref_entries.len();
        self.ref_entries.retain(|&(k, _)| k != key);
        assert_eq!(self.dut.remove_serialized(&key), len - self.ref_entries.len());
    }
    fn set_serialized(&mut self, key: Key, value: Value) {
        self.restore();
        let dut_result = self.dut.set_serialized(key, value);
        match self.ref_entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => assert_eq!(dut_result, Ok(std::mem::replace(v, value))),
            None => assert_eq!(dut_result, Err(SerializedMapError::KeyNotFound { key })),
        }
    }
    fn push_raw(&mut self, key: Key, value: Value) {
        self.dut.entries_mut().push(Entry::new(key, value));
        self.ref_entries.push((key, value));
    }
    fn rekey_raw(&mut self, position: usize, key: Key) {
        if let Some(entry) = self.dut.entries_mut().get_mut(position) {
            entry.key = key;
            self.ref_entries[position].0 = key;
        }
    }
    fn load(&mut self) {
        self.dut.load();
        self.restore();
        self.ref_table.clear();
        for &(key, value) in &self.ref_entries {
            self.ref_table.entry(key).or_insert(value);
        }
        if !self.dut.options().retain_entries_after_load {
            self.ref_entries.clear();
            self.ref_freed = true;
        }
        assert!(Iterator::eq(self.ref_table.iter(), self.dut.iter()));
        self.dut.check_loaded();
    }
    fn prepare_for_persist(&mut self, final_build: bool) {
        self.dut.options_mut().final_build = final_build;
        self.dut.prepare_for_persist();
        self.restore();
        if final_build {
            let mut seen = IndexMap::new();
            self.ref_entries.retain(|&(key, _)| seen.insert(key, ()).is_none());
        }
    }
    fn has_duplicates(&mut self) {
        self.restore();
        let mut seen = IndexMap::new();
        let expected = !self
            .ref_entries
            .iter()
            .all(|&(key, _)| seen.insert(key, ()).is_none());
        assert_eq!(self.dut.has_duplicates(), expected);
    }
    fn check(&mut self) {
        self.dut.check();
        assert!(Iterator::eq(
            self.ref_entries.iter().copied(),
            self.dut.entries().iter().map(|entry| (entry.key, entry.value))
        ));
    }
    fn random_step(&mut self, rng: &mut SmallRng) {
        let key = rng.gen_range(0..24);
        let value = rng.gen();
        match rng.gen_range(0..100) {
            0..=29 => self.add_serialized(key, value),
            30..=39 => self.remove_serialized(key),
            40..=54 => self.set_serialized(key, value),
            55..=69 => self.push_raw(key, value),
            70..=74 => {
                let position = rng.gen_range(0..self.ref_entries.len().max(1));
                self.rekey_raw(position, key)
            }
            75..=84 => self.load(),
            85..=94 => self.prepare_for_persist(rng.gen_bool(0.3)),
            _ => self.has_duplicates(),
        }
        self.check();
    }
}

fn random_run(options: SyncOptions, seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut map = CheckedMap::new(options);
    for _ in 0..2000 {
        map.random_step(&mut rng);
    }
    map.load();
}

#[test]
fn random_interactive() {
    for seed in 0..8 {
        random_run(SyncOptions::default(), seed);
    }
}

#[test]
fn random_final_build() {
    let options = SyncOptions {
        final_build: true,
        ..SyncOptions::default()
    };
    for seed in 100..108 {
        random_run(options, seed);
    }
}

#[test]
fn random_stripped() {
    let options = SyncOptions {
        retain_entries_after_load: false,
        ..SyncOptions::default()
    };
    for seed in 200..208 {
        random_run(options, seed);
    }
}

#[test]
fn remove_duplicates_idempotent() {
    let mut rng = SmallRng::seed_from_u64(7);
    for _ in 0..50 {
        let len = rng.gen_range(0..64);
        let list: Vec<Entry<Key, Value>> = (0..len)
            .map(|_| Entry::new(rng.gen_range(0..16), rng.gen()))
            .collect();

        let mut map = SerializedMap::<Key, Value>::from_entries(list.clone());
        map.options_mut().final_build = true;
        map.prepare_for_persist();
        let once = map.entries().to_vec();
        map.prepare_for_persist();
        assert_eq!(map.entries(), &once[..]);

        let mut seen = IndexMap::new();
        let expected: Vec<_> = list
            .into_iter()
            .filter(|entry| seen.insert(entry.key, ()).is_none())
            .collect();
        assert_eq!(once, expected);
        assert!(!map.has_duplicates());
    }
}
