//! [SerializedMap] is a key-value map that persists itself as an ordered list of [Entry] records.
//!
//! Serialization formats that only know about sequences of fields can't express a map's
//! uniqueness invariant, so the persisted form is a plain `Vec<Entry<K, V>>`. That list may carry
//! duplicate keys, e.g. after a merge conflict or a manual edit of a saved file. The map keeps two
//! views in sync:
//!
//! * the entry list, which is what gets persisted and what external tooling edits, and
//! * a key-value table built from that list by [`SerializedMap::load`], which is what ordinary
//!   lookups see.
//!
//! Duplicates are resolved by keeping the first occurrence in list order. During interactive
//! editing they stay in the list so they can be shown and fixed, and only a final build
//! ([`SyncOptions::final_build`]) removes them for good in [`SerializedMap::prepare_for_persist`].
//!
//! A [`LookupTable`] records where every key occurs in the list so that duplicate detection and
//! removal don't need quadratic scans. It is derived state and can be rebuilt from the list at
//! any time.
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

mod error;
mod options;

pub mod entry;
pub mod lookup_table;
pub mod serialized_map;

#[cfg(test)]
mod test_map;

pub use entry::Entry;
pub use error::SerializedMapError;
pub use lookup_table::LookupTable;
pub use options::{SyncOptions, FINAL_BUILD_ENV, STRIP_ENTRIES_ENV};
pub use serialized_map::SerializedMap;

/// The `BuildHasher` used when none is specified.
pub type DefaultBuildHasher = std::hash::BuildHasherDefault<zwohash::ZwoHasher>;
