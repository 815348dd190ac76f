use thiserror::Error;

/// Errors returned when editing the persisted entry list of a
/// [`SerializedMap`](crate::SerializedMap).
///
/// Both variants hand the rejected key back to the caller. A failed operation never modifies the
/// map.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SerializedMapError<K> {
    /// An entry with this key is already present in the list.
    #[error("an entry with key {key:?} already exists")]
    DuplicateKey {
        /// The rejected key.
        key: K,
    },
    /// No entry with this key is present in the list.
    #[error("no entry with key {key:?} exists")]
    KeyNotFound {
        /// The rejected key.
        key: K,
    },
}

impl<K> SerializedMapError<K> {
    /// Returns the key that caused the error.
    pub fn key(&self) -> &K {
        match self {
            SerializedMapError::DuplicateKey { key } | SerializedMapError::KeyNotFound { key } => {
                key
            }
        }
    }
    /// Returns the key that caused the error, consuming the error.
    pub fn into_key(self) -> K {
        match self {
            SerializedMapError::DuplicateKey { key } | SerializedMapError::KeyNotFound { key } => {
                key
            }
        }
    }
}
