use serde::{Deserialize, Serialize};

/// Environment variable that enables [`SyncOptions::final_build`].
pub const FINAL_BUILD_ENV: &str = "SERIALIZED_MAP_FINAL_BUILD";
/// Environment variable that disables [`SyncOptions::retain_entries_after_load`].
pub const STRIP_ENTRIES_ENV: &str = "SERIALIZED_MAP_STRIP_ENTRIES";

/// Controls how a [`SerializedMap`](crate::SerializedMap) synchronizes its entry list and table.
///
/// The defaults describe an interactive editing session: the entry list is kept around after
/// loading so tooling can show it, and duplicates are never deleted behind the user's back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Keep the entry list after [`load`](crate::SerializedMap::load).
    ///
    /// When `false`, loading moves the entries into the table and frees the list. The list is
    /// rebuilt from the table by [`prepare_for_persist`](crate::SerializedMap::prepare_for_persist).
    pub retain_entries_after_load: bool,
    /// The next persist produces a final artifact that nobody will edit again.
    ///
    /// When `true`, [`prepare_for_persist`](crate::SerializedMap::prepare_for_persist) removes
    /// duplicate entries, keeping the first occurrence of each key.
    pub final_build: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            retain_entries_after_load: true,
            final_build: false,
        }
    }
}

impl SyncOptions {
    /// Returns the default options overridden by [`FINAL_BUILD_ENV`] and [`STRIP_ENTRIES_ENV`].
    ///
    /// Both variables accept `1`, `true`, `yes`, `on` and `0`, `false`, `no`, `off`, ignoring
    /// case. Unset variables keep the default, unrecognized values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut options = SyncOptions::default();
        if let Some(final_build) = env_flag(FINAL_BUILD_ENV) {
            options.final_build = final_build;
        }
        if let Some(strip) = env_flag(STRIP_ENTRIES_ENV) {
            options.retain_entries_after_load = !strip;
        }
        options
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    let flag = parse_flag(&value);
    if flag.is_none() {
        log::warn!("ignoring {name}={value:?}, expected a boolean flag");
    }
    flag
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[test]
fn flags() {
    assert_eq!(parse_flag("1"), Some(true));
    assert_eq!(parse_flag(" TRUE "), Some(true));
    assert_eq!(parse_flag("On"), Some(true));
    assert_eq!(parse_flag("no"), Some(false));
    assert_eq!(parse_flag(""), Some(false));
    assert_eq!(parse_flag("maybe"), None);
}

#[test]
fn defaults_deserialize_from_empty_object() {
    let options: SyncOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(options, SyncOptions::default());
    let options: SyncOptions = serde_json::from_str(r#"{"final_build": true}"#).unwrap();
    assert!(options.final_build);
    assert!(options.retain_entries_after_load);
}
