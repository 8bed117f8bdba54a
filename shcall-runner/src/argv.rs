//! Translation of call-style arguments into a GNU getopt-style argument vector.
//!
//! A call is made of positional values and keyword options. Keyword options
//! become flags and always precede the positionals:
//! - underscores in keys are replaced by dashes;
//! - a key that does not start with a dash gets one dash when it is a single
//!   character and two dashes otherwise;
//! - `false` drops the option, `true` emits the bare flag, any other value
//!   emits the flag followed by the value as a separate argument;
//! - reserved keys (see [`is_reserved`]) belong to process spawning and are
//!   never emitted.

use std::path::{Path, PathBuf};

/// Value attached to a keyword option.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptValue {
    /// `true` emits the bare flag, `false` drops the option entirely.
    Switch(bool),
    /// Emitted as a separate argument after the flag.
    Value(String),
}

impl From<bool> for OptValue {
    fn from(value: bool) -> Self {
        Self::Switch(value)
    }
}

impl From<&str> for OptValue {
    fn from(value: &str) -> Self {
        Self::Value(value.to_owned())
    }
}

impl From<String> for OptValue {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<&String> for OptValue {
    fn from(value: &String) -> Self {
        Self::Value(value.clone())
    }
}

impl From<&Path> for OptValue {
    fn from(value: &Path) -> Self {
        Self::Value(value.display().to_string())
    }
}

impl From<PathBuf> for OptValue {
    fn from(value: PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

macro_rules! opt_value_from_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for OptValue {
                fn from(value: $ty) -> Self {
                    Self::Value(value.to_string())
                }
            }
        )*
    };
}

opt_value_from_display!(char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// Keyword options in the order they were supplied.
///
/// Setting a key that is already present replaces its value in place, so a
/// merged map keeps the position of the first occurrence and the value of
/// the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: Vec<(String, OptValue)>,
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Merge `overlay` on top of `self`; overlay values win on collision.
    pub fn merged(&self, overlay: &OptionMap) -> OptionMap {
        let mut merged = self.clone();
        for (key, value) in overlay.iter() {
            merged.set(key, value.clone());
        }
        merged
    }
}

impl<K, V> FromIterator<(K, V)> for OptionMap
where
    K: Into<String>,
    V: Into<OptValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OptionMap::new();
        for (key, value) in iter {
            map.set(key, value);
        }
        map
    }
}

/// Whether `name` is reserved for process options rather than a flag.
///
/// Reserved names end in an underscore and are longer than two characters,
/// so `env_` and `__wrapped__` are reserved while `__` and `foo` are not.
pub fn is_reserved(name: &str) -> bool {
    name.ends_with('_') && name.chars().count() > 2
}

/// Translate a keyword into its flag spelling.
pub fn flag_name(key: &str) -> String {
    let key = key.replace('_', "-");
    if key.starts_with('-') {
        key
    } else if key.chars().count() == 1 {
        format!("-{key}")
    } else {
        format!("--{key}")
    }
}

/// Translate an attribute-style program or subcommand name.
pub fn program_name(name: &str) -> String {
    name.replace('_', "-")
}

/// Build the argument vector for `positionals` and `options`.
///
/// Flags come first, in option order, followed by the positionals.
pub fn translate(positionals: &[String], options: &OptionMap) -> Vec<String> {
    let mut argv = Vec::with_capacity(options.len() * 2 + positionals.len());
    for (key, value) in options.iter() {
        if is_reserved(key) {
            continue;
        }
        match value {
            OptValue::Switch(false) => {}
            OptValue::Switch(true) => argv.push(flag_name(key)),
            OptValue::Value(value) => {
                argv.push(flag_name(key));
                argv.push(value.clone());
            }
        }
    }
    argv.extend(positionals.iter().cloned());
    argv
}

/// Join an argument vector for display, the way it would be typed.
pub fn command_line(argv: &[String]) -> String {
    argv.join(" ")
}
