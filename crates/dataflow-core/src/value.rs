//! Literal configuration values.
//!
//! [`ConfigValue`] is the tagged union carried by module configuration:
//! file selections, numeric parameters, option choices and plot picks.
//! Values are validated against their [`FieldDef`](crate::module::FieldDef)
//! at the registry boundary instead of flowing around as opaque JSON.
//!
//! Non-finite floats have no JSON representation, so they serialize to the
//! sentinel strings [`INF_STRING`], [`MINUS_INF_STRING`] and [`NAN_STRING`]
//! and deserialize back to floats. This keeps `inf` and `null` from
//! producing the same canonical text. A literal string that already spells
//! a sentinel, optionally behind [`SENTINEL_ESCAPE`] characters, gets one
//! more escape on the way out and loses it on the way in, so `"\u{221E}"`
//! and `f64::INFINITY` never share a signature.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use serde::{Deserialize, Deserializer};

/// JSON stand-in for positive infinity.
pub const INF_STRING: &str = "\u{221E}";
/// JSON stand-in for negative infinity.
pub const MINUS_INF_STRING: &str = "-\u{221E}";
/// JSON stand-in for NaN (WARNING SIGN).
pub const NAN_STRING: &str = "\u{26A0}";

/// Prefix that marks a literal string which would otherwise read as a
/// sentinel.
pub const SENTINEL_ESCAPE: char = '\\';

fn is_sentinel(s: &str) -> bool {
    matches!(s, INF_STRING | MINUS_INF_STRING | NAN_STRING)
}

/// True for `s` of the form `SENTINEL_ESCAPE* sentinel`.
fn needs_escape(s: &str) -> bool {
    is_sentinel(s.trim_start_matches(SENTINEL_ESCAPE))
}

/// A literal value assigned to a field or unwired input terminal.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Reads a `fileinfo` value: either one file record or a list of them.
    ///
    /// Returns `None` if any element is not a file record.
    pub fn file_infos(&self) -> Option<Vec<FileInfo>> {
        match self {
            ConfigValue::Map(_) => FileInfo::from_config(self).map(|f| vec![f]),
            ConfigValue::List(items) => items.iter().map(FileInfo::from_config).collect(),
            _ => None,
        }
    }

    /// Every well-formed file record in a `fileinfo` value, skipping
    /// elements that are not records.
    pub fn file_records(&self) -> Vec<FileInfo> {
        match self {
            ConfigValue::List(items) => items.iter().filter_map(FileInfo::from_config).collect(),
            other => FileInfo::from_config(other).into_iter().collect(),
        }
    }

    /// Rewrites the `mtime` of every file record in a `fileinfo` value.
    ///
    /// `lookup` returns the new modification time for a record, or `None`
    /// to leave it untouched. Returns the number of records rewritten.
    pub fn update_file_mtimes<F>(&mut self, mut lookup: F) -> usize
    where
        F: FnMut(&FileInfo) -> Option<i64>,
    {
        fn update_one<F: FnMut(&FileInfo) -> Option<i64>>(
            value: &mut ConfigValue,
            lookup: &mut F,
        ) -> usize {
            let Some(info) = FileInfo::from_config(value) else {
                return 0;
            };
            let ConfigValue::Map(map) = value else {
                return 0;
            };
            match lookup(&info) {
                Some(mtime) => {
                    map.insert("mtime".to_string(), ConfigValue::Int(mtime));
                    1
                }
                None => 0,
            }
        }

        match self {
            ConfigValue::List(items) => items
                .iter_mut()
                .map(|item| update_one(item, &mut lookup))
                .sum(),
            other => update_one(other, &mut lookup),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(v: Vec<T>) -> Self {
        ConfigValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<FileInfo> for ConfigValue {
    fn from(f: FileInfo) -> Self {
        f.to_config()
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Null => serializer.serialize_unit(),
            ConfigValue::Bool(b) => serializer.serialize_bool(*b),
            ConfigValue::Int(i) => serializer.serialize_i64(*i),
            ConfigValue::Float(f) if f.is_nan() => serializer.serialize_str(NAN_STRING),
            ConfigValue::Float(f) if *f == f64::INFINITY => serializer.serialize_str(INF_STRING),
            ConfigValue::Float(f) if *f == f64::NEG_INFINITY => {
                serializer.serialize_str(MINUS_INF_STRING)
            }
            ConfigValue::Float(f) => serializer.serialize_f64(*f),
            ConfigValue::Str(s) if needs_escape(s) => {
                serializer.serialize_str(&format!("{SENTINEL_ESCAPE}{s}"))
            }
            ConfigValue::Str(s) => serializer.serialize_str(s),
            ConfigValue::List(items) => serializer.collect_seq(items),
            ConfigValue::Map(map) => serializer.collect_map(map),
        }
    }
}

struct ConfigValueVisitor;

impl<'de> Visitor<'de> for ConfigValueVisitor {
    type Value = ConfigValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON configuration value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<ConfigValue, D::Error> {
        ConfigValue::deserialize(d)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ConfigValue, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => ConfigValue::Int(i),
            Err(_) => ConfigValue::Float(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ConfigValue, E> {
        Ok(match v {
            INF_STRING => ConfigValue::Float(f64::INFINITY),
            MINUS_INF_STRING => ConfigValue::Float(f64::NEG_INFINITY),
            NAN_STRING => ConfigValue::Float(f64::NAN),
            escaped if needs_escape(escaped) => {
                ConfigValue::Str(escaped[SENTINEL_ESCAPE.len_utf8()..].to_string())
            }
            other => ConfigValue::Str(other.to_string()),
        })
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ConfigValue, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(ConfigValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ConfigValue, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((key, value)) = access.next_entry::<String, ConfigValue>()? {
            map.insert(key, value);
        }
        Ok(ConfigValue::Map(map))
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ConfigValueVisitor)
    }
}

/// A file selection on the data server, as stored in `fileinfo` fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileInfo {
    /// Location of the file relative to its data source.
    pub path: String,
    /// Modification time (seconds since the epoch) recorded at selection.
    pub mtime: Option<i64>,
    /// Named data source; `None` means the server default.
    pub source: Option<String>,
    /// Entry names within a multi-entry file.
    pub entries: Option<Vec<String>>,
}

impl FileInfo {
    pub fn new(path: impl Into<String>, mtime: i64) -> Self {
        FileInfo {
            path: path.into(),
            mtime: Some(mtime),
            source: None,
            entries: None,
        }
    }

    /// Parses a file record; `path` must be a string.
    pub fn from_config(value: &ConfigValue) -> Option<FileInfo> {
        let map = value.as_map()?;
        let path = map.get("path")?.as_str()?.to_string();
        let mtime = match map.get("mtime") {
            Some(ConfigValue::Int(i)) => Some(*i),
            Some(ConfigValue::Float(f)) if f.is_finite() => Some(f.trunc() as i64),
            _ => None,
        };
        let source = map.get("source").and_then(ConfigValue::as_str).map(str::to_string);
        let entries = map.get("entries").and_then(ConfigValue::as_list).map(|items| {
            items
                .iter()
                .filter_map(ConfigValue::as_str)
                .map(str::to_string)
                .collect()
        });
        Some(FileInfo {
            path,
            mtime,
            source,
            entries,
        })
    }

    pub fn to_config(&self) -> ConfigValue {
        let mut map = BTreeMap::new();
        map.insert("path".to_string(), ConfigValue::Str(self.path.clone()));
        if let Some(mtime) = self.mtime {
            map.insert("mtime".to_string(), ConfigValue::Int(mtime));
        }
        if let Some(source) = &self.source {
            map.insert("source".to_string(), ConfigValue::Str(source.clone()));
        }
        if let Some(entries) = &self.entries {
            map.insert("entries".to_string(), entries.clone().into());
        }
        ConfigValue::Map(map)
    }
}
