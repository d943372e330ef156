#![forbid(unsafe_code)]

//! Widget identity and value types shared by messages and widget state.

use std::fmt;

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv_hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= *byte as u64;
        *hash = hash.wrapping_mul(FNV_PRIME);
    }
}

/// Kind of an interactive control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WidgetKind {
    Checkbox,
    TextInput,
    Radio,
    Slider,
    Button,
}

impl WidgetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkbox => "checkbox",
            Self::TextInput => "text_input",
            Self::Radio => "radio",
            Self::Slider => "slider",
            Self::Button => "button",
        }
    }

    /// Trigger widgets hold a value for exactly one run.
    #[must_use]
    pub const fn is_trigger(self) -> bool {
        matches!(self, Self::Button)
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of a widget across reruns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct WidgetId(String);

impl WidgetId {
    /// Derive the id of a widget from what the script declares.
    ///
    /// An explicit `key` is used verbatim (prefixed by the kind). Otherwise
    /// the kind and label are hashed, so the same declaration yields the same
    /// id on every run.
    #[must_use]
    pub fn derive(kind: WidgetKind, label: &str, key: Option<&str>) -> Self {
        if let Some(key) = key {
            return Self(format!("{}-{key}", kind.as_str()));
        }
        let mut hash = FNV_OFFSET_BASIS;
        fnv_hash_bytes(&mut hash, kind.as_str().as_bytes());
        fnv_hash_bytes(&mut hash, &[0]);
        fnv_hash_bytes(&mut hash, label.as_bytes());
        Self(format!("{}-{hash:016x}", kind.as_str()))
    }

    /// Wrap an id received from a client.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WidgetId {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

impl From<String> for WidgetId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Value held by a widget.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WidgetValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// One-run value of a trigger widget such as a button.
    Trigger(bool),
}

impl WidgetValue {
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        matches!(self, Self::Trigger(_))
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) | Self::Trigger(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for WidgetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) | Self::Trigger(v) => {
                f.write_str(if *v { "True" } else { "False" })
            }
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}
