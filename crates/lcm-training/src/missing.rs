//! Required-but-unset values.
//!
//! A recipe marks a value the launching job must provide with the `??`
//! placeholder (`output_dir: ??`). OmegaConf's `???` spelling and an explicit
//! `null` are read the same way, as is a blank string. Unset values are
//! emitted back as `??`.

use crate::error::{TrainingError, TrainingResult};
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

/// Placeholder written for an unset value.
pub const MISSING_SENTINEL: &str = "??";

const ACCEPTED_SENTINELS: &[&str] = &["??", "???"];

/// Whether a raw YAML node is the unset placeholder.
pub fn is_missing(value: &serde_yaml::Value) -> bool {
    match value {
        serde_yaml::Value::Null => true,
        serde_yaml::Value::String(s) => s.trim().is_empty() || ACCEPTED_SENTINELS.contains(&s.trim()),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MaybeMissing<T> {
    #[default]
    Missing,
    Set(T),
}

impl<T> MaybeMissing<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Self::Missing => None,
            Self::Set(value) => Some(value),
        }
    }

    /// Borrow the value, failing with [`TrainingError::MissingValue`] naming `field`.
    pub fn require(&self, field: &str) -> TrainingResult<&T> {
        self.as_option().ok_or_else(|| TrainingError::MissingValue(field.to_string()))
    }
}

impl MaybeMissing<PathBuf> {
    /// Like [`MaybeMissing::require`], but an empty path also counts as unset.
    pub fn require_path(&self, field: &str) -> TrainingResult<&PathBuf> {
        match self.require(field)? {
            path if path.as_os_str().is_empty() => Err(TrainingError::MissingValue(field.to_string())),
            path => Ok(path),
        }
    }
}

impl<T> From<Option<T>> for MaybeMissing<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Self::Set)
    }
}

impl<T: Serialize> Serialize for MaybeMissing<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Missing => serializer.serialize_str(MISSING_SENTINEL),
            Self::Set(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for MaybeMissing<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        if is_missing(&raw) {
            return Ok(Self::Missing);
        }
        serde_yaml::from_value(raw).map(Self::Set).map_err(D::Error::custom)
    }
}
