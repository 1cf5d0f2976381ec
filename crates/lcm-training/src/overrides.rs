//! Command-line overrides applied to a recipe tree.
//!
//! Grammar:
//! - `path=value` replaces an existing key
//! - `+path=value` adds a key that must not exist yet
//! - `~path` deletes an existing key
//!
//! Paths are dot separated; all-digit segments index into sequences
//! (`training_data.0.name=wiki=train`). Values are read as YAML, so
//! `adam_betas=[0.9,0.98]` sets a pair and `use_fsdp=false` a bool.

use crate::error::{TrainingError, TrainingResult};
use serde_yaml::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(idx) => write!(f, "{idx}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverrideOp {
    Set(Value),
    Add(Value),
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    raw: String,
    path: Vec<PathSegment>,
    op: OverrideOp,
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_path(raw: &str, path: &str) -> TrainingResult<Vec<PathSegment>> {
    let path = path.trim();
    if path.is_empty() {
        return Err(override_error(raw, "empty key path"));
    }
    path.split('.')
        .map(|segment| {
            if segment.is_empty() {
                return Err(override_error(raw, "empty path segment"));
            }
            if segment.chars().all(|c| c.is_ascii_digit()) {
                let idx = segment.parse().map_err(|_| override_error(raw, "sequence index out of range"))?;
                return Ok(PathSegment::Index(idx));
            }
            Ok(PathSegment::Key(segment.to_string()))
        })
        .collect()
}

fn parse_value(raw: &str, text: &str) -> TrainingResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::String(String::new()));
    }
    serde_yaml::from_str(text).map_err(|e| override_error(raw, format!("value is not valid YAML: {e}")))
}

fn override_error(raw: &str, reason: impl Into<String>) -> TrainingError {
    TrainingError::Override { raw: raw.to_string(), reason: reason.into() }
}

impl FromStr for Override {
    type Err = TrainingError;

    fn from_str(s: &str) -> TrainingResult<Self> {
        let raw = s.trim();
        if let Some(path) = raw.strip_prefix('~') {
            if path.contains('=') {
                return Err(override_error(raw, "deletions take no value"));
            }
            return Ok(Self { raw: raw.to_string(), path: parse_path(raw, path)?, op: OverrideOp::Delete });
        }

        let (adding, body) = match raw.strip_prefix('+') {
            Some(body) => (true, body),
            None => (false, raw),
        };
        let (path, value) = body.split_once('=').ok_or_else(|| override_error(raw, "expected `key=value`"))?;
        let path = parse_path(raw, path)?;
        let value = parse_value(raw, value)?;
        let op = if adding { OverrideOp::Add(value) } else { OverrideOp::Set(value) };
        Ok(Self { raw: raw.to_string(), path, op })
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    match segment {
        PathSegment::Key(key) => node.as_mapping_mut()?.get_mut(key.as_str()),
        PathSegment::Index(idx) => node.as_sequence_mut()?.get_mut(*idx),
    }
}

impl Override {
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    pub fn op(&self) -> &OverrideOp {
        &self.op
    }

    /// Build a `path=value` override for a string value.
    pub fn set_string(path: &str, value: &str) -> TrainingResult<Self> {
        let raw = format!("{path}={value}");
        Ok(Self { path: parse_path(&raw, path)?, op: OverrideOp::Set(Value::String(value.to_string())), raw })
    }

    /// Build a `+path=value` override for a string value.
    pub fn add_string(path: &str, value: &str) -> TrainingResult<Self> {
        let raw = format!("+{path}={value}");
        Ok(Self { path: parse_path(&raw, path)?, op: OverrideOp::Add(Value::String(value.to_string())), raw })
    }

    pub fn apply(&self, root: &mut Value) -> TrainingResult<()> {
        let Some((last, parents)) = self.path.split_last() else {
            return Err(override_error(&self.raw, "empty key path"));
        };

        let mut node = root;
        for segment in parents {
            node = child_mut(node, segment)
                .ok_or_else(|| override_error(&self.raw, format!("no such key `{segment}`")))?;
        }

        match (&self.op, last) {
            (OverrideOp::Set(value), segment) => {
                let slot = child_mut(node, segment).ok_or_else(|| {
                    override_error(&self.raw, format!("no such key `{segment}`; use `+` to add a new key"))
                })?;
                *slot = value.clone();
            }
            (OverrideOp::Add(value), PathSegment::Key(key)) => {
                let mapping = node
                    .as_mapping_mut()
                    .ok_or_else(|| override_error(&self.raw, "parent is not a mapping"))?;
                if mapping.contains_key(key.as_str()) {
                    return Err(override_error(&self.raw, format!("key `{key}` already exists; drop the `+`")));
                }
                mapping.insert(Value::String(key.clone()), value.clone());
            }
            (OverrideOp::Add(value), PathSegment::Index(idx)) => {
                let sequence = node
                    .as_sequence_mut()
                    .ok_or_else(|| override_error(&self.raw, "parent is not a sequence"))?;
                if *idx != sequence.len() {
                    return Err(override_error(
                        &self.raw,
                        format!("can only append at index {}", sequence.len()),
                    ));
                }
                sequence.push(value.clone());
            }
            (OverrideOp::Delete, PathSegment::Key(key)) => {
                let removed = node.as_mapping_mut().and_then(|mapping| mapping.remove(key.as_str()));
                if removed.is_none() {
                    return Err(override_error(&self.raw, format!("no such key `{key}`")));
                }
            }
            (OverrideOp::Delete, PathSegment::Index(idx)) => {
                let sequence = node
                    .as_sequence_mut()
                    .filter(|sequence| *idx < sequence.len())
                    .ok_or_else(|| override_error(&self.raw, format!("no element at index {idx}")))?;
                sequence.remove(*idx);
            }
        }
        Ok(())
    }
}

/// Parse a list of override strings.
pub fn parse_overrides<S: AsRef<str>>(items: &[S]) -> TrainingResult<Vec<Override>> {
    items.iter().map(|item| item.as_ref().parse()).collect()
}
