//! Recipe documents: YAML text plus the `# @package` directive.
//!
//! A recipe is kept as an untyped YAML tree so overrides can be applied
//! before the typed view is taken. Expected format:
//!
//! ```yaml
//! # @package trainer
//!
//! _trainer_: lcm.train.lcm.trainer.prepare_lcm_trainer
//! model_arch: base_lcm_1_6B
//! output_dir: ??
//! ```

use crate::config::TrainingRunConfig;
use crate::error::{TrainingError, TrainingResult};
use crate::overrides::Override;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

const PACKAGE_MARKER: &str = "@package";

/// Read the `# @package <name>` directive from the leading comment block.
pub fn parse_package_directive(text: &str) -> Option<String> {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let comment = line.strip_prefix('#')?.trim();
        if let Some(rest) = comment.strip_prefix(PACKAGE_MARKER) {
            let package = rest.trim();
            if !package.is_empty() {
                return Some(package.to_string());
            }
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDocument {
    package: Option<String>,
    source: Option<PathBuf>,
    document: Value,
}

impl RecipeDocument {
    pub fn from_yaml_str(text: &str) -> TrainingResult<Self> {
        Self::parse(text, None)
    }

    pub fn load(path: impl AsRef<Path>) -> TrainingResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading recipe");
        Self::parse(&text, Some(path.to_path_buf()))
    }

    fn parse(text: &str, source: Option<PathBuf>) -> TrainingResult<Self> {
        let document: Value =
            serde_yaml::from_str(text).map_err(|e| TrainingError::Parse { path: source.clone(), source: e })?;
        if !document.is_mapping() {
            return Err(TrainingError::InvalidSpec("recipe root must be a mapping".to_string()));
        }
        Ok(Self { package: parse_package_directive(text), source, document })
    }

    /// Build a document from a typed value, e.g. a resolved config.
    pub fn from_typed<T: Serialize>(package: Option<String>, value: &T) -> TrainingResult<Self> {
        let document = serde_yaml::to_value(value)?;
        Ok(Self { package, source: None, document })
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Value {
        &mut self.document
    }

    /// Top-level key, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    pub fn apply_overrides(&mut self, overrides: &[Override]) -> TrainingResult<()> {
        for item in overrides {
            tracing::debug!(%item, "applying override");
            item.apply(&mut self.document)?;
        }
        Ok(())
    }

    /// Typed view of the document.
    pub fn parse_as<T: DeserializeOwned>(&self) -> TrainingResult<T> {
        serde_yaml::from_value(self.document.clone())
            .map_err(|e| TrainingError::Parse { path: self.source.clone(), source: e })
    }

    pub fn training_config(&self) -> TrainingResult<TrainingRunConfig> {
        self.parse_as()
    }

    /// Emit the document, directive header first.
    pub fn to_yaml_string(&self) -> TrainingResult<String> {
        let body = serde_yaml::to_string(&self.document)?;
        Ok(match &self.package {
            Some(package) => format!("# {PACKAGE_MARKER} {package}\n\n{body}"),
            None => body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_directive() {
        assert_eq!(parse_package_directive("# @package trainer\n\nlr: 0.1\n").as_deref(), Some("trainer"));
        assert_eq!(
            parse_package_directive("\n# Copyright header\n#   @package   prepare\nname: x\n").as_deref(),
            Some("prepare")
        );
        assert_eq!(parse_package_directive("lr: 0.1\n# @package trainer\n"), None);
        assert_eq!(parse_package_directive("# just a comment\nlr: 0.1\n"), None);
    }

    #[test]
    fn test_root_must_be_mapping() {
        let err = RecipeDocument::from_yaml_str("- a\n- b\n").unwrap_err();
        assert!(matches!(err, TrainingError::InvalidSpec(_)));
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let err = RecipeDocument::from_yaml_str("a: [1, 2\n").unwrap_err();
        assert!(matches!(err, TrainingError::Parse { path: None, .. }));
    }

    #[test]
    fn test_emit_keeps_directive() {
        let doc = RecipeDocument::from_yaml_str("# @package trainer\nseed: 1\n").unwrap();
        let text = doc.to_yaml_string().unwrap();
        assert!(text.starts_with("# @package trainer\n"));
        let back = RecipeDocument::from_yaml_str(&text).unwrap();
        assert_eq!(back, doc);
    }
}
