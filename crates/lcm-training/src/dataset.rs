use crate::error::{TrainingError, TrainingResult};
use crate::grouped;
use serde::{Deserialize, Serialize};

/// One entry of `training_data` / `validation_data`.
///
/// List order is the order the trainer concatenates and iterates datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Dataset card name, optionally with a `=split` suffix (`pretraining_data=train`).
    pub name: String,
    /// Text appended after each document, e.g. `End of text.`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_suffix_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_prefix_text: Option<String>,
}

impl DatasetRef {
    #[must_use]
    pub fn new(name: impl Into<String>, source_suffix_text: impl Into<String>) -> Self {
        Self { name: name.into(), source_suffix_text: Some(source_suffix_text.into()), source_prefix_text: None }
    }

    /// Card name without the split suffix.
    #[must_use]
    pub fn card(&self) -> &str {
        self.name.split_once('=').map_or(self.name.as_str(), |(card, _)| card)
    }

    /// Split named after `=`, if any.
    #[must_use]
    pub fn split(&self) -> Option<&str> {
        self.name.split_once('=').map(|(_, split)| split)
    }
}

/// Validate a dataset list: non-empty, every name non-blank.
pub fn validate_datasets(field: &str, datasets: &[DatasetRef]) -> TrainingResult<()> {
    if datasets.is_empty() {
        return Err(TrainingError::invalid(field, "must list at least one dataset"));
    }
    for (idx, dataset) in datasets.iter().enumerate() {
        if dataset.name.trim().is_empty() {
            return Err(TrainingError::invalid(&format!("{field}[{idx}].name"), "must not be empty"));
        }
        if dataset.split().is_some_and(|split| split.trim().is_empty()) {
            return Err(TrainingError::invalid(&format!("{field}[{idx}].name"), "has an empty split after `=`"));
        }
    }
    Ok(())
}

/// Batching and loading knobs for one data split.
///
/// Every key is optional so the validation block can set only
/// `len_to_wrap_long_seq`; unset keys are omitted on emit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLoadingConfig {
    /// Token budget of one batch on one rank.
    #[serde(default, deserialize_with = "grouped::deserialize_option", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, deserialize_with = "grouped::deserialize_option", skip_serializing_if = "Option::is_none")]
    pub min_batch_size: Option<u32>,
    #[serde(default, deserialize_with = "grouped::deserialize_option", skip_serializing_if = "Option::is_none")]
    pub max_batch_size: Option<u32>,
    /// Documents longer than this many sentences are wrapped into several sequences.
    #[serde(default, deserialize_with = "grouped::deserialize_option", skip_serializing_if = "Option::is_none")]
    pub len_to_wrap_long_seq: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packing: Option<bool>,
    #[serde(default, deserialize_with = "grouped::deserialize_option", skip_serializing_if = "Option::is_none")]
    pub min_length_of_sequences: Option<u32>,
    #[serde(default, deserialize_with = "grouped::deserialize_option", skip_serializing_if = "Option::is_none")]
    pub min_length_of_sequences_after_batching: Option<u32>,
    #[serde(default, deserialize_with = "grouped::deserialize_option", skip_serializing_if = "Option::is_none")]
    pub num_parallel_calls: Option<u32>,
    #[serde(default, deserialize_with = "grouped::deserialize_option", skip_serializing_if = "Option::is_none")]
    pub nb_prefetch: Option<u32>,
    #[serde(default, deserialize_with = "grouped::deserialize_option", skip_serializing_if = "Option::is_none")]
    pub nb_epochs: Option<u32>,
}

impl DataLoadingConfig {
    pub fn validate(&self, field: &str) -> TrainingResult<()> {
        if self.max_tokens == Some(0) {
            return Err(TrainingError::invalid(&format!("{field}.max_tokens"), "must be >= 1"));
        }
        if self.len_to_wrap_long_seq == Some(0) {
            return Err(TrainingError::invalid(&format!("{field}.len_to_wrap_long_seq"), "must be >= 1"));
        }
        if self.max_batch_size == Some(0) {
            return Err(TrainingError::invalid(&format!("{field}.max_batch_size"), "must be >= 1"));
        }
        if let (Some(min), Some(max)) = (self.min_batch_size, self.max_batch_size) {
            if min > max {
                return Err(TrainingError::invalid(
                    &format!("{field}.min_batch_size"),
                    format!("({min}) must not exceed max_batch_size ({max})"),
                ));
            }
        }
        if self.num_parallel_calls == Some(0) {
            return Err(TrainingError::invalid(&format!("{field}.num_parallel_calls"), "must be >= 1"));
        }
        if self.nb_epochs == Some(0) {
            return Err(TrainingError::invalid(&format!("{field}.nb_epochs"), "must be >= 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_and_split() {
        let dataset = DatasetRef::new("pretraining_data=train", "End of text.");
        assert_eq!(dataset.card(), "pretraining_data");
        assert_eq!(dataset.split(), Some("train"));

        let plain = DatasetRef::new("wiki_en", "End of text.");
        assert_eq!(plain.card(), "wiki_en");
        assert_eq!(plain.split(), None);
    }

    #[test]
    fn test_validate_datasets_rejects_empty_list_and_names() {
        assert!(validate_datasets("training_data", &[]).is_err());
        assert!(validate_datasets("training_data", &[DatasetRef::new("  ", "x")]).is_err());
        assert!(validate_datasets("training_data", &[DatasetRef::new("data=", "x")]).is_err());
        assert!(validate_datasets("training_data", &[DatasetRef::new("data=train", "x")]).is_ok());
    }

    #[test]
    fn test_data_loading_batch_bounds() {
        let config = DataLoadingConfig { min_batch_size: Some(64), max_batch_size: Some(8), ..Default::default() };
        let err = config.validate("data_loading_config").unwrap_err();
        assert!(err.to_string().contains("data_loading_config.min_batch_size"));
    }

    #[test]
    fn test_validation_block_only_wrap_length() {
        let config: DataLoadingConfig = serde_yaml::from_str("len_to_wrap_long_seq: 128\n").unwrap();
        assert_eq!(config.len_to_wrap_long_seq, Some(128));
        assert!(config.max_tokens.is_none());
        assert_eq!(serde_yaml::to_string(&config).unwrap().trim(), "len_to_wrap_long_seq: 128");
    }
}
