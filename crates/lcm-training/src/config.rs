//! Typed view of a training recipe.

use crate::dataset::{DataLoadingConfig, DatasetRef};
use crate::grouped;
use crate::missing::MaybeMissing;
use crate::requirements::Requirements;
use crate::schedule::LrSchedule;
use crate::trainer::TrainerEntryPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Architecture name, resolved against [`crate::Registries`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelArch(pub String);

impl std::fmt::Display for ModelArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Criterion name, resolved against [`crate::Registries`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriterionName(pub String);

impl std::fmt::Display for CriterionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    #[default]
    Sum,
    Mean,
    #[serde(rename = "none")]
    Unreduced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionConfig {
    pub name: CriterionName,
    #[serde(default)]
    pub reduction: Reduction,
    #[serde(default)]
    pub compute_rmse: bool,
}

/// Tensor precision, stored in recipes as the framework's dtype literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dtype {
    #[serde(rename = "torch.float16")]
    Float16,
    #[serde(rename = "torch.bfloat16")]
    BFloat16,
    #[serde(rename = "torch.float32")]
    Float32,
}

impl Dtype {
    #[must_use]
    pub fn is_half(self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float16 => "torch.float16",
            Self::BFloat16 => "torch.bfloat16",
            Self::Float32 => "torch.float32",
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn default_gradient_accumulation() -> u32 {
    1
}

/// A training run configuration.
///
/// Field order follows the checked-in recipes so re-emitted documents read
/// the same way. Keys this type does not know are kept in `extra` and
/// emitted after the known ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunConfig {
    #[serde(rename = "_trainer_")]
    pub trainer: TrainerEntryPoint,
    pub requirements: Requirements,
    pub model_arch: ModelArch,
    pub criterion: CriterionConfig,
    #[serde(default)]
    pub output_dir: MaybeMissing<PathBuf>,

    pub dtype: Dtype,
    #[serde(default)]
    pub use_optimizer_in_fp32: bool,
    #[serde(default)]
    pub use_fsdp: bool,
    #[serde(default)]
    pub fsdp_fp32_reduce: bool,

    #[serde(deserialize_with = "grouped::deserialize_f64")]
    pub lr: f64,
    #[serde(default, deserialize_with = "grouped::deserialize_option_f64", skip_serializing_if = "Option::is_none")]
    pub start_lr: Option<f64>,
    #[serde(default, deserialize_with = "grouped::deserialize_option_f64", skip_serializing_if = "Option::is_none")]
    pub final_lr: Option<f64>,
    pub lr_schedule: LrSchedule,
    #[serde(default, deserialize_with = "grouped::deserialize")]
    pub num_lr_warmup_steps: u64,
    #[serde(deserialize_with = "grouped::deserialize")]
    pub max_steps: u64,
    #[serde(default = "default_gradient_accumulation", deserialize_with = "grouped::deserialize")]
    pub gradient_accumulation: u32,
    #[serde(deserialize_with = "grouped::deserialize_f64")]
    pub max_grad_norm: f64,
    #[serde(default, deserialize_with = "grouped::deserialize_f64")]
    pub weight_decay: f64,
    #[serde(deserialize_with = "grouped::deserialize_f64_pair")]
    pub adam_betas: (f64, f64),
    #[serde(deserialize_with = "grouped::deserialize_f64")]
    pub adam_eps: f64,

    #[serde(deserialize_with = "grouped::deserialize")]
    pub validate_every_n_steps: u64,
    #[serde(deserialize_with = "grouped::deserialize")]
    pub save_model_every_n_steps: u64,
    #[serde(deserialize_with = "grouped::deserialize")]
    pub checkpoint_every_n_steps: u64,
    #[serde(default, deserialize_with = "grouped::deserialize")]
    pub keep_last_n_checkpoints: u32,
    #[serde(default)]
    pub preserve_consolidated_models: bool,
    #[serde(deserialize_with = "grouped::deserialize")]
    pub publish_metrics_every_n_steps: u64,

    #[serde(default, deserialize_with = "grouped::deserialize")]
    pub seed: u64,
    #[serde(default)]
    pub profile: bool,

    pub data_loading_config: DataLoadingConfig,
    #[serde(default)]
    pub validation_data_loading_config: DataLoadingConfig,

    pub training_data: Vec<DatasetRef>,
    pub validation_data: Vec<DatasetRef>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl TrainingRunConfig {
    /// Output directory, or [`crate::TrainingError::MissingValue`] while it is still `??`.
    pub fn output_dir(&self) -> crate::TrainingResult<&PathBuf> {
        self.output_dir.require_path("output_dir")
    }

    /// Learning rate at the start of warmup.
    #[must_use]
    pub fn effective_start_lr(&self) -> f64 {
        self.start_lr.unwrap_or(0.0)
    }

    /// Learning rate reached at `max_steps`.
    #[must_use]
    pub fn effective_final_lr(&self) -> f64 {
        self.final_lr.unwrap_or_else(|| match self.lr_schedule {
            LrSchedule::Cosine => self.lr * 0.1,
            LrSchedule::Noop => self.lr,
            LrSchedule::Myle | LrSchedule::Polynomial => 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_lr_defaults_per_schedule() {
        let recipe = crate::RecipeDocument::from_yaml_str(include_str!("../../../recipes/train/pretrain/mse.yaml")).unwrap();
        let mut config = recipe.training_config().unwrap();
        config.final_lr = None;
        let lr = config.lr;

        config.lr_schedule = LrSchedule::Cosine;
        assert!((config.effective_final_lr() - lr * 0.1).abs() < 1e-15);
        config.lr_schedule = LrSchedule::Noop;
        assert!((config.effective_final_lr() - lr).abs() < 1e-15);
        for schedule in [LrSchedule::Myle, LrSchedule::Polynomial] {
            config.lr_schedule = schedule;
            assert!(config.effective_final_lr().abs() < 1e-15);
        }

        config.final_lr = Some(1e-5);
        assert!((config.effective_final_lr() - 1e-5).abs() < 1e-15);
    }

    #[test]
    fn test_dtype_literals() {
        let dtype: Dtype = serde_yaml::from_str("\"torch.float16\"").unwrap();
        assert_eq!(dtype, Dtype::Float16);
        assert!(dtype.is_half());
        assert!(serde_yaml::from_str::<Dtype>("float16").is_err());
        assert_eq!(Dtype::BFloat16.to_string(), "torch.bfloat16");
    }

    #[test]
    fn test_reduction_names() {
        let reduction: Reduction = serde_yaml::from_str("none").unwrap();
        assert_eq!(reduction, Reduction::Unreduced);
        assert_eq!(serde_yaml::to_string(&Reduction::Sum).unwrap().trim(), "sum");
    }

    #[test]
    fn test_criterion_defaults() {
        let criterion: CriterionConfig = serde_yaml::from_str("name: next_sentence_mse\n").unwrap();
        assert_eq!(criterion.name, CriterionName("next_sentence_mse".to_string()));
        assert_eq!(criterion.reduction, Reduction::Sum);
        assert!(!criterion.compute_rmse);
    }
}
