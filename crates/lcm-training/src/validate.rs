//! Recipe validation.
//!
//! Hard violations fail fast with the first offending field. Suspicious but
//! legal combinations are collected as warnings and logged.

use crate::config::TrainingRunConfig;
use crate::dataset::validate_datasets;
use crate::error::{TrainingError, TrainingResult};
use crate::registry::{ModelFamily, Registries};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn positive(field: &str, value: u64) -> TrainingResult<()> {
    if value == 0 {
        return Err(TrainingError::invalid(field, "must be a positive integer"));
    }
    Ok(())
}

fn finite_at_least(field: &str, value: f64, min: f64, inclusive: bool) -> TrainingResult<()> {
    let ok = value.is_finite() && if inclusive { value >= min } else { value > min };
    if !ok {
        let op = if inclusive { ">=" } else { ">" };
        return Err(TrainingError::invalid(field, format!("must be finite and {op} {min} (got {value})")));
    }
    Ok(())
}

impl TrainingRunConfig {
    /// Check every invariant except `output_dir`, which is only required at
    /// resolution time.
    pub fn validate(&self, registries: &Registries) -> TrainingResult<ValidationReport> {
        let mut report = ValidationReport::default();

        let family = self.trainer.family();
        let arch = registries.resolve_arch(&self.model_arch.0)?;
        ensure_family("model_arch", &self.model_arch.0, arch.family, family)?;
        let criterion_family = registries.resolve_criterion(&self.criterion.name.0)?;
        ensure_family("criterion.name", &self.criterion.name.0, criterion_family, family)?;

        positive("validate_every_n_steps", self.validate_every_n_steps)?;
        positive("save_model_every_n_steps", self.save_model_every_n_steps)?;
        positive("checkpoint_every_n_steps", self.checkpoint_every_n_steps)?;
        positive("publish_metrics_every_n_steps", self.publish_metrics_every_n_steps)?;
        positive("max_steps", self.max_steps)?;
        positive("gradient_accumulation", u64::from(self.gradient_accumulation))?;

        finite_at_least("lr", self.lr, 0.0, false)?;
        if let Some(start_lr) = self.start_lr {
            finite_at_least("start_lr", start_lr, 0.0, true)?;
        }
        if let Some(final_lr) = self.final_lr {
            finite_at_least("final_lr", final_lr, 0.0, true)?;
        }
        finite_at_least("adam_eps", self.adam_eps, 0.0, false)?;
        finite_at_least("weight_decay", self.weight_decay, 0.0, true)?;
        finite_at_least("max_grad_norm", self.max_grad_norm, 0.0, false)?;
        for (idx, beta) in [self.adam_betas.0, self.adam_betas.1].into_iter().enumerate() {
            if !(0.0..1.0).contains(&beta) {
                return Err(TrainingError::invalid(&format!("adam_betas[{idx}]"), format!("must be in [0, 1) (got {beta})")));
            }
        }

        self.requirements.validate()?;

        if self.data_loading_config.max_tokens.is_none() {
            return Err(TrainingError::MissingValue("data_loading_config.max_tokens".to_string()));
        }
        self.data_loading_config.validate("data_loading_config")?;
        self.validation_data_loading_config.validate("validation_data_loading_config")?;

        validate_datasets("training_data", &self.training_data)?;
        validate_datasets("validation_data", &self.validation_data)?;

        if self.num_lr_warmup_steps >= self.max_steps {
            report.warn(format!(
                "num_lr_warmup_steps ({}) >= max_steps ({}); the run never leaves warmup",
                self.num_lr_warmup_steps, self.max_steps
            ));
        }
        if self.fsdp_fp32_reduce && !self.use_fsdp {
            report.warn("fsdp_fp32_reduce has no effect without use_fsdp".to_string());
        }
        if self.save_model_every_n_steps % self.checkpoint_every_n_steps != 0 {
            report.warn(format!(
                "save_model_every_n_steps ({}) is not a multiple of checkpoint_every_n_steps ({})",
                self.save_model_every_n_steps, self.checkpoint_every_n_steps
            ));
        }
        let req = &self.requirements;
        if req.gpus_per_node > 0 && req.gpus_per_node != req.tasks_per_node {
            report.warn(format!(
                "requirements.gpus_per_node ({}) differs from tasks_per_node ({}); ranks will not map one-to-one onto GPUs",
                req.gpus_per_node, req.tasks_per_node
            ));
        }
        if req.gpus_per_node == 0 && self.dtype.is_half() {
            report.warn(format!("dtype {} requested without any GPU", self.dtype));
        }
        if self.keep_last_n_checkpoints == 0 && !self.preserve_consolidated_models {
            report.warn("keep_last_n_checkpoints is 0 and preserve_consolidated_models is false; nothing is retained".to_string());
        }
        for key in self.extra.keys() {
            report.warn(format!("unrecognized key `{key}` is passed through unvalidated"));
        }

        Ok(report)
    }
}

fn ensure_family(field: &str, name: &str, found: ModelFamily, expected: ModelFamily) -> TrainingResult<()> {
    if found != expected {
        return Err(TrainingError::invalid(
            field,
            format!("`{name}` belongs to the {found} family but the trainer builds {expected} models"),
        ));
    }
    Ok(())
}
