use crate::cadence::CadencePlan;
use crate::config::TrainingRunConfig;
use crate::schedule::LrSchedule;
use serde::Serialize;

/// Derived figures of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub trainer: String,
    pub model_arch: String,
    pub criterion: String,
    pub world_size: u64,
    pub total_gpus: u64,
    /// Upper bound on tokens consumed by one optimizer step across all ranks.
    pub tokens_per_step: u64,
    pub total_tokens: u64,
    pub max_steps: u64,
    pub checkpoints: u64,
    pub model_saves: u64,
    pub validations: u64,
    pub lr_schedule: LrSchedule,
    pub peak_lr: f64,
    pub final_lr: f64,
    pub warmup_fraction: f64,
}

impl RunSummary {
    #[must_use]
    pub fn from_config(config: &TrainingRunConfig) -> Self {
        let world_size = config.requirements.world_size();
        let max_tokens = config.data_loading_config.max_tokens.unwrap_or(0);
        let tokens_per_step = max_tokens
            .saturating_mul(world_size)
            .saturating_mul(u64::from(config.gradient_accumulation));
        let cadence = CadencePlan::from_config(config);
        let warmup_fraction = if config.max_steps == 0 {
            0.0
        } else {
            (config.num_lr_warmup_steps.min(config.max_steps) as f64) / config.max_steps as f64
        };

        Self {
            trainer: config.trainer.to_string(),
            model_arch: config.model_arch.to_string(),
            criterion: config.criterion.name.to_string(),
            world_size,
            total_gpus: config.requirements.total_gpus(),
            tokens_per_step,
            total_tokens: tokens_per_step.saturating_mul(config.max_steps),
            max_steps: config.max_steps,
            checkpoints: cadence.checkpoint_count(),
            model_saves: cadence.model_save_count(),
            validations: cadence.validation_count(),
            lr_schedule: config.lr_schedule,
            peak_lr: config.lr,
            final_lr: config.effective_final_lr(),
            warmup_fraction,
        }
    }
}
