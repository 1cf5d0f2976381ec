//! Step cadence and checkpoint retention.

use crate::config::TrainingRunConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StepActions {
    pub validate: bool,
    pub checkpoint: bool,
    pub save_model: bool,
    pub publish_metrics: bool,
}

impl StepActions {
    #[must_use]
    pub fn any(&self) -> bool {
        self.validate || self.checkpoint || self.save_model || self.publish_metrics
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneAction {
    pub step: u64,
    /// The checkpoint goes but its consolidated model stays.
    pub keep_consolidated_model: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    /// Newest first.
    pub keep: Vec<u64>,
    pub prune: Vec<PruneAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CadencePlan {
    pub max_steps: u64,
    pub validate_every: u64,
    pub checkpoint_every: u64,
    pub save_model_every: u64,
    pub publish_metrics_every: u64,
    pub keep_last_n: u32,
    pub preserve_consolidated: bool,
}

fn fires(step: u64, every: u64) -> bool {
    every > 0 && step % every == 0
}

impl CadencePlan {
    #[must_use]
    pub fn from_config(config: &TrainingRunConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            validate_every: config.validate_every_n_steps,
            checkpoint_every: config.checkpoint_every_n_steps,
            save_model_every: config.save_model_every_n_steps,
            publish_metrics_every: config.publish_metrics_every_n_steps,
            keep_last_n: config.keep_last_n_checkpoints,
            preserve_consolidated: config.preserve_consolidated_models,
        }
    }

    /// What happens after optimizer step `step` (1-based). The last step
    /// always checkpoints and saves the model.
    #[must_use]
    pub fn actions_at(&self, step: u64) -> StepActions {
        if step == 0 || step > self.max_steps {
            return StepActions::default();
        }
        let last = step == self.max_steps;
        StepActions {
            validate: fires(step, self.validate_every),
            checkpoint: last || fires(step, self.checkpoint_every),
            save_model: last || fires(step, self.save_model_every),
            publish_metrics: fires(step, self.publish_metrics_every),
        }
    }

    /// Steps where at least one action fires, in order.
    pub fn events(&self) -> impl Iterator<Item = (u64, StepActions)> + '_ {
        (1..=self.max_steps).map(|step| (step, self.actions_at(step))).filter(|(_, actions)| actions.any())
    }

    #[must_use]
    pub fn checkpoint_count(&self) -> u64 {
        self.count_with_final(self.checkpoint_every)
    }

    #[must_use]
    pub fn model_save_count(&self) -> u64 {
        self.count_with_final(self.save_model_every)
    }

    #[must_use]
    pub fn validation_count(&self) -> u64 {
        if self.validate_every == 0 { 0 } else { self.max_steps / self.validate_every }
    }

    fn count_with_final(&self, every: u64) -> u64 {
        if every == 0 {
            return u64::from(self.max_steps > 0);
        }
        let regular = self.max_steps / every;
        if self.max_steps % every == 0 { regular } else { regular + 1 }
    }

    /// Decide which existing checkpoints to keep.
    ///
    /// The newest `keep_last_n` checkpoints are kept. A pruned checkpoint taken
    /// at a model-save step keeps its consolidated model when
    /// `preserve_consolidated` is set.
    #[must_use]
    pub fn plan_retention(&self, existing_steps: &[u64]) -> RetentionPlan {
        let mut steps = existing_steps.to_vec();
        steps.sort_unstable_by(|a, b| b.cmp(a));
        steps.dedup();

        let keep_n = usize::try_from(self.keep_last_n).unwrap_or(usize::MAX).min(steps.len());
        let prune = steps[keep_n..]
            .iter()
            .map(|&step| PruneAction {
                step,
                keep_consolidated_model: self.preserve_consolidated
                    && (fires(step, self.save_model_every) || step == self.max_steps),
            })
            .collect();
        steps.truncate(keep_n);

        RetentionPlan { keep: steps, prune }
    }
}
