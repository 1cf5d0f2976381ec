//! Learning-rate schedules.
//!
//! All schedules except `noop` ramp linearly from `start_lr` to `lr` over
//! `num_lr_warmup_steps`, then decay according to their kind until
//! `max_steps`.

use crate::config::TrainingRunConfig;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrSchedule {
    /// Constant `lr`, no warmup.
    Noop,
    /// Cosine annealing to `final_lr` at `max_steps`.
    Cosine,
    /// Inverse square root decay after warmup.
    Myle,
    /// Linear decay to `final_lr` at `max_steps`.
    Polynomial,
}

impl std::fmt::Display for LrSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Noop => "noop",
            Self::Cosine => "cosine",
            Self::Myle => "myle",
            Self::Polynomial => "polynomial",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LrScheduler {
    kind: LrSchedule,
    lr: f64,
    start_lr: f64,
    final_lr: f64,
    warmup_steps: u64,
    max_steps: u64,
}

impl LrScheduler {
    #[must_use]
    pub fn new(kind: LrSchedule, lr: f64, start_lr: f64, final_lr: f64, warmup_steps: u64, max_steps: u64) -> Self {
        Self { kind, lr, start_lr, final_lr, warmup_steps, max_steps }
    }

    #[must_use]
    pub fn from_config(config: &TrainingRunConfig) -> Self {
        Self::new(
            config.lr_schedule,
            config.lr,
            config.effective_start_lr(),
            config.effective_final_lr(),
            config.num_lr_warmup_steps,
            config.max_steps,
        )
    }

    /// Learning rate applied at `step` (0-based).
    #[must_use]
    pub fn lr_at(&self, step: u64) -> f64 {
        if self.kind == LrSchedule::Noop {
            return self.lr;
        }

        if step < self.warmup_steps {
            let progress = step as f64 / self.warmup_steps as f64;
            return self.start_lr + (self.lr - self.start_lr) * progress;
        }

        match self.kind {
            LrSchedule::Noop => self.lr,
            LrSchedule::Cosine => {
                let progress = self.decay_progress(step);
                let cosine = 0.5 * (1.0 + (PI * progress).cos());
                self.final_lr + (self.lr - self.final_lr) * cosine
            }
            LrSchedule::Polynomial => {
                let progress = self.decay_progress(step);
                self.final_lr + (self.lr - self.final_lr) * (1.0 - progress)
            }
            LrSchedule::Myle => {
                let warmup = self.warmup_steps.max(1) as f64;
                let step = step.max(1) as f64;
                self.lr * (warmup / step).sqrt().min(1.0)
            }
        }
    }

    /// Fraction of the decay phase completed at `step`, clamped to `[0, 1]`.
    fn decay_progress(&self, step: u64) -> f64 {
        let decay_steps = self.max_steps.saturating_sub(self.warmup_steps);
        if decay_steps == 0 {
            return 1.0;
        }
        let decay_step = step.saturating_sub(self.warmup_steps).min(decay_steps);
        decay_step as f64 / decay_steps as f64
    }

    /// `(step, lr)` pairs every `every` steps, always including step 0,
    /// the end of warmup and `max_steps`.
    #[must_use]
    pub fn sample(&self, every: u64) -> Vec<(u64, f64)> {
        let every = every.max(1);
        let mut steps: Vec<u64> = (0..=self.max_steps).step_by(usize::try_from(every).unwrap_or(usize::MAX)).collect();
        if self.warmup_steps <= self.max_steps {
            steps.push(self.warmup_steps);
        }
        steps.push(self.max_steps);
        steps.sort_unstable();
        steps.dedup();
        steps.into_iter().map(|step| (step, self.lr_at(step))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12_f64.max(b.abs() * 1e-9)
    }

    #[test]
    fn test_cosine_endpoints() {
        let scheduler = LrScheduler::new(LrSchedule::Cosine, 3e-4, 0.0, 3e-5, 10_000, 250_000);
        assert!(close(scheduler.lr_at(0), 0.0));
        assert!(close(scheduler.lr_at(5_000), 1.5e-4));
        assert!(close(scheduler.lr_at(10_000), 3e-4));
        assert!(close(scheduler.lr_at(130_000), (3e-4 + 3e-5) / 2.0));
        assert!(close(scheduler.lr_at(250_000), 3e-5));
        assert!(close(scheduler.lr_at(300_000), 3e-5));
    }

    #[test]
    fn test_cosine_is_monotonic_after_warmup() {
        let scheduler = LrScheduler::new(LrSchedule::Cosine, 1.0, 0.0, 0.0, 10, 100);
        let samples = scheduler.sample(1);
        for pair in samples.windows(2).filter(|w| w[0].0 >= 10) {
            assert!(pair[1].1 <= pair[0].1);
        }
    }

    #[test]
    fn test_polynomial_is_linear() {
        let scheduler = LrScheduler::new(LrSchedule::Polynomial, 1.0, 0.0, 0.0, 0, 100);
        assert!(close(scheduler.lr_at(0), 1.0));
        assert!(close(scheduler.lr_at(25), 0.75));
        assert!(close(scheduler.lr_at(100), 0.0));
    }

    #[test]
    fn test_myle_inverse_sqrt() {
        let scheduler = LrScheduler::new(LrSchedule::Myle, 1.0, 0.0, 0.0, 100, 10_000);
        assert!(close(scheduler.lr_at(100), 1.0));
        assert!(close(scheduler.lr_at(400), 0.5));
    }

    #[test]
    fn test_noop_is_constant() {
        let scheduler = LrScheduler::new(LrSchedule::Noop, 0.01, 0.0, 0.0, 100, 1000);
        assert!(close(scheduler.lr_at(0), 0.01));
        assert!(close(scheduler.lr_at(1000), 0.01));
    }

    #[test]
    fn test_sample_includes_landmarks() {
        let scheduler = LrScheduler::new(LrSchedule::Cosine, 1.0, 0.0, 0.0, 15, 95);
        let steps: Vec<u64> = scheduler.sample(50).into_iter().map(|(s, _)| s).collect();
        assert_eq!(steps, vec![0, 15, 50, 95]);
    }
}
