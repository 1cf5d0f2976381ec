use crate::error::{TrainingError, TrainingResult};
use crate::registry::{suggest, ModelFamily};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trainer construction callable named by a recipe's `_trainer_` key.
///
/// The external framework resolves these dotted paths dynamically; here they
/// are a closed set so a typo fails at load time instead of on the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainerEntryPoint {
    #[serde(rename = "lcm.train.lcm.trainer.prepare_lcm_trainer")]
    PrepareLcmTrainer,
    #[serde(rename = "lcm.train.two_tower_diffusion_lcm.trainer.prepare_two_tower_diffusion_lcm_trainer")]
    PrepareTwoTowerDiffusionLcmTrainer,
}

impl TrainerEntryPoint {
    pub const ALL: [Self; 2] = [Self::PrepareLcmTrainer, Self::PrepareTwoTowerDiffusionLcmTrainer];

    #[must_use]
    pub fn dotted_path(self) -> &'static str {
        match self {
            Self::PrepareLcmTrainer => "lcm.train.lcm.trainer.prepare_lcm_trainer",
            Self::PrepareTwoTowerDiffusionLcmTrainer => {
                "lcm.train.two_tower_diffusion_lcm.trainer.prepare_two_tower_diffusion_lcm_trainer"
            }
        }
    }

    /// Model family this trainer builds.
    #[must_use]
    pub fn family(self) -> ModelFamily {
        match self {
            Self::PrepareLcmTrainer => ModelFamily::BaseLcm,
            Self::PrepareTwoTowerDiffusionLcmTrainer => ModelFamily::TwoTowerDiffusion,
        }
    }
}

impl std::fmt::Display for TrainerEntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dotted_path())
    }
}

impl FromStr for TrainerEntryPoint {
    type Err = TrainingError;

    fn from_str(s: &str) -> TrainingResult<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|e| e.dotted_path() == s).ok_or_else(|| {
            TrainingError::UnknownReference {
                kind: "trainer entry point",
                name: s.to_string(),
                suggestion: suggest(s, Self::ALL.iter().map(|e| e.dotted_path())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_round_trips_through_dotted_path() {
        for entry in TrainerEntryPoint::ALL {
            assert_eq!(entry.dotted_path().parse::<TrainerEntryPoint>().unwrap(), entry);
            let yaml = serde_yaml::to_string(&entry).unwrap();
            assert_eq!(yaml.trim(), entry.dotted_path());
        }
    }

    #[test]
    fn test_entry_point_typo_suggests_closest() {
        let err = "lcm.train.lcm.trainer.prepare_lcm_trainr".parse::<TrainerEntryPoint>().unwrap_err();
        match err {
            TrainingError::UnknownReference { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("lcm.train.lcm.trainer.prepare_lcm_trainer"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_entry_point_rejected_by_serde() {
        let result: Result<TrainerEntryPoint, _> = serde_yaml::from_str("my.module.build_trainer");
        assert!(result.is_err());
    }
}
