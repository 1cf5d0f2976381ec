//! Name registries for model architectures and training criteria.
//!
//! Recipes refer to both by symbolic name (`model_arch: base_lcm_1_6B`,
//! `criterion.name: next_sentence_mse`). Only names and their model family
//! are tracked; the architectures themselves live in the training framework.

use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strsim::levenshtein;

/// Minimum normalized similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    BaseLcm,
    TwoTowerDiffusion,
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BaseLcm => f.write_str("base_lcm"),
            Self::TwoTowerDiffusion => f.write_str("two_tower_diffusion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchEntry {
    pub family: ModelFamily,
    pub description: String,
}

/// Closest candidate to `name` by normalized Levenshtein similarity.
pub fn suggest<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let max_len = candidate.len().max(name.len());
            if max_len == 0 {
                return None;
            }
            let similarity = 1.0 - (levenshtein(name, candidate) as f64 / max_len as f64);
            (similarity >= SUGGESTION_THRESHOLD).then_some((similarity, candidate))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

#[derive(Debug, Clone)]
pub struct Registries {
    archs: BTreeMap<String, ArchEntry>,
    criteria: BTreeMap<String, ModelFamily>,
}

impl Default for Registries {
    fn default() -> Self {
        let mut registries = Self::empty();
        registries.register_arch("base_lcm_1_6B", ModelFamily::BaseLcm, "1.6B parameter base LCM");
        registries.register_arch("toy_base_lcm", ModelFamily::BaseLcm, "toy base LCM for smoke tests");
        registries.register_arch(
            "two_tower_diffusion_lcm_1_6B",
            ModelFamily::TwoTowerDiffusion,
            "1.6B parameter two-tower diffusion LCM",
        );
        registries.register_arch(
            "toy_two_tower_diffusion_lcm",
            ModelFamily::TwoTowerDiffusion,
            "toy two-tower diffusion LCM for smoke tests",
        );
        registries.register_criterion("next_sentence_mse", ModelFamily::BaseLcm);
        registries.register_criterion("target_mse", ModelFamily::BaseLcm);
        registries.register_criterion("two_tower_diffusion_next_sent", ModelFamily::TwoTowerDiffusion);
        registries
    }
}

impl Registries {
    #[must_use]
    pub fn empty() -> Self {
        Self { archs: BTreeMap::new(), criteria: BTreeMap::new() }
    }

    pub fn register_arch(&mut self, name: impl Into<String>, family: ModelFamily, description: impl Into<String>) {
        self.archs.insert(name.into(), ArchEntry { family, description: description.into() });
    }

    pub fn register_criterion(&mut self, name: impl Into<String>, family: ModelFamily) {
        self.criteria.insert(name.into(), family);
    }

    pub fn arch_names(&self) -> impl Iterator<Item = &str> {
        self.archs.keys().map(String::as_str)
    }

    pub fn criterion_names(&self) -> impl Iterator<Item = &str> {
        self.criteria.keys().map(String::as_str)
    }

    pub fn resolve_arch(&self, name: &str) -> TrainingResult<&ArchEntry> {
        self.archs.get(name).ok_or_else(|| TrainingError::UnknownReference {
            kind: "model architecture",
            name: name.to_string(),
            suggestion: suggest(name, self.arch_names()),
        })
    }

    pub fn resolve_criterion(&self, name: &str) -> TrainingResult<ModelFamily> {
        self.criteria.get(name).copied().ok_or_else(|| TrainingError::UnknownReference {
            kind: "criterion",
            name: name.to_string(),
            suggestion: suggest(name, self.criterion_names()),
        })
    }
}
