//! Turning a recipe plus its invocation context into a launchable run.

use crate::config::TrainingRunConfig;
use crate::error::TrainingResult;
use crate::overrides::Override;
use crate::recipe::RecipeDocument;
use crate::registry::{ModelFamily, Registries};
use crate::validate::ValidationReport;
use std::path::PathBuf;

/// Values supplied by whoever launches the run.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    /// Replaces `output_dir`. Applied before `overrides`, so an explicit
    /// `output_dir=...` override still wins.
    pub output_dir: Option<PathBuf>,
    pub overrides: Vec<Override>,
}

impl InvocationContext {
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: Vec<Override>) -> Self {
        self.overrides.extend(overrides);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub package: Option<String>,
    pub config: TrainingRunConfig,
    pub output_dir: PathBuf,
    pub family: ModelFamily,
    pub report: ValidationReport,
}

impl ResolvedRun {
    /// The resolved configuration as an emit-ready document.
    pub fn to_document(&self) -> TrainingResult<RecipeDocument> {
        RecipeDocument::from_typed(self.package.clone(), &self.config)
    }
}

/// Apply the context to a copy of `recipe`. Nothing is validated here.
pub fn apply_context(recipe: &RecipeDocument, ctx: &InvocationContext) -> TrainingResult<RecipeDocument> {
    let mut recipe = recipe.clone();
    if let Some(output_dir) = &ctx.output_dir {
        let output_dir = output_dir.to_string_lossy();
        let item = if recipe.get("output_dir").is_some() {
            Override::set_string("output_dir", &output_dir)?
        } else {
            Override::add_string("output_dir", &output_dir)?
        };
        recipe.apply_overrides(&[item])?;
    }
    recipe.apply_overrides(&ctx.overrides)?;
    Ok(recipe)
}

/// Full resolution: context, typed view, registries, invariants, and the
/// required `output_dir`.
pub fn resolve(recipe: &RecipeDocument, ctx: &InvocationContext, registries: &Registries) -> TrainingResult<ResolvedRun> {
    let recipe = apply_context(recipe, ctx)?;
    let config = recipe.training_config()?;
    let report = config.validate(registries)?;
    let output_dir = config.output_dir()?.clone();
    tracing::debug!(
        trainer = %config.trainer,
        model_arch = %config.model_arch,
        output_dir = %output_dir.display(),
        "resolved training run"
    );
    Ok(ResolvedRun {
        package: recipe.package().map(str::to_string),
        family: config.trainer.family(),
        output_dir,
        config,
        report,
    })
}
