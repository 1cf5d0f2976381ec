//! Resolving the pretraining recipe into a run: overrides, output directory,
//! schedule, cadence and the on-disk run layout.

use lcm_training::{
    init_run, parse_overrides, resolve, CadencePlan, InvocationContext, LrScheduler, RecipeDocument, Registries,
    RunLayout, RunManifest, RunSummary, TrainerEntryPoint, TrainingError,
};
use std::path::PathBuf;
use tempfile::TempDir;

const PRETRAIN_MSE: &str = include_str!("../../../recipes/train/pretrain/mse.yaml");

fn recipe() -> RecipeDocument {
    RecipeDocument::from_yaml_str(PRETRAIN_MSE).unwrap()
}

#[test]
fn test_resolve_fails_fast_without_output_dir() {
    let err = resolve(&recipe(), &InvocationContext::default(), &Registries::default()).unwrap_err();
    assert!(matches!(err, TrainingError::MissingValue(ref field) if field == "output_dir"));
    assert!(err.to_string().contains("output_dir"));
}

#[test]
fn test_empty_output_dir_counts_as_unset() {
    let blank = RecipeDocument::from_yaml_str(&PRETRAIN_MSE.replace("output_dir: ??", "output_dir: \"\"")).unwrap();
    let err = resolve(&blank, &InvocationContext::default(), &Registries::default()).unwrap_err();
    assert!(matches!(err, TrainingError::MissingValue(ref field) if field == "output_dir"));

    let ctx = InvocationContext::default().with_output_dir("");
    let err = resolve(&recipe(), &ctx, &Registries::default()).unwrap_err();
    assert!(matches!(err, TrainingError::MissingValue(ref field) if field == "output_dir"));
}

#[test]
fn test_resolve_with_output_dir() {
    let ctx = InvocationContext::default().with_output_dir("/checkpoints/lcm_mse");
    let run = resolve(&recipe(), &ctx, &Registries::default()).unwrap();

    assert_eq!(run.output_dir, PathBuf::from("/checkpoints/lcm_mse"));
    assert_eq!(run.config.trainer, TrainerEntryPoint::PrepareLcmTrainer);
    assert_eq!(run.package.as_deref(), Some("trainer"));
    assert!(run.report.is_clean());
}

#[test]
fn test_explicit_override_beats_context_output_dir() {
    let overrides = parse_overrides(&["output_dir=/from/override", "requirements.nodes=2", "lr=1e-4"]).unwrap();
    let ctx = InvocationContext::default().with_output_dir("/from/context").with_overrides(overrides);
    let run = resolve(&recipe(), &ctx, &Registries::default()).unwrap();

    assert_eq!(run.output_dir, PathBuf::from("/from/override"));
    assert_eq!(run.config.requirements.nodes, 2);
    assert_eq!(run.config.requirements.world_size(), 16);
    assert!((run.config.lr - 1e-4).abs() < 1e-12);
}

#[test]
fn test_bad_override_is_reported() {
    let overrides = parse_overrides(&["model_arch=base_lcm_16B"]).unwrap();
    let ctx = InvocationContext::default().with_output_dir("/tmp/run").with_overrides(overrides);
    let err = resolve(&recipe(), &ctx, &Registries::default()).unwrap_err();
    assert!(err.to_string().contains("did you mean `base_lcm_1_6B`"));

    let overrides = parse_overrides(&["not_a_key=1"]).unwrap();
    let ctx = InvocationContext::default().with_overrides(overrides);
    assert!(matches!(
        resolve(&recipe(), &ctx, &Registries::default()),
        Err(TrainingError::Override { .. })
    ));
}

#[test]
fn test_schedule_endpoints() {
    let config = recipe().training_config().unwrap();
    let scheduler = LrScheduler::from_config(&config);

    assert!(scheduler.lr_at(0).abs() < 1e-12);
    assert!((scheduler.lr_at(5000) - 0.00015).abs() < 1e-12);
    assert!((scheduler.lr_at(10_000) - 0.0003).abs() < 1e-12);
    assert!((scheduler.lr_at(250_000) - 0.00003).abs() < 1e-12);
}

#[test]
fn test_cadence_and_summary() {
    let config = recipe().training_config().unwrap();
    let plan = CadencePlan::from_config(&config);
    assert_eq!(plan.checkpoint_count(), 125);
    assert_eq!(plan.model_save_count(), 25);
    assert_eq!(plan.validation_count(), 50);

    let summary = RunSummary::from_config(&config);
    assert_eq!(summary.world_size, 32);
    assert_eq!(summary.total_gpus, 32);
    assert_eq!(summary.tokens_per_step, 7168 * 32);
    assert_eq!(summary.total_tokens, 7168 * 32 * 250_000);
    assert!((summary.warmup_fraction - 0.04).abs() < 1e-12);
}

#[test]
fn test_init_run_writes_layout_and_manifest() {
    let temp = TempDir::new().unwrap();
    let ctx = InvocationContext::default().with_output_dir(temp.path().join("run"));
    let run = resolve(&recipe(), &ctx, &Registries::default()).unwrap();

    let manifest = init_run(&run).unwrap();
    let layout = RunLayout::new(temp.path().join("run"));
    assert!(layout.checkpoints_dir().is_dir());
    assert!(layout.config_logs_dir().is_dir());
    assert!(layout.metrics_dir().is_dir());

    let resolved = std::fs::read_to_string(layout.resolved_config_path()).unwrap();
    assert!(resolved.starts_with("# @package trainer\n"));
    assert_eq!(manifest.config_sha256, lcm_training::manifest::sha256_text(&resolved));
    assert_eq!(manifest.world_size, 32);
    assert_eq!(manifest.max_steps, 250_000);

    let loaded = RunManifest::load(&layout).unwrap();
    assert_eq!(loaded, manifest);

    // The written config resolves again without a context.
    let again = resolve(
        &RecipeDocument::load(layout.resolved_config_path()).unwrap(),
        &InvocationContext::default(),
        &Registries::default(),
    )
    .unwrap();
    assert_eq!(again.config, run.config);
}
