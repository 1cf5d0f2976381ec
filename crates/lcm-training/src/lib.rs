//! LCM Training
//!
//! Typed training recipes for Large Concept Model runs:
//! - Loading `# @package` YAML recipes and applying command-line overrides
//! - Validating a run against the architecture and criterion registries
//! - Learning-rate schedules, step cadence and checkpoint retention
//! - Run directory layout, manifests and cluster launch scripts
//! - Sentence-embedding data preparation jobs

pub mod cadence;
pub mod config;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod grouped;
pub mod launch;
pub mod layout;
pub mod manifest;
pub mod missing;
pub mod overrides;
pub mod prepare;
pub mod recipe;
pub mod registry;
pub mod requirements;
pub mod resolve;
pub mod schedule;
pub mod summary;
pub mod trainer;
pub mod validate;

pub use cadence::{CadencePlan, PruneAction, RetentionPlan, StepActions};
pub use config::{CriterionConfig, CriterionName, Dtype, ModelArch, Reduction, TrainingRunConfig};
pub use dataset::{DataLoadingConfig, DatasetRef};
pub use discovery::{discover_recipes, RecipeEntry};
pub use error::{TrainingError, TrainingResult};
pub use launch::{launcher_for, Cluster, JobSubmission, LaunchReceipt, Launcher, LocalLauncher, SlurmLauncher};
pub use layout::RunLayout;
pub use manifest::{init_run, RunId, RunManifest};
pub use missing::{MaybeMissing, MISSING_SENTINEL};
pub use overrides::{parse_overrides, Override, OverrideOp};
pub use prepare::{device_for_worker, worker_id_from_env, Device, PrepareJobConfig, SplitSpec};
pub use recipe::RecipeDocument;
pub use registry::{ModelFamily, Registries};
pub use requirements::Requirements;
pub use resolve::{resolve, InvocationContext, ResolvedRun};
pub use schedule::{LrSchedule, LrScheduler};
pub use summary::RunSummary;
pub use trainer::TrainerEntryPoint;
pub use validate::ValidationReport;
