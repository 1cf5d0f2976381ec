//! Data preparation jobs.
//!
//! A preparation job reads a Hugging Face dataset, splits each text column
//! into sentences with a SaT model, embeds every sentence with SONAR and
//! writes the result as a Parquet dataset. The training recipes consume
//! that output through their `training_data` cards.

use crate::error::{TrainingError, TrainingResult};
use crate::grouped;
use crate::launch::{Cluster, JobSubmission};
use crate::missing::MaybeMissing;
use crate::requirements::Requirements;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable holding the rank of a SLURM task.
pub const SLURM_PROCID_ENV: &str = "SLURM_PROCID";

/// Workers without a rank are spread over this many device slots.
const FALLBACK_WORKER_SLOTS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Input columns holding raw text.
    pub columns: Vec<String>,
    pub model_name: String,
    #[serde(default)]
    pub verbose: bool,
    /// Probability above which a boundary becomes a sentence break.
    #[serde(deserialize_with = "grouped::deserialize_f64")]
    pub sentence_threshold: f64,
    #[serde(deserialize_with = "grouped::deserialize")]
    pub max_sentence_len: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangColumn {
    pub column: String,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub column_config: Vec<LangColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFormat {
    #[default]
    Arrow,
    Pandas,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HfInputConfig {
    /// Hub dataset id, e.g. `wikimedia/wikipedia`.
    pub input_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    pub split: String,
    #[serde(default = "one", deserialize_with = "grouped::deserialize")]
    pub num_shards: u32,
    #[serde(default)]
    pub batch_format: BatchFormat,
    #[serde(deserialize_with = "grouped::deserialize")]
    pub batch_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParquetOutputConfig {
    #[serde(default)]
    pub dir: MaybeMissing<PathBuf>,
    #[serde(default)]
    pub keep_same_partitioning: bool,
    #[serde(deserialize_with = "grouped::deserialize")]
    pub row_group_size: u32,
    #[serde(deserialize_with = "grouped::deserialize")]
    pub batch_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default)]
    pub cluster: Cluster,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
}

const fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareJobConfig {
    pub name: String,
    pub splitter: SplitterConfig,
    pub encoder: EncoderConfig,
    pub input: HfInputConfig,
    pub output: ParquetOutputConfig,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default)]
    pub launcher: LauncherConfig,
}

/// FLORES-style language code: three lowercase letters, `_`, a capitalized
/// four-letter script (`eng_Latn`, `zho_Hans`).
fn is_lang_code(code: &str) -> bool {
    let Some((lang, script)) = code.split_once('_') else {
        return false;
    };
    let mut script_chars = script.chars();
    lang.len() == 3
        && lang.chars().all(|c| c.is_ascii_lowercase())
        && script.len() == 4
        && script_chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && script_chars.all(|c| c.is_ascii_lowercase())
}

fn at_least_one(field: &str, value: u32) -> TrainingResult<()> {
    if value == 0 {
        return Err(TrainingError::invalid(field, "must be >= 1"));
    }
    Ok(())
}

impl PrepareJobConfig {
    /// Structural checks. `output.dir` may still be unset.
    pub fn validate(&self) -> TrainingResult<()> {
        if self.name.trim().is_empty() {
            return Err(TrainingError::invalid("name", "must not be empty"));
        }

        if self.splitter.columns.is_empty() {
            return Err(TrainingError::invalid("splitter.columns", "must name at least one column"));
        }
        let threshold = self.splitter.sentence_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(TrainingError::invalid(
                "splitter.sentence_threshold",
                format!("must be in (0, 1) (got {threshold})"),
            ));
        }
        at_least_one("splitter.max_sentence_len", self.splitter.max_sentence_len)?;

        if self.encoder.column_config.is_empty() {
            return Err(TrainingError::invalid("encoder.column_config", "must name at least one column"));
        }
        for (idx, entry) in self.encoder.column_config.iter().enumerate() {
            if entry.column.trim().is_empty() {
                return Err(TrainingError::invalid(&format!("encoder.column_config[{idx}].column"), "must not be empty"));
            }
            if !is_lang_code(&entry.lang) {
                return Err(TrainingError::invalid(
                    &format!("encoder.column_config[{idx}].lang"),
                    format!("`{}` is not a language code like `eng_Latn`", entry.lang),
                ));
            }
        }

        if self.input.input_file.trim().is_empty() {
            return Err(TrainingError::invalid("input.input_file", "must not be empty"));
        }
        self.input.split.parse::<SplitSpec>()?;
        at_least_one("input.num_shards", self.input.num_shards)?;
        at_least_one("input.batch_size", self.input.batch_size)?;

        at_least_one("output.row_group_size", self.output.row_group_size)?;
        at_least_one("output.batch_size", self.output.batch_size)?;

        self.requirements.validate()
    }

    pub fn output_dir(&self) -> TrainingResult<&PathBuf> {
        self.output.dir.require_path("output.dir")
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output.dir = MaybeMissing::Set(dir.into());
        self
    }

    pub fn split_spec(&self) -> TrainingResult<SplitSpec> {
        self.input.split.parse()
    }

    /// Columns the splitter adds, one per input column (`text` -> `text_sentences`).
    #[must_use]
    pub fn sentence_columns(&self) -> Vec<String> {
        self.splitter.columns.iter().map(|column| format!("{column}_sentences")).collect()
    }

    /// Job submission for `command`. Requires `output.dir`.
    pub fn submission(&self, command: Vec<String>) -> TrainingResult<JobSubmission> {
        let output_dir = self.output_dir()?;
        Ok(JobSubmission::new(self.name.clone(), self.requirements.clone(), command)
            .with_partition(self.launcher.partition.clone())
            .with_env("LCM_PREPARE_OUTPUT_DIR", output_dir.to_string_lossy()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum SplitBound {
    Row(u64),
    Percent(u8),
}

impl fmt::Display for SplitBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(row) => write!(f, "{row}"),
            Self::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

/// A dataset split expression such as `train`, `train[0:200]` or
/// `validation[:10%]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitSpec {
    pub name: String,
    pub start: Option<SplitBound>,
    pub end: Option<SplitBound>,
}

impl SplitSpec {
    /// Number of rows selected, when both bounds are row indices.
    #[must_use]
    pub fn row_count(&self) -> Option<u64> {
        match (self.start.unwrap_or(SplitBound::Row(0)), self.end?) {
            (SplitBound::Row(start), SplitBound::Row(end)) => end.checked_sub(start),
            _ => None,
        }
    }
}

fn parse_bound(raw: &str, text: &str) -> TrainingResult<Option<SplitBound>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let invalid = || TrainingError::invalid("input.split", format!("bad bound `{text}` in `{raw}`"));
    if let Some(pct) = text.strip_suffix('%') {
        let pct: u8 = pct.trim().parse().map_err(|_| invalid())?;
        if pct > 100 {
            return Err(invalid());
        }
        return Ok(Some(SplitBound::Percent(pct)));
    }
    let row = grouped::parse_grouped_u64(text).ok_or_else(invalid)?;
    Ok(Some(SplitBound::Row(row)))
}

impl FromStr for SplitSpec {
    type Err = TrainingError;

    fn from_str(s: &str) -> TrainingResult<Self> {
        let raw = s.trim();
        let invalid = |reason: &str| TrainingError::invalid("input.split", format!("{reason} in `{raw}`"));

        let Some(open) = raw.find('[') else {
            if raw.is_empty() || raw.contains(']') {
                return Err(invalid("expected `name` or `name[start:end]`"));
            }
            return Ok(Self { name: raw.to_string(), start: None, end: None });
        };

        let name = raw[..open].trim();
        let body = raw[open + 1..].strip_suffix(']').ok_or_else(|| invalid("missing closing `]`"))?;
        if name.is_empty() {
            return Err(invalid("missing split name"));
        }
        let (start, end) = body.split_once(':').ok_or_else(|| invalid("expected `start:end` inside brackets"))?;
        let start = parse_bound(raw, start)?;
        let end = parse_bound(raw, end)?;

        match (start, end) {
            (Some(SplitBound::Row(a)), Some(SplitBound::Row(b))) if a >= b => {
                return Err(invalid("start must be before end"));
            }
            (Some(SplitBound::Percent(a)), Some(SplitBound::Percent(b))) if a >= b => {
                return Err(invalid("start must be before end"));
            }
            _ => {}
        }
        Ok(Self { name: name.to_string(), start, end })
    }
}

impl fmt::Display for SplitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.start.is_none() && self.end.is_none() {
            return Ok(());
        }
        f.write_str("[")?;
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        f.write_str(":")?;
        if let Some(end) = self.end {
            write!(f, "{end}")?;
        }
        f.write_str("]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda(u32),
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cuda(idx) => write!(f, "cuda:{idx}"),
            Self::Cpu => f.write_str("cpu"),
        }
    }
}

impl Serialize for Device {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Device for an embedding worker: GPUs are shared round robin.
#[must_use]
pub fn device_for_worker(worker_id: u64, num_gpus: u32) -> Device {
    if num_gpus == 0 {
        return Device::Cpu;
    }
    let idx = worker_id % u64::from(num_gpus);
    Device::Cuda(u32::try_from(idx).unwrap_or(0))
}

/// Worker id from the task rank, or `pid % 8` outside SLURM.
pub fn worker_id_from(procid: Option<&str>, pid: u32) -> TrainingResult<u64> {
    match procid {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| TrainingError::invalid(SLURM_PROCID_ENV, format!("is not a rank (got `{raw}`)"))),
        None => Ok(u64::from(pid % FALLBACK_WORKER_SLOTS)),
    }
}

pub fn worker_id_from_env() -> TrainingResult<u64> {
    let procid = std::env::var(SLURM_PROCID_ENV).ok();
    worker_id_from(procid.as_deref(), std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_spec_parse() {
        let spec: SplitSpec = "train[0:200]".parse().unwrap();
        assert_eq!(spec.name, "train");
        assert_eq!(spec.start, Some(SplitBound::Row(0)));
        assert_eq!(spec.end, Some(SplitBound::Row(200)));
        assert_eq!(spec.row_count(), Some(200));
        assert_eq!(spec.to_string(), "train[0:200]");

        let open: SplitSpec = "train".parse().unwrap();
        assert_eq!(open.start, None);
        assert_eq!(open.row_count(), None);

        let pct: SplitSpec = "validation[:10%]".parse().unwrap();
        assert_eq!(pct.end, Some(SplitBound::Percent(10)));
        assert_eq!(pct.row_count(), None);

        let tail: SplitSpec = "train[:1_000]".parse().unwrap();
        assert_eq!(tail.row_count(), Some(1000));
    }

    #[test]
    fn test_split_spec_rejects_malformed() {
        for bad in ["", "[0:10]", "train[0:10", "train[10:5]", "train[5]", "train[0:x]", "train[0%:150%]"] {
            assert!(bad.parse::<SplitSpec>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_device_for_worker() {
        assert_eq!(device_for_worker(0, 8), Device::Cuda(0));
        assert_eq!(device_for_worker(11, 8), Device::Cuda(3));
        assert_eq!(device_for_worker(5, 1), Device::Cuda(0));
        assert_eq!(device_for_worker(5, 0), Device::Cpu);
        assert_eq!(Device::Cuda(3).to_string(), "cuda:3");
    }

    #[test]
    fn test_worker_id_from() {
        assert_eq!(worker_id_from(Some("13"), 999).unwrap(), 13);
        assert_eq!(worker_id_from(None, 1234).unwrap(), 2);
        assert!(worker_id_from(Some("rank0"), 1).is_err());
    }

    #[test]
    fn test_lang_codes() {
        assert!(is_lang_code("eng_Latn"));
        assert!(is_lang_code("zho_Hans"));
        assert!(!is_lang_code("en"));
        assert!(!is_lang_code("eng_latn"));
        assert!(!is_lang_code("ENG_Latn"));
    }
}
