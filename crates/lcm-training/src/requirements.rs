//! Cluster resource request of a job.
//!
//! Field names and units match the scheduler-side descriptor
//! (`nodes`, `tasks_per_node`, `gpus_per_node`, `cpus_per_task`, `mem_gb`,
//! `timeout_min`) and must survive a round trip unchanged.

use crate::error::{TrainingError, TrainingResult};
use crate::grouped;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default = "one", deserialize_with = "grouped::deserialize")]
    pub nodes: u32,
    #[serde(default = "one", deserialize_with = "grouped::deserialize")]
    pub tasks_per_node: u32,
    #[serde(default, deserialize_with = "grouped::deserialize")]
    pub gpus_per_node: u32,
    #[serde(default = "one", deserialize_with = "grouped::deserialize")]
    pub cpus_per_task: u32,
    /// Memory per node in GB; `0` requests all memory of the node.
    #[serde(default, deserialize_with = "grouped::deserialize")]
    pub mem_gb: u32,
    #[serde(default = "default_timeout_min", deserialize_with = "grouped::deserialize")]
    pub timeout_min: u32,
}

const fn one() -> u32 {
    1
}

const fn default_timeout_min() -> u32 {
    720
}

impl Default for Requirements {
    fn default() -> Self {
        Self { nodes: 1, tasks_per_node: 1, gpus_per_node: 0, cpus_per_task: 1, mem_gb: 0, timeout_min: 720 }
    }
}

impl Requirements {
    /// Number of ranks in the job.
    #[must_use]
    pub fn world_size(&self) -> u64 {
        u64::from(self.nodes) * u64::from(self.tasks_per_node)
    }

    #[must_use]
    pub fn total_gpus(&self) -> u64 {
        u64::from(self.nodes) * u64::from(self.gpus_per_node)
    }

    #[must_use]
    pub fn total_cpus(&self) -> u64 {
        self.world_size() * u64::from(self.cpus_per_task)
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.nodes == 0 {
            return Err(TrainingError::invalid("requirements.nodes", "must be >= 1"));
        }
        if self.tasks_per_node == 0 {
            return Err(TrainingError::invalid("requirements.tasks_per_node", "must be >= 1"));
        }
        if self.cpus_per_task == 0 {
            return Err(TrainingError::invalid("requirements.cpus_per_task", "must be >= 1"));
        }
        if self.timeout_min == 0 {
            return Err(TrainingError::invalid("requirements.timeout_min", "must be >= 1"));
        }
        Ok(())
    }

    /// Value of the `--mem` option. SLURM reads `--mem=0` as "all node memory".
    #[must_use]
    pub fn mem_option(&self) -> String {
        if self.mem_gb == 0 {
            "0".to_string()
        } else {
            format!("{}G", self.mem_gb)
        }
    }

    /// `#SBATCH` header lines for this request.
    #[must_use]
    pub fn sbatch_directives(&self, job_name: Option<&str>, partition: Option<&str>) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(name) = job_name {
            lines.push(format!("#SBATCH --job-name={name}"));
        }
        if let Some(partition) = partition {
            lines.push(format!("#SBATCH --partition={partition}"));
        }
        lines.push(format!("#SBATCH --nodes={}", self.nodes));
        lines.push(format!("#SBATCH --ntasks-per-node={}", self.tasks_per_node));
        if self.gpus_per_node > 0 {
            lines.push(format!("#SBATCH --gpus-per-node={}", self.gpus_per_node));
        }
        lines.push(format!("#SBATCH --cpus-per-task={}", self.cpus_per_task));
        lines.push(format!("#SBATCH --mem={}", self.mem_option()));
        lines.push(format!("#SBATCH --time={}", self.timeout_min));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pretrain() -> Requirements {
        Requirements { nodes: 4, tasks_per_node: 8, gpus_per_node: 8, cpus_per_task: 32, mem_gb: 0, timeout_min: 10000 }
    }

    #[test]
    fn test_world_size_and_gpus() {
        let req = pretrain();
        assert_eq!(req.world_size(), 32);
        assert_eq!(req.total_gpus(), 32);
        assert_eq!(req.total_cpus(), 1024);
    }

    #[test]
    fn test_sbatch_directives_preserve_fields() {
        let lines = pretrain().sbatch_directives(Some("lcm_mse"), Some("learn"));
        assert_eq!(
            lines,
            vec![
                "#SBATCH --job-name=lcm_mse",
                "#SBATCH --partition=learn",
                "#SBATCH --nodes=4",
                "#SBATCH --ntasks-per-node=8",
                "#SBATCH --gpus-per-node=8",
                "#SBATCH --cpus-per-task=32",
                "#SBATCH --mem=0",
                "#SBATCH --time=10000",
            ]
        );
    }

    #[test]
    fn test_cpu_only_request_omits_gpus() {
        let req = Requirements { mem_gb: 120, ..Requirements::default() };
        let lines = req.sbatch_directives(None, None);
        assert!(lines.iter().all(|l| !l.contains("gpus")));
        assert!(lines.contains(&"#SBATCH --mem=120G".to_string()));
    }

    #[test]
    fn test_defaults_fill_partial_block() {
        let req: Requirements = serde_yaml::from_str("mem_gb: 120\ngpus_per_node: 1\ncpus_per_task: 10\ntimeout_min: 4320\n").unwrap();
        assert_eq!(req.nodes, 1);
        assert_eq!(req.tasks_per_node, 1);
        assert_eq!(req.timeout_min, 4320);
    }

    #[test]
    fn test_validate_rejects_zero_nodes() {
        let req = Requirements { nodes: 0, ..pretrain() };
        assert!(req.validate().is_err());
    }
}
