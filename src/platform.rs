use std::fmt;
use clap::ValueEnum;

/// Where a batch of jobs is launched
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Platform {
    /// Rented cloud VMs (EC2), one instance per job
    CloudVm,
    /// SLURM cluster, one sbatch submission per job
    BatchCluster,
}

impl Platform {
    /// Cluster jobs are always submitted one per line
    pub fn forces_split_lines(&self) -> bool {
        matches!(self, Platform::BatchCluster)
    }

    /// Subfolder used for code snapshots in object storage
    pub fn snapshot_folder(&self) -> &'static str {
        match self {
            Platform::CloudVm => "scheduling/aws/",
            Platform::BatchCluster => "scheduling/o2/",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Platform::CloudVm => write!(f, "cloud-vm"),
            Platform::BatchCluster => write!(f, "batch-cluster"),
        }
    }
}
