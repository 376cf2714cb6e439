use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::afk::AfkState;
use crate::sensing::LoopHealthSnapshot;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

/// Point-in-time health of a tracker instance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerDiagnostics {
    pub sampled_at: DateTime<Utc>,
    pub tracking: bool,
    pub loops: Vec<LoopHealthSnapshot>,
    pub data_points: usize,
    pub afk: AfkState,
    pub system: SystemMetrics,
}

/// CPU and memory of the current process.
pub struct ProcessSampler {
    system: System,
    pid: Pid,
}

impl ProcessSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // CPU usage is a delta between refreshes; take the baseline now.
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self { system, pid }
    }

    pub fn sample(&mut self) -> SystemMetrics {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]));

        match self.system.process(self.pid) {
            Some(process) => SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            },
            None => SystemMetrics::default(),
        }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_own_process() {
        let mut sampler = ProcessSampler::new();
        let metrics = sampler.sample();
        assert!(metrics.memory_mb > 0.0);
        assert!(metrics.cpu_percent >= 0.0);
    }
}
