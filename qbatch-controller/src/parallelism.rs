//! Thread-level parallelism planning
//!
//! Parallel execution happens at three levels: experiments in a batch,
//! shots in an experiment, and state updates within a shot. Experiment and
//! shot parallelism are mutually exclusive; whatever of the thread budget
//! they leave over goes to state updates.

use crate::distribution::DistributionState;
use crate::error::{ControllerError, Result};
use log::debug;
use qbatch_core::Circuit;

/// True when the crate is built with thread support
pub(crate) fn parallel_enabled() -> bool {
    cfg!(feature = "parallel")
}

#[cfg(feature = "parallel")]
pub(crate) fn platform_threads() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn platform_threads() -> usize {
    1
}

/// Resolved parallelism state of one batch
///
/// Created when the job begins, written only by the planners before
/// execution starts, and read-only during execution.
#[derive(Debug, Clone)]
pub struct Parallelism {
    /// Total worker-thread budget across all levels
    pub max_parallel_threads: usize,

    /// Configured cap on simultaneous experiments (0 = auto)
    pub max_parallel_experiments: usize,

    /// Configured cap on simultaneous shots (0 = auto)
    pub max_parallel_shots: usize,

    /// Memory budget in MiB
    pub max_memory_mb: u64,

    /// Experiments executed simultaneously on this process
    pub parallel_experiments: usize,

    /// Shot parallelism, meaningful only under explicit parallelization
    pub parallel_shots: usize,

    /// State-update parallelism, meaningful only under explicit parallelization
    pub parallel_state_update: usize,

    /// Outer threads may spawn inner threads
    pub parallel_nested: bool,

    /// Planners accept the caller's values verbatim
    pub explicit: bool,
}

/// Per-circuit thread assignment computed by the circuit-level planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitParallelism {
    /// Simultaneous shot executions
    pub parallel_shots: usize,

    /// Thread budget left for per-shot state updates
    pub parallel_state_update: usize,
}

impl Parallelism {
    /// Plan experiment-level parallelism for the local circuit range
    ///
    /// Sorts the per-circuit memory estimates descending and takes the
    /// largest prefix that fits the budget; the prefix length, clamped by
    /// the thread budget and the configured cap, becomes
    /// `parallel_experiments`.
    ///
    /// # Errors
    ///
    /// Returns an out-of-memory error when not even one circuit fits.
    pub fn set_parallelization_experiments<F>(
        &mut self,
        local: &[Circuit],
        dist: &DistributionState,
        num_processes: usize,
        required_memory_mb: F,
    ) -> Result<()>
    where
        F: Fn(&Circuit) -> u64,
    {
        let max_experiments = if self.max_parallel_experiments > 0 {
            self.max_parallel_experiments.min(self.max_parallel_threads)
        } else {
            self.max_parallel_threads
        };

        if max_experiments == 1 && num_processes == 1 {
            self.parallel_experiments = 1;
            return Ok(());
        }
        if local.is_empty() {
            self.parallel_experiments = 1;
            return Ok(());
        }

        let nppe = dist.num_process_per_experiment as u64;
        let mut memory: Vec<u64> = local
            .iter()
            .map(|circ| required_memory_mb(circ) / nppe)
            .collect();
        memory.sort_unstable_by(|a, b| b.cmp(a));

        let budget = self.max_memory_mb * nppe;
        let mut total = 0u64;
        let mut fits = 0usize;
        for mb in memory {
            total += mb;
            if total > budget {
                break;
            }
            fits += 1;
        }
        if fits == 0 {
            return Err(ControllerError::OutOfMemory);
        }

        self.parallel_experiments = fits
            .min(max_experiments)
            .min(self.max_parallel_threads)
            .min(local.len());
        debug!(
            "experiment planner: {} of {} local circuits in parallel",
            self.parallel_experiments,
            local.len()
        );
        Ok(())
    }

    /// Plan shot-level parallelism for one circuit
    ///
    /// Shot parallelism is disabled whenever experiment parallelism is
    /// active; otherwise it is bounded by the memory budget, the thread
    /// budget and this rank's local shot count. Whatever threads remain go
    /// to state updates.
    ///
    /// # Errors
    ///
    /// Returns an out-of-memory error when the circuit alone exceeds the
    /// budget.
    pub fn circuit_parallelism<F>(
        &self,
        circuit: &Circuit,
        dist: &DistributionState,
        required_memory_mb: F,
    ) -> Result<CircuitParallelism>
    where
        F: Fn(&Circuit) -> u64,
    {
        let max_shots = if self.max_parallel_shots > 0 {
            self.max_parallel_shots.min(self.max_parallel_threads)
        } else {
            self.max_parallel_threads
        };

        let parallel_shots = if max_shots == 1 || self.parallel_experiments > 1 {
            1
        } else {
            let circ_mb = required_memory_mb(circuit) / dist.num_process_per_experiment as u64;
            if self.max_memory_mb < circ_mb {
                return Err(ControllerError::OutOfMemory);
            }
            let circ_mb = circ_mb.max(1);
            let shots = dist.local_shots(circuit.shots);
            (self.max_memory_mb / circ_mb)
                .min(max_shots as u64)
                .min(shots) as usize
        };

        let parallel_state_update = if parallel_shots > 1 {
            (self.max_parallel_threads / parallel_shots).max(1)
        } else {
            (self.max_parallel_threads / self.parallel_experiments.max(1)).max(1)
        };

        Ok(CircuitParallelism {
            parallel_shots,
            parallel_state_update,
        })
    }
}
