//! Top-level batch controller
//!
//! Accepts a batch job, partitions it across processes, plans thread-level
//! parallelism under the memory budget, runs the local experiments
//! (sequentially or in parallel), and reduces the per-experiment statuses
//! into a single structured outcome.

use crate::config::ControllerConfig;
use crate::distribution::DistributionState;
use crate::error::ControllerError;
use crate::fabric::{Fabric, SoloFabric};
use crate::memory::MemoryProbe;
use crate::parallelism::parallel_enabled;
use crate::runner::{execute_experiment, ExperimentContext};
use log::debug;
use qbatch_backend::Backend;
use qbatch_core::{BatchResult, BatchStatus, Circuit, ExperimentStatus, Job, NoiseModel};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Scheduler for batches of circuit experiments
///
/// The controller is non-polymorphic: it drives whatever backend capability
/// object it is constructed with. Distribution across processes comes from
/// the attached fabric; absence of a real fabric behaves like one rank.
pub struct BatchController {
    backend: Arc<dyn Backend>,
    fabric: Arc<dyn Fabric>,
    probe: MemoryProbe,
}

impl BatchController {
    /// Create a controller over the given backend on a single-process fabric
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            fabric: Arc::new(SoloFabric),
            probe: MemoryProbe::new(),
        }
    }

    /// Attach a distributed fabric
    pub fn with_fabric(mut self, fabric: Arc<dyn Fabric>) -> Self {
        self.fabric = fabric;
        self
    }

    /// Replace the memory probe (e.g. to expose accelerator devices)
    pub fn with_memory_probe(mut self, probe: MemoryProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Execute a batch job document
    ///
    /// Parse failures produce a result with status `error` and no
    /// experiments; they never panic or abort.
    pub fn execute(&self, job_value: &Value) -> BatchResult {
        let timer = Instant::now();

        let job = match Job::from_value(job_value) {
            Ok(job) => job,
            Err(err) => return parse_error_result(&err.to_string()),
        };
        let noise = match NoiseModel::from_config(&job.config) {
            Ok(noise) => noise,
            Err(err) => return parse_error_result(&err.to_string()),
        };

        let mut result = self.execute_circuits(&job.experiments, &noise, &job.config);

        result.qobj_id = job.id;
        if !job.header.is_null() {
            result.header = job.header;
        }
        result.metadata.insert(
            "time_taken".to_string(),
            json!(timer.elapsed().as_secs_f64()),
        );
        result
    }

    /// Execute parsed circuits under a noise model and config map
    pub fn execute_circuits(
        &self,
        circuits: &[Circuit],
        noise: &NoiseModel,
        config: &Value,
    ) -> BatchResult {
        let timer = Instant::now();

        let controller = match ControllerConfig::from_config(config) {
            Ok(cfg) => cfg,
            Err(err) => return error_result(&err),
        };
        let mut parallelism = controller.resolve(&self.probe, self.fabric.as_ref());

        let distribution = DistributionState::plan(
            circuits,
            self.fabric.rank(),
            self.fabric.size(),
            parallelism.max_memory_mb,
            |circ| self.backend.required_memory_mb(circ, noise),
        );
        let local = &circuits[distribution.local_range()];
        let mut result = BatchResult::new(local.len());

        let max_qubits = local.iter().map(|c| c.num_qubits).max().unwrap_or(0);
        debug!(
            "rank {}: {} local experiments, max {} qubits",
            distribution.my_rank,
            local.len(),
            max_qubits
        );

        if !controller.explicit_parallelization {
            if let Err(err) = parallelism.set_parallelization_experiments(
                local,
                &distribution,
                self.fabric.size(),
                |circ| self.backend.required_memory_mb(circ, noise),
            ) {
                return error_result(&err);
            }
        }

        let metadata = &mut result.metadata;
        metadata.insert("omp_enabled".to_string(), json!(parallel_enabled()));
        metadata.insert(
            "parallel_experiments".to_string(),
            json!(parallelism.parallel_experiments),
        );
        metadata.insert("max_memory_mb".to_string(), json!(parallelism.max_memory_mb));
        metadata.insert(
            "num_distributed_processes".to_string(),
            json!(distribution.num_processes),
        );
        metadata.insert("distributed_rank".to_string(), json!(distribution.my_rank));
        metadata.insert(
            "distributed_experiments".to_string(),
            json!(distribution.distributed_experiments),
        );
        metadata.insert(
            "distributed_experiments_group_id".to_string(),
            json!(distribution.group_id),
        );
        metadata.insert(
            "distributed_experiments_rank_in_group".to_string(),
            json!(distribution.rank_in_group),
        );

        // Experiment workers may spawn inner threads only when part of the
        // budget is left over
        if parallelism.parallel_experiments > 1
            && parallelism.parallel_experiments < parallelism.max_parallel_threads
        {
            parallelism.parallel_nested = true;
            metadata.insert("omp_nested".to_string(), json!(true));
        } else {
            parallelism.parallel_nested = false;
        }

        let ctx = ExperimentContext {
            backend: self.backend.as_ref(),
            config,
            controller: &controller,
            parallelism: &parallelism,
            distribution: &distribution,
        };
        run_experiments(&ctx, local, noise, &mut result.results);

        // Reduce experiment statuses: all completed, a mix, or none
        let mut all_failed = true;
        result.status = BatchStatus::Completed;
        for (index, experiment) in result.results.iter().enumerate() {
            if experiment.status == ExperimentStatus::Completed {
                all_failed = false;
            } else {
                result.status = BatchStatus::PartialCompleted;
                result
                    .message
                    .push_str(&format!(" [Experiment {}] {}", index, experiment.message));
            }
        }
        if all_failed {
            result.status = BatchStatus::Error;
        }

        result.metadata.insert(
            "time_taken".to_string(),
            json!(timer.elapsed().as_secs_f64()),
        );
        result
    }
}

fn parse_error_result(message: &str) -> BatchResult {
    let mut result = BatchResult::new(0);
    result.status = BatchStatus::Error;
    result.message = format!("Failed to load job: {}", message);
    result
}

fn error_result(err: &ControllerError) -> BatchResult {
    let mut result = BatchResult::new(0);
    result.status = BatchStatus::Error;
    result.message = err.to_string();
    result
}

// The pooled and the sequential loop are kept as separate code paths: the
// pool carries setup overhead even when a guard would keep it to a single
// worker.
#[cfg(feature = "parallel")]
fn run_experiments(
    ctx: &ExperimentContext<'_>,
    local: &[Circuit],
    noise: &NoiseModel,
    results: &mut [qbatch_core::ExperimentResult],
) {
    use rayon::prelude::*;

    if ctx.parallelism.parallel_experiments > 1 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(ctx.parallelism.parallel_experiments)
            .build()
        {
            Ok(pool) => {
                pool.install(|| {
                    results.par_iter_mut().enumerate().for_each(|(j, result)| {
                        // Private noise-model copy per experiment; the
                        // backend may mutate it
                        execute_experiment(ctx, local[j].clone(), noise.clone(), result);
                    });
                });
                return;
            }
            Err(err) => {
                log::warn!("experiment pool unavailable, running sequentially: {}", err)
            }
        }
    }
    for (j, result) in results.iter_mut().enumerate() {
        execute_experiment(ctx, local[j].clone(), noise.clone(), result);
    }
}

#[cfg(not(feature = "parallel"))]
fn run_experiments(
    ctx: &ExperimentContext<'_>,
    local: &[Circuit],
    noise: &NoiseModel,
    results: &mut [qbatch_core::ExperimentResult],
) {
    for (j, result) in results.iter_mut().enumerate() {
        execute_experiment(ctx, local[j].clone(), noise.clone(), result);
    }
}
