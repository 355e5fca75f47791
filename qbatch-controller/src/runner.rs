//! Single-experiment execution
//!
//! Runs one experiment on this rank: transpile, validate, plan shot
//! parallelism, invoke the backend once or in shot-parallel buckets, and
//! merge. Errors are caught at the experiment boundary and recorded in the
//! result, so a failing experiment never aborts its siblings.

use crate::config::ControllerConfig;
use crate::distribution::DistributionState;
use crate::error::{ControllerError, Result};
use crate::parallelism::{CircuitParallelism, Parallelism};
use crate::transpile::{ReduceBarrier, TranspilePass, TruncateQubits};
use crate::validate;
use qbatch_backend::{Backend, RunConfig};
use qbatch_core::{Circuit, ExperimentResult, ExperimentStatus, NoiseModel};
use serde_json::{json, Value};
use std::time::Instant;

/// Read-only state shared by every experiment of a batch
pub(crate) struct ExperimentContext<'a> {
    pub backend: &'a dyn Backend,
    pub config: &'a Value,
    pub controller: &'a ControllerConfig,
    pub parallelism: &'a Parallelism,
    pub distribution: &'a DistributionState,
}

/// Execute one experiment, recording outcome or error in `result`
pub(crate) fn execute_experiment(
    ctx: &ExperimentContext<'_>,
    mut circuit: Circuit,
    mut noise: NoiseModel,
    result: &mut ExperimentResult,
) {
    let timer = Instant::now();
    result.data.set_config(ctx.config);

    match run_experiment(ctx, &mut circuit, &mut noise, result) {
        Ok(()) => {
            result.status = ExperimentStatus::Completed;
            result.header = circuit.header.clone();
            result.time_taken = timer.elapsed().as_secs_f64();
        }
        Err(err) => {
            result.status = ExperimentStatus::Error;
            result.message = err.to_string();
        }
    }
}

fn run_experiment(
    ctx: &ExperimentContext<'_>,
    circuit: &mut Circuit,
    noise: &mut NoiseModel,
    result: &mut ExperimentResult,
) -> Result<()> {
    ReduceBarrier.optimize_circuit(circuit, noise, ctx.backend.opset(), result)?;
    if ctx.controller.truncate_qubits {
        let mut truncate = TruncateQubits::default();
        truncate.set_config(ctx.config);
        truncate.optimize_circuit(circuit, noise, ctx.backend.opset(), result)?;
    }

    validate::validate_backend(ctx.backend, circuit, noise, true)?;
    validate::validate_memory_requirements(
        ctx.backend,
        circuit,
        noise,
        ctx.parallelism.max_memory_mb,
        ctx.distribution.num_process_per_experiment,
        true,
    )?;

    let circuit_par = if ctx.controller.explicit_parallelization {
        CircuitParallelism {
            parallel_shots: ctx.parallelism.parallel_shots,
            parallel_state_update: ctx.parallelism.parallel_state_update,
        }
    } else {
        ctx.parallelism.circuit_parallelism(circuit, ctx.distribution, |c| {
            ctx.backend.required_memory_mb(c, noise)
        })?
    };

    let shots = ctx.distribution.local_shots(circuit.shots);
    let run_config = RunConfig {
        config: ctx.config.clone(),
        validation_threshold: ctx.controller.validation_threshold,
        parallel_state_update: circuit_par.parallel_state_update,
    };

    if circuit_par.parallel_shots <= 1 {
        ctx.backend
            .run(circuit, noise, &run_config, shots, circuit.seed, result)
            .map_err(ControllerError::from)?;
    } else {
        // Floor split; the remainder goes one-per-bucket from index 0
        let buckets = circuit_par.parallel_shots;
        let mut subshots = vec![shots / buckets as u64; buckets];
        for extra in subshots.iter_mut().take((shots % buckets as u64) as usize) {
            *extra += 1;
        }

        // Shot threads may spawn state-update threads, unless the
        // experiment level already nests
        if !ctx.parallelism.parallel_nested && circuit_par.parallel_state_update > 1 {
            result.metadata.insert("omp_nested".to_string(), json!(true));
        }

        let outcomes = run_shot_buckets(ctx, circuit, noise, &run_config, &subshots);
        for (_, message) in &outcomes {
            if !message.is_empty() {
                return Err(ControllerError::Backend(message.clone()));
            }
        }
        for (bucket, _) in outcomes {
            result.combine(bucket);
        }
    }

    result.shots = shots;
    result.seed = circuit.seed;
    result
        .metadata
        .insert("parallel_shots".to_string(), json!(circuit_par.parallel_shots));
    result.metadata.insert(
        "parallel_state_update".to_string(),
        json!(circuit_par.parallel_state_update),
    );
    if ctx.distribution.distributed_shots > 1 {
        result.metadata.insert(
            "distributed_shots".to_string(),
            json!(ctx.distribution.distributed_shots),
        );
    }
    Ok(())
}

fn run_one_bucket(
    ctx: &ExperimentContext<'_>,
    circuit: &Circuit,
    noise: &NoiseModel,
    run_config: &RunConfig,
    subshots: u64,
    index: usize,
) -> (ExperimentResult, String) {
    let mut bucket = ExperimentResult::new();
    bucket.data.set_config(&run_config.config);
    // Each invocation gets a private noise model and seed + bucket index
    let bucket_noise = noise.clone();
    let seed = circuit.seed + index as u64;
    match ctx
        .backend
        .run(circuit, &bucket_noise, run_config, subshots, seed, &mut bucket)
    {
        Ok(()) => (bucket, String::new()),
        Err(err) => (bucket, err.to_string()),
    }
}

#[cfg(feature = "parallel")]
fn run_shot_buckets(
    ctx: &ExperimentContext<'_>,
    circuit: &Circuit,
    noise: &NoiseModel,
    run_config: &RunConfig,
    subshots: &[u64],
) -> Vec<(ExperimentResult, String)> {
    use rayon::prelude::*;

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(subshots.len())
        .build()
    {
        Ok(pool) => pool,
        Err(err) => {
            log::warn!("shot pool unavailable, running buckets sequentially: {}", err);
            return subshots
                .iter()
                .enumerate()
                .map(|(i, &sub)| run_one_bucket(ctx, circuit, noise, run_config, sub, i))
                .collect();
        }
    };
    pool.install(|| {
        subshots
            .par_iter()
            .enumerate()
            .map(|(i, &sub)| run_one_bucket(ctx, circuit, noise, run_config, sub, i))
            .collect()
    })
}

#[cfg(not(feature = "parallel"))]
fn run_shot_buckets(
    ctx: &ExperimentContext<'_>,
    circuit: &Circuit,
    noise: &NoiseModel,
    run_config: &RunConfig,
    subshots: &[u64],
) -> Vec<(ExperimentResult, String)> {
    subshots
        .iter()
        .enumerate()
        .map(|(i, &sub)| run_one_bucket(ctx, circuit, noise, run_config, sub, i))
        .collect()
}
