//! Backend capability interface
//!
//! A backend is the pluggable subsystem that evolves independent Monte-Carlo
//! trajectories of a circuit and writes aggregate data into an experiment
//! result. The controller is non-polymorphic; it drives any object
//! implementing [`Backend`].

use crate::Result;
use qbatch_core::{Circuit, ExperimentResult, NoiseModel, OpSet};
use serde_json::Value;

/// Per-run configuration handed to a backend by the controller
///
/// Carries the raw job config map plus the two values the controller
/// resolves on the backend's behalf: the validation threshold and the
/// thread budget for per-shot state updates.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Raw job config map, read-only
    pub config: Value,

    /// Numerical tolerance for backend-side validation
    pub validation_threshold: f64,

    /// Thread budget for the backend's inner state-update parallelism
    pub parallel_state_update: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            config: Value::Null,
            validation_threshold: 1e-8,
            parallel_state_update: 1,
        }
    }
}

/// A quantum execution backend
pub trait Backend: Send + Sync {
    /// Human-readable backend identifier
    fn name(&self) -> &str;

    /// The set of operations this backend supports
    fn opset(&self) -> &OpSet;

    /// Estimate of the memory one execution of `circuit` requires, in MiB
    fn required_memory_mb(&self, circuit: &Circuit, noise: &NoiseModel) -> u64;

    /// Evolve `shots` independent trajectories of `circuit` under `noise`,
    /// accumulating aggregate data into `result`
    ///
    /// The RNG is seeded from `seed`, so identical inputs reproduce
    /// identical data. The noise model reference is private to this
    /// invocation; the backend may rely on it not being shared with a
    /// concurrent run.
    fn run(
        &self,
        circuit: &Circuit,
        noise: &NoiseModel,
        config: &RunConfig,
        shots: u64,
        seed: u64,
        result: &mut ExperimentResult,
    ) -> Result<()>;
}
