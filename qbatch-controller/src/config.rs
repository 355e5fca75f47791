//! Controller configuration parsed from the job document
//!
//! Thread, shot and memory caps of zero mean "choose automatically". The
//! underscore-prefixed `_parallel_*` keys are debug overrides: the presence
//! of any of them turns explicit parallelization on, and the planners then
//! accept the given values verbatim (each coerced to at least 1).

use crate::error::{ControllerError, Result};
use crate::fabric::Fabric;
use crate::memory::MemoryProbe;
use crate::parallelism::{parallel_enabled, platform_threads, Parallelism};
use serde_json::Value;

/// Scheduling configuration for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Upper bound on total worker threads; 0 means platform default
    pub max_parallel_threads: usize,

    /// Upper bound on simultaneous experiments; 0 means auto
    pub max_parallel_experiments: usize,

    /// Upper bound on simultaneous shots per experiment; 0 means auto
    pub max_parallel_shots: usize,

    /// Host-memory budget in MiB; 0 means half of detected physical memory
    pub max_memory_mb: u64,

    /// Numerical tolerance forwarded to backend validators
    pub validation_threshold: f64,

    /// Run the qubit-truncation transpile pass
    pub truncate_qubits: bool,

    /// Keep per-process partial results instead of gathering them
    pub accept_distributed_results: bool,

    /// Accept the `parallel_*` values below verbatim
    pub explicit_parallelization: bool,

    /// Forced experiment parallelism when explicit
    pub parallel_experiments: usize,

    /// Forced shot parallelism when explicit
    pub parallel_shots: usize,

    /// Forced state-update parallelism when explicit
    pub parallel_state_update: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_parallel_threads: 0,
            max_parallel_experiments: 1,
            max_parallel_shots: 0,
            max_memory_mb: 0,
            validation_threshold: 1e-8,
            truncate_qubits: true,
            accept_distributed_results: true,
            explicit_parallelization: false,
            parallel_experiments: 1,
            parallel_shots: 1,
            parallel_state_update: 1,
        }
    }
}

impl ControllerConfig {
    /// Read the recognized keys out of a job config map
    ///
    /// Unknown keys are ignored; present keys with the wrong type are an
    /// error.
    pub fn from_config(config: &Value) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(v) = read_f64(config, "validation_threshold")? {
            if v <= 0.0 {
                return Err(ControllerError::InvalidConfig(
                    "validation_threshold must be positive".to_string(),
                ));
            }
            cfg.validation_threshold = v;
        }
        if let Some(v) = read_u64(config, "max_parallel_threads")? {
            cfg.max_parallel_threads = v as usize;
        }
        if let Some(v) = read_u64(config, "max_parallel_experiments")? {
            cfg.max_parallel_experiments = v as usize;
        }
        if let Some(v) = read_u64(config, "max_parallel_shots")? {
            cfg.max_parallel_shots = v as usize;
        }
        if let Some(v) = read_u64(config, "max_memory_mb")? {
            cfg.max_memory_mb = v;
        }
        if let Some(v) = read_bool(config, "truncate_qubits")? {
            cfg.truncate_qubits = v;
        }
        if let Some(v) = read_bool(config, "accept_distributed_results")? {
            cfg.accept_distributed_results = v;
        }

        // Debug overrides
        if let Some(v) = read_u64(config, "_parallel_experiments")? {
            cfg.parallel_experiments = v as usize;
            cfg.explicit_parallelization = true;
        }
        if let Some(v) = read_u64(config, "_parallel_shots")? {
            cfg.parallel_shots = v as usize;
            cfg.explicit_parallelization = true;
        }
        if let Some(v) = read_u64(config, "_parallel_state_update")? {
            cfg.parallel_state_update = v as usize;
            cfg.explicit_parallelization = true;
        }
        if cfg.explicit_parallelization {
            cfg.parallel_experiments = cfg.parallel_experiments.max(1);
            cfg.parallel_shots = cfg.parallel_shots.max(1);
            cfg.parallel_state_update = cfg.parallel_state_update.max(1);
        }

        Ok(cfg)
    }

    /// Resolve the automatic values into a parallelism state for one batch
    ///
    /// The thread budget falls back to the platform default, and a zero
    /// memory budget becomes half of the probed physical memory (the MIN
    /// across all ranks). Without thread support every level collapses
    /// to 1.
    pub fn resolve(&self, probe: &MemoryProbe, fabric: &dyn Fabric) -> Parallelism {
        let max_parallel_threads = if !parallel_enabled() {
            1
        } else if self.max_parallel_threads > 0 {
            self.max_parallel_threads
        } else {
            platform_threads().max(1)
        };

        let max_memory_mb = if self.max_memory_mb > 0 {
            self.max_memory_mb
        } else {
            (probe.host_memory_mb(fabric) + probe.device_memory_mb(fabric)) / 2
        };

        Parallelism {
            max_parallel_threads,
            max_parallel_experiments: self.max_parallel_experiments,
            max_parallel_shots: self.max_parallel_shots,
            max_memory_mb,
            parallel_experiments: if self.explicit_parallelization {
                self.parallel_experiments
            } else {
                1
            },
            parallel_shots: if self.explicit_parallelization {
                self.parallel_shots
            } else {
                1
            },
            parallel_state_update: if self.explicit_parallelization {
                self.parallel_state_update
            } else {
                1
            },
            parallel_nested: false,
            explicit: self.explicit_parallelization,
        }
    }
}

fn read_u64(config: &Value, key: &str) -> Result<Option<u64>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| {
            ControllerError::InvalidConfig(format!("{} must be a non-negative integer", key))
        }),
    }
}

fn read_f64(config: &Value, key: &str) -> Result<Option<f64>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            ControllerError::InvalidConfig(format!("{} must be a number", key))
        }),
    }
}

fn read_bool(config: &Value, key: &str) -> Result<Option<bool>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_bool().map(Some).ok_or_else(|| {
            ControllerError::InvalidConfig(format!("{} must be a boolean", key))
        }),
    }
}
