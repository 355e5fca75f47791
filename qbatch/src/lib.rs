//! Memory-aware batch execution of quantum circuit experiments
//!
//! `qbatch` schedules batches of circuits ("experiments") onto a pluggable
//! simulation backend. The controller parallelizes at three levels
//! (experiments, shots per experiment, per-shot state updates), partitions
//! work across processes when a distributed fabric is present, and enforces
//! host-memory budgets throughout.
//!
//! The crates:
//! - [`qbatch_core`]: circuits, op-sets, noise models, jobs, results
//! - [`qbatch_backend`]: the backend capability trait and a reference
//!   state-vector backend
//! - [`qbatch_controller`]: the batch scheduler itself
//!
//! # Example
//!
//! ```
//! use qbatch::{BatchController, StateVectorBackend};
//! use std::sync::Arc;
//!
//! let controller = BatchController::new(Arc::new(StateVectorBackend::new()));
//! let result = controller.execute(&serde_json::json!({
//!     "qobj_id": "bell",
//!     "config": {"shots": 100, "seed": 17},
//!     "experiments": [{
//!         "config": {"memory_slots": 2},
//!         "instructions": [
//!             {"name": "h", "qubits": [0]},
//!             {"name": "cx", "qubits": [0, 1]},
//!             {"name": "measure", "qubits": [0, 1], "memory": [0, 1]}
//!         ]
//!     }]
//! }));
//! assert_eq!(result.results.len(), 1);
//! ```

pub use qbatch_backend::{Backend, BackendError, RunConfig, StateVectorBackend};
pub use qbatch_controller::{
    Accelerator, BatchController, ControllerConfig, ControllerError, DistributionState, Fabric,
    MemoryProbe, Parallelism, SoloFabric, StaticFabric,
};
pub use qbatch_core::{
    BatchResult, BatchStatus, Circuit, DataConfig, ExperimentData, ExperimentResult,
    ExperimentStatus, Job, NoiseModel, Op, OpKind, OpSet, PauliError,
};
