//! Batch scheduler for the qbatch simulator
//!
//! The controller accepts a batch of circuit experiments, decides how to
//! parallelize it at three levels (experiments, shots per experiment, and
//! per-shot state updates), partitions work across processes when a
//! distributed fabric is attached, enforces the memory budget, drives a
//! backend for every work unit, and aggregates the pieces into a single
//! structured result.
//!
//! Experiment and shot parallelism are mutually exclusive: enabling the
//! former disables the latter. State-update parallelism is available in
//! both cases, conservatively sized from whatever the outer level leaves
//! of the thread budget.
//!
//! # Example
//!
//! ```no_run
//! use qbatch_backend::StateVectorBackend;
//! use qbatch_controller::BatchController;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let controller = BatchController::new(Arc::new(StateVectorBackend::new()));
//! let result = controller.execute(&json!({
//!     "qobj_id": "demo",
//!     "config": {"shots": 1024},
//!     "experiments": [{"instructions": [{"name": "h", "qubits": [0]}]}]
//! }));
//! ```

pub mod config;
pub mod controller;
pub mod distribution;
pub mod error;
pub mod fabric;
pub mod memory;
pub mod parallelism;
mod runner;
pub mod transpile;
pub mod validate;

pub use config::ControllerConfig;
pub use controller::BatchController;
pub use distribution::DistributionState;
pub use error::{ControllerError, Result};
pub use fabric::{Fabric, SoloFabric, StaticFabric};
pub use memory::{Accelerator, MemoryProbe};
pub use parallelism::{CircuitParallelism, Parallelism};
pub use transpile::{ReduceBarrier, TranspilePass, TruncateQubits};
