//! Core data model for the qbatch batch simulator
//!
//! This crate defines everything the controller and the backends exchange:
//! circuits and their op-set fingerprints, the Pauli-channel noise model,
//! the batch job document, and the experiment/batch result containers.
//! It carries no execution logic.

pub mod circuit;
pub mod error;
pub mod job;
pub mod noise;
pub mod op;
pub mod result;

pub use circuit::Circuit;
pub use error::{CoreError, Result};
pub use job::Job;
pub use noise::{NoiseModel, PauliError};
pub use op::{Op, OpKind, OpSet};
pub use result::{
    BatchResult, BatchStatus, DataConfig, ExperimentData, ExperimentResult, ExperimentStatus,
};
