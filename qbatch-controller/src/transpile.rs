//! Transpile passes run before each experiment
//!
//! The controller applies two passes: barrier reduction always, qubit
//! truncation when enabled. Each pass may rewrite the circuit and the
//! noise model and record what it did in the experiment result metadata.

use crate::error::Result;
use qbatch_core::{Circuit, ExperimentResult, NoiseModel, OpKind, OpSet};
use serde_json::{json, Value};
use std::collections::HashMap;

/// A circuit rewrite applied before execution
pub trait TranspilePass {
    /// Read pass-specific switches out of the job config
    fn set_config(&mut self, config: &Value) {
        let _ = config;
    }

    /// Rewrite the circuit (and possibly the noise model) in place
    fn optimize_circuit(
        &self,
        circuit: &mut Circuit,
        noise: &mut NoiseModel,
        opset: &OpSet,
        result: &mut ExperimentResult,
    ) -> Result<()>;
}

/// Remove scheduling barriers
///
/// Barriers only constrain circuit rewriting; execution ignores them, so
/// they are dropped before the backend sees the circuit.
pub struct ReduceBarrier;

impl TranspilePass for ReduceBarrier {
    fn optimize_circuit(
        &self,
        circuit: &mut Circuit,
        _noise: &mut NoiseModel,
        _opset: &OpSet,
        _result: &mut ExperimentResult,
    ) -> Result<()> {
        circuit.ops.retain(|op| op.kind() != OpKind::Barrier);
        Ok(())
    }
}

/// Remap the qubits actually used onto a dense range
///
/// A circuit declared on many qubits but touching few of them shrinks to
/// the touched set, which directly lowers the backend's memory estimate.
/// The original indices are recorded in the result metadata.
pub struct TruncateQubits {
    active: bool,
}

impl Default for TruncateQubits {
    fn default() -> Self {
        Self { active: true }
    }
}

impl TranspilePass for TruncateQubits {
    fn set_config(&mut self, config: &Value) {
        if let Some(enabled) = config.get("truncate_enable").and_then(Value::as_bool) {
            self.active = enabled;
        }
    }

    fn optimize_circuit(
        &self,
        circuit: &mut Circuit,
        _noise: &mut NoiseModel,
        _opset: &OpSet,
        result: &mut ExperimentResult,
    ) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let used = circuit.used_qubits();
        if used.is_empty() || used.len() >= circuit.num_qubits {
            return Ok(());
        }

        let mapping: HashMap<u32, u32> = used
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new as u32))
            .collect();
        for op in &mut circuit.ops {
            for qubit in op.qubits.iter_mut() {
                *qubit = mapping[qubit];
            }
        }
        circuit.num_qubits = used.len();
        result
            .metadata
            .insert("truncate_qubits".to_string(), json!({ "active_qubits": used }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbatch_core::Op;

    fn circuit(num_qubits: usize, ops: Vec<Op>) -> Circuit {
        Circuit {
            num_qubits,
            ops,
            shots: 1,
            seed: 0,
            memory_slots: 0,
            header: Value::Null,
        }
    }

    #[test]
    fn test_barriers_removed() {
        let mut circ = circuit(
            2,
            vec![
                Op::new("h", &[0]),
                Op::new("barrier", &[0, 1]),
                Op::new("cx", &[0, 1]),
            ],
        );
        let mut noise = NoiseModel::default();
        let mut result = ExperimentResult::new();
        ReduceBarrier
            .optimize_circuit(&mut circ, &mut noise, &OpSet::new(), &mut result)
            .unwrap();
        assert_eq!(circ.len(), 2);
        assert!(circ.ops.iter().all(|op| op.kind() != OpKind::Barrier));
    }

    #[test]
    fn test_truncation_remaps_qubits() {
        let mut circ = circuit(
            8,
            vec![Op::new("h", &[2]), Op::new("cx", &[2, 7])],
        );
        let mut noise = NoiseModel::default();
        let mut result = ExperimentResult::new();
        TruncateQubits::default()
            .optimize_circuit(&mut circ, &mut noise, &OpSet::new(), &mut result)
            .unwrap();
        assert_eq!(circ.num_qubits, 2);
        assert_eq!(circ.ops[0].qubits.as_slice(), &[0]);
        assert_eq!(circ.ops[1].qubits.as_slice(), &[0, 1]);
        assert_eq!(
            result.metadata["truncate_qubits"]["active_qubits"],
            json!([2, 7])
        );
    }

    #[test]
    fn test_truncation_noop_when_dense() {
        let mut circ = circuit(2, vec![Op::new("h", &[0]), Op::new("x", &[1])]);
        let mut noise = NoiseModel::default();
        let mut result = ExperimentResult::new();
        TruncateQubits::default()
            .optimize_circuit(&mut circ, &mut noise, &OpSet::new(), &mut result)
            .unwrap();
        assert_eq!(circ.num_qubits, 2);
        assert!(result.metadata.get("truncate_qubits").is_none());
    }

    #[test]
    fn test_truncation_disabled_by_config() {
        let mut pass = TruncateQubits::default();
        pass.set_config(&json!({"truncate_enable": false}));
        let mut circ = circuit(8, vec![Op::new("h", &[5])]);
        let mut noise = NoiseModel::default();
        let mut result = ExperimentResult::new();
        pass.optimize_circuit(&mut circ, &mut noise, &OpSet::new(), &mut result)
            .unwrap();
        assert_eq!(circ.num_qubits, 8);
    }
}
