//! Quantum circuit representation and experiment-document parsing

use crate::error::{CoreError, Result};
use crate::op::{Op, OpKind, OpSet};
use serde::Deserialize;
use serde_json::Value;

/// One experiment of a batch job: an ordered operation sequence plus the
/// shot count and RNG seed controlling its Monte-Carlo execution
///
/// The header is an opaque payload forwarded verbatim onto the experiment
/// result.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// Number of qubits the circuit acts on
    pub num_qubits: usize,

    /// Ordered operation sequence
    pub ops: Vec<Op>,

    /// Number of independent Monte-Carlo repetitions
    pub shots: u64,

    /// Base RNG seed; shot-parallel sub-executions use `seed + i`
    pub seed: u64,

    /// Width of the classical memory register
    pub memory_slots: usize,

    /// Opaque header payload forwarded to the result
    pub header: Value,
}

#[derive(Deserialize)]
struct ExperimentJson {
    #[serde(default)]
    header: Value,
    #[serde(default)]
    config: Value,
    #[serde(default)]
    instructions: Vec<Op>,
}

impl Circuit {
    /// Parse one experiment out of a job document
    ///
    /// Per-experiment config keys override the job-level `global` config.
    /// A missing shot count defaults to 1024; a missing seed is drawn from
    /// entropy so the seed recorded in the result always reproduces the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be decoded, the shot count is
    /// zero, or an instruction addresses a qubit outside the declared range.
    pub fn from_experiment(value: &Value, global: &Value) -> Result<Self> {
        let exp: ExperimentJson = serde_json::from_value(value.clone())?;

        let shots = read_u64(&exp.config, "shots")
            .or_else(|| read_u64(global, "shots"))
            .unwrap_or(1024);
        if shots == 0 {
            return Err(CoreError::Validation(
                "shots must be a positive integer".to_string(),
            ));
        }

        let seed = read_u64(&exp.config, "seed")
            .or_else(|| read_u64(global, "seed"))
            .unwrap_or_else(rand::random);

        let min_qubits = exp
            .instructions
            .iter()
            .flat_map(|op| op.qubits.iter().copied())
            .max()
            .map(|q| q as usize + 1)
            .unwrap_or(1);
        let num_qubits = match read_u64(&exp.config, "n_qubits") {
            Some(n) => {
                let n = n as usize;
                if n < min_qubits {
                    return Err(CoreError::Validation(format!(
                        "circuit declares {} qubits but addresses qubit {}",
                        n,
                        min_qubits - 1
                    )));
                }
                n
            }
            None => min_qubits,
        };

        let min_memory = exp
            .instructions
            .iter()
            .flat_map(|op| op.memory.iter().copied())
            .max()
            .map(|m| m as usize + 1)
            .unwrap_or(0);
        let memory_slots = match read_u64(&exp.config, "memory_slots") {
            Some(m) => (m as usize).max(min_memory),
            None => min_memory,
        };

        Ok(Self {
            num_qubits,
            ops: exp.instructions,
            shots,
            seed,
            memory_slots,
            header: exp.header,
        })
    }

    /// Op-set fingerprint of the circuit
    pub fn opset(&self) -> OpSet {
        self.ops.iter().map(|op| op.name.as_str()).collect()
    }

    /// Sorted list of the qubits actually referenced by an operation
    pub fn used_qubits(&self) -> Vec<u32> {
        let mut qubits: Vec<u32> = self
            .ops
            .iter()
            .flat_map(|op| op.qubits.iter().copied())
            .collect();
        qubits.sort_unstable();
        qubits.dedup();
        qubits
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if the circuit has no operations
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Check if the circuit contains any measurement
    pub fn has_measurements(&self) -> bool {
        self.ops.iter().any(|op| op.kind() == OpKind::Measure)
    }

    /// Circuit name from the header, if any
    pub fn name(&self) -> &str {
        self.header
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

fn read_u64(config: &Value, key: &str) -> Option<u64> {
    config.get(key).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_experiment() {
        let exp = json!({
            "header": {"name": "bell"},
            "config": {"n_qubits": 2, "shots": 100, "seed": 42, "memory_slots": 2},
            "instructions": [
                {"name": "h", "qubits": [0]},
                {"name": "cx", "qubits": [0, 1]},
                {"name": "measure", "qubits": [0, 1], "memory": [0, 1]}
            ]
        });
        let circ = Circuit::from_experiment(&exp, &json!({})).unwrap();
        assert_eq!(circ.num_qubits, 2);
        assert_eq!(circ.shots, 100);
        assert_eq!(circ.seed, 42);
        assert_eq!(circ.memory_slots, 2);
        assert_eq!(circ.len(), 3);
        assert_eq!(circ.name(), "bell");
        assert!(circ.has_measurements());
    }

    #[test]
    fn test_defaults_from_global_config() {
        let exp = json!({"instructions": [{"name": "x", "qubits": [3]}]});
        let global = json!({"shots": 7, "seed": 9});
        let circ = Circuit::from_experiment(&exp, &global).unwrap();
        assert_eq!(circ.shots, 7);
        assert_eq!(circ.seed, 9);
        // Inferred from the highest addressed qubit
        assert_eq!(circ.num_qubits, 4);
        assert_eq!(circ.memory_slots, 0);
    }

    #[test]
    fn test_zero_shots_rejected() {
        let exp = json!({"config": {"shots": 0}, "instructions": []});
        assert!(Circuit::from_experiment(&exp, &json!({})).is_err());
    }

    #[test]
    fn test_undeclared_qubit_rejected() {
        let exp = json!({
            "config": {"n_qubits": 1},
            "instructions": [{"name": "cx", "qubits": [0, 1]}]
        });
        assert!(Circuit::from_experiment(&exp, &json!({})).is_err());
    }

    #[test]
    fn test_opset_and_used_qubits() {
        let exp = json!({
            "instructions": [
                {"name": "h", "qubits": [0]},
                {"name": "h", "qubits": [5]},
                {"name": "cx", "qubits": [0, 5]}
            ]
        });
        let circ = Circuit::from_experiment(&exp, &json!({})).unwrap();
        let opset = circ.opset();
        assert_eq!(opset.len(), 2);
        assert!(opset.contains_op("h"));
        assert!(opset.contains_op("cx"));
        assert_eq!(circ.used_qubits(), vec![0, 5]);
    }
}
