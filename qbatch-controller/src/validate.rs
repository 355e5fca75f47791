//! Circuit and noise-model validation against a backend
//!
//! Two checks: op-set containment (both the circuit and a non-ideal noise
//! model must only use instructions the backend supports) and the memory
//! budget. Either check can report by boolean or by error; the error names
//! the backend, the offending side, and the missing instructions.

use crate::error::{ControllerError, Result};
use qbatch_backend::Backend;
use qbatch_core::{Circuit, NoiseModel};

/// Check that the circuit and noise model only use supported instructions
///
/// With `throw_except` unset, an invalid pairing returns `Ok(false)`
/// instead of an error.
pub fn validate_backend(
    backend: &dyn Backend,
    circuit: &Circuit,
    noise: &NoiseModel,
    throw_except: bool,
) -> Result<bool> {
    let noise_valid = noise.is_ideal() || backend.opset().contains(&noise.opset());
    let circ_valid = backend.opset().contains(&circuit.opset());
    if noise_valid && circ_valid {
        return Ok(true);
    }
    if !throw_except {
        return Ok(false);
    }

    let mut msg = String::new();
    if !noise_valid {
        msg.push_str(&format!(
            "Noise model contains invalid instructions {} for \"{}\" backend",
            backend.opset().difference(&noise.opset()),
            backend.name()
        ));
    }
    if !circ_valid {
        msg.push_str(&format!(
            "Circuit contains invalid instructions {} for \"{}\" backend",
            backend.opset().difference(&circuit.opset()),
            backend.name()
        ));
    }
    Err(ControllerError::Validation(msg))
}

/// Check that one execution of the circuit fits the memory budget
///
/// A zero budget disables the check. The estimate is divided by the number
/// of processes cooperating on the experiment.
pub fn validate_memory_requirements(
    backend: &dyn Backend,
    circuit: &Circuit,
    noise: &NoiseModel,
    max_memory_mb: u64,
    num_process_per_experiment: usize,
    throw_except: bool,
) -> Result<bool> {
    if max_memory_mb == 0 {
        return Ok(true);
    }
    let required =
        backend.required_memory_mb(circuit, noise) / num_process_per_experiment.max(1) as u64;
    if max_memory_mb < required {
        if throw_except {
            return Err(ControllerError::Validation(format!(
                "Insufficient memory to run circuit \"{}\" using the {} backend.",
                circuit.name(),
                backend.name()
            )));
        }
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbatch_backend::StateVectorBackend;
    use qbatch_core::{Op, PauliError};
    use serde_json::json;

    fn circuit_with_ops(names: &[&str]) -> Circuit {
        Circuit {
            num_qubits: 2,
            ops: names.iter().map(|n| Op::new(*n, &[0])).collect(),
            shots: 1,
            seed: 0,
            memory_slots: 0,
            header: json!({"name": "test-circ"}),
        }
    }

    #[test]
    fn test_supported_circuit_passes() {
        let backend = StateVectorBackend::new();
        let circ = circuit_with_ops(&["h", "x", "measure"]);
        assert!(validate_backend(&backend, &circ, &NoiseModel::default(), true).unwrap());
    }

    #[test]
    fn test_unknown_instruction_named_in_error() {
        let backend = StateVectorBackend::new();
        let circ = circuit_with_ops(&["h", "frobnicate"]);
        let err = validate_backend(&backend, &circ, &NoiseModel::default(), true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Circuit contains invalid instructions"));
        assert!(msg.contains("frobnicate"));
        assert!(msg.contains("statevector"));
    }

    #[test]
    fn test_boolean_form() {
        let backend = StateVectorBackend::new();
        let circ = circuit_with_ops(&["frobnicate"]);
        assert!(!validate_backend(&backend, &circ, &NoiseModel::default(), false).unwrap());
    }

    #[test]
    fn test_invalid_noise_named_in_error() {
        let backend = StateVectorBackend::new();
        let circ = circuit_with_ops(&["h"]);
        let noise = NoiseModel {
            errors: vec![PauliError {
                operations: vec!["h".into()],
                probabilities: vec![0.5],
                paulis: vec!["kraus9".into()],
            }],
        };
        let err = validate_backend(&backend, &circ, &noise, true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Noise model contains invalid instructions"));
        assert!(msg.contains("kraus9"));
    }

    #[test]
    fn test_memory_check_disabled_by_zero_budget() {
        let backend = StateVectorBackend::new();
        let mut circ = circuit_with_ops(&["h"]);
        circ.num_qubits = 28;
        assert!(validate_memory_requirements(&backend, &circ, &NoiseModel::default(), 0, 1, true)
            .unwrap());
    }

    #[test]
    fn test_memory_check_names_circuit() {
        let backend = StateVectorBackend::new();
        let mut circ = circuit_with_ops(&["h"]);
        circ.num_qubits = 28; // 4096 MiB dense state
        let err = validate_memory_requirements(
            &backend,
            &circ,
            &NoiseModel::default(),
            1024,
            1,
            true,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("test-circ"));
        assert!(msg.contains("statevector"));
    }

    #[test]
    fn test_memory_check_divides_by_process_factor() {
        let backend = StateVectorBackend::new();
        let mut circ = circuit_with_ops(&["h"]);
        circ.num_qubits = 28; // 4096 MiB, fits once split across 4 ranks
        assert!(validate_memory_requirements(
            &backend,
            &circ,
            &NoiseModel::default(),
            1024,
            4,
            true
        )
        .unwrap());
    }
}
