//! Reference state-vector backend
//!
//! Evolves one dense amplitude vector per shot, sampling noise and
//! measurement outcomes from an RNG seeded by the caller. Aggregate data
//! (counts, per-shot memory, snapshots) is written into the experiment
//! result through its channel-gated accessors.
//!
//! Shot-level parallelism belongs to the controller; this backend only
//! parallelizes amplitude updates, within the thread budget the controller
//! hands it via `RunConfig::parallel_state_update`.

use crate::backend::{Backend, RunConfig};
use crate::error::{BackendError, Result};
use num_complex::Complex64;
use qbatch_core::{Circuit, ExperimentResult, NoiseModel, Op, OpKind, OpSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

type C = Complex64;

/// Dense amplitudes above this qubit count use parallel updates
const PARALLEL_QUBIT_THRESHOLD: usize = 14;

/// Largest circuit the dense representation accepts
const MAX_QUBITS: usize = 30;

/// Dense state-vector backend
pub struct StateVectorBackend {
    name: String,
    opset: OpSet,
}

impl StateVectorBackend {
    /// Create the backend with its full op-set
    pub fn new() -> Self {
        Self {
            name: "statevector".to_string(),
            opset: supported_ops(),
        }
    }
}

impl Default for StateVectorBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn supported_ops() -> OpSet {
    [
        "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "rx", "ry", "rz", "u", "cx", "cy",
        "cz", "swap", "barrier", "measure", "reset", "snapshot",
    ]
    .into_iter()
    .collect()
}

impl Backend for StateVectorBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn opset(&self) -> &OpSet {
        &self.opset
    }

    fn required_memory_mb(&self, circuit: &Circuit, _noise: &NoiseModel) -> u64 {
        // 2^n amplitudes, 16 bytes each
        let bytes = 16u64
            .checked_shl(circuit.num_qubits as u32)
            .unwrap_or(u64::MAX);
        bytes >> 20
    }

    fn run(
        &self,
        circuit: &Circuit,
        noise: &NoiseModel,
        config: &RunConfig,
        shots: u64,
        seed: u64,
        result: &mut ExperimentResult,
    ) -> Result<()> {
        if circuit.num_qubits > MAX_QUBITS {
            return Err(BackendError::Execution(format!(
                "circuit has {} qubits, the dense representation supports at most {}",
                circuit.num_qubits, MAX_QUBITS
            )));
        }
        for error in &noise.errors {
            let total: f64 = error.probabilities.iter().sum();
            if total > 1.0 + config.validation_threshold {
                return Err(BackendError::Validation(format!(
                    "noise probabilities sum to {}, expected at most 1",
                    total
                )));
            }
        }

        let dim = 1usize << circuit.num_qubits;
        let parallel = config.parallel_state_update > 1
            && circuit.num_qubits >= PARALLEL_QUBIT_THRESHOLD;
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..shots {
            let mut state = vec![C::new(0.0, 0.0); dim];
            state[0] = C::new(1.0, 0.0);
            let mut creg = vec![false; circuit.memory_slots];

            for op in &circuit.ops {
                match op.kind() {
                    OpKind::Barrier => {}
                    OpKind::Measure => {
                        for (k, &qubit) in op.qubits.iter().enumerate() {
                            let outcome = measure_qubit(&mut state, qubit, &mut rng)?;
                            if let Some(&slot) = op.memory.get(k) {
                                if let Some(bit) = creg.get_mut(slot as usize) {
                                    *bit = outcome;
                                }
                            }
                        }
                    }
                    OpKind::Reset => {
                        for &qubit in &op.qubits {
                            let outcome = measure_qubit(&mut state, qubit, &mut rng)?;
                            if outcome {
                                apply_single_qubit(&mut state, qubit, pauli_matrix("x"), parallel);
                            }
                        }
                    }
                    OpKind::Snapshot => {
                        let label = op
                            .string_params
                            .first()
                            .map(String::as_str)
                            .unwrap_or("snapshot");
                        result
                            .data
                            .add_snapshot(label, serde_json::json!(probabilities(&state)));
                    }
                    OpKind::Gate => {
                        apply_gate(&mut state, op, parallel)?;
                        for error in noise.errors_for(&op.name) {
                            if let Some(label) = error.sample(&mut rng) {
                                for &qubit in &op.qubits {
                                    apply_single_qubit(
                                        &mut state,
                                        qubit,
                                        pauli_matrix(label),
                                        parallel,
                                    );
                                }
                            }
                        }
                    }
                }
            }

            if !creg.is_empty() {
                let bits = bitstring(&creg);
                result.data.add_count(&bits);
                result.data.add_memory(&bits);
                result.data.add_register(&bits);
            }
        }
        Ok(())
    }
}

/// Render the classical register with slot 0 rightmost
fn bitstring(creg: &[bool]) -> String {
    creg.iter()
        .rev()
        .map(|&b| if b { '1' } else { '0' })
        .collect()
}

fn probabilities(state: &[C]) -> Vec<f64> {
    state.iter().map(|amp| amp.norm_sqr()).collect()
}

fn apply_gate(state: &mut [C], op: &Op, parallel: bool) -> Result<()> {
    match op.name.as_str() {
        "cx" => {
            let (control, target) = two_qubit_args(op)?;
            apply_cx(state, control, target);
        }
        "cy" => {
            let (control, target) = two_qubit_args(op)?;
            apply_cy(state, control, target);
        }
        "cz" => {
            let (control, target) = two_qubit_args(op)?;
            apply_cz(state, control, target);
        }
        "swap" => {
            let (a, b) = two_qubit_args(op)?;
            apply_swap(state, a, b);
        }
        _ => {
            let qubit = one_qubit_arg(op)?;
            let matrix = single_qubit_matrix(&op.name, &op.params).ok_or_else(|| {
                BackendError::Execution(format!("unsupported operation \"{}\"", op.name))
            })?;
            apply_single_qubit(state, qubit, matrix, parallel);
        }
    }
    Ok(())
}

fn one_qubit_arg(op: &Op) -> Result<u32> {
    match op.qubits.as_slice() {
        &[q] => Ok(q),
        _ => Err(BackendError::Execution(format!(
            "operation \"{}\" expects one qubit",
            op.name
        ))),
    }
}

fn two_qubit_args(op: &Op) -> Result<(u32, u32)> {
    match op.qubits.as_slice() {
        &[a, b] => Ok((a, b)),
        _ => Err(BackendError::Execution(format!(
            "operation \"{}\" expects two qubits",
            op.name
        ))),
    }
}

fn pauli_matrix(label: &str) -> [[C; 2]; 2] {
    let zero = C::new(0.0, 0.0);
    let one = C::new(1.0, 0.0);
    let i = C::new(0.0, 1.0);
    match label {
        "x" => [[zero, one], [one, zero]],
        "y" => [[zero, -i], [i, zero]],
        "z" => [[one, zero], [zero, -one]],
        _ => [[one, zero], [zero, one]],
    }
}

fn single_qubit_matrix(name: &str, params: &[f64]) -> Option<[[C; 2]; 2]> {
    let zero = C::new(0.0, 0.0);
    let one = C::new(1.0, 0.0);
    let i = C::new(0.0, 1.0);
    let sqrt2_inv = C::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
    match name {
        "id" => Some([[one, zero], [zero, one]]),
        "x" => Some([[zero, one], [one, zero]]),
        "y" => Some([[zero, -i], [i, zero]]),
        "z" => Some([[one, zero], [zero, -one]]),
        "h" => Some([[sqrt2_inv, sqrt2_inv], [sqrt2_inv, -sqrt2_inv]]),
        "s" => Some([[one, zero], [zero, i]]),
        "sdg" => Some([[one, zero], [zero, -i]]),
        "t" => Some([[one, zero], [zero, C::from_polar(1.0, std::f64::consts::FRAC_PI_4)]]),
        "tdg" => Some([[one, zero], [zero, C::from_polar(1.0, -std::f64::consts::FRAC_PI_4)]]),
        "rx" => {
            let half = params.first()? / 2.0;
            let (sin, cos) = half.sin_cos();
            Some([[C::new(cos, 0.0), C::new(0.0, -sin)], [C::new(0.0, -sin), C::new(cos, 0.0)]])
        }
        "ry" => {
            let half = params.first()? / 2.0;
            let (sin, cos) = half.sin_cos();
            Some([[C::new(cos, 0.0), C::new(-sin, 0.0)], [C::new(sin, 0.0), C::new(cos, 0.0)]])
        }
        "rz" => {
            let half = params.first()? / 2.0;
            Some([[C::from_polar(1.0, -half), zero], [zero, C::from_polar(1.0, half)]])
        }
        "u" => {
            if params.len() < 3 {
                return None;
            }
            let (theta, phi, lambda) = (params[0], params[1], params[2]);
            let (sin, cos) = (theta / 2.0).sin_cos();
            Some([
                [C::new(cos, 0.0), -C::from_polar(sin, lambda)],
                [C::from_polar(sin, phi), C::from_polar(cos, phi + lambda)],
            ])
        }
        _ => None,
    }
}

fn apply_single_qubit(state: &mut [C], target: u32, matrix: [[C; 2]; 2], parallel: bool) {
    let half = 1usize << target;
    let block = half << 1;
    if parallel {
        state
            .par_chunks_mut(block)
            .for_each(|chunk| apply_in_block(chunk, half, matrix));
    } else {
        for chunk in state.chunks_mut(block) {
            apply_in_block(chunk, half, matrix);
        }
    }
}

#[inline]
fn apply_in_block(chunk: &mut [C], half: usize, m: [[C; 2]; 2]) {
    for idx in 0..half {
        let a = chunk[idx];
        let b = chunk[idx + half];
        chunk[idx] = m[0][0] * a + m[0][1] * b;
        chunk[idx + half] = m[1][0] * a + m[1][1] * b;
    }
}

fn apply_cx(state: &mut [C], control: u32, target: u32) {
    let cmask = 1usize << control;
    let tmask = 1usize << target;
    for idx in 0..state.len() {
        if idx & cmask != 0 && idx & tmask == 0 {
            state.swap(idx, idx | tmask);
        }
    }
}

fn apply_cy(state: &mut [C], control: u32, target: u32) {
    let cmask = 1usize << control;
    let tmask = 1usize << target;
    let i = C::new(0.0, 1.0);
    for idx in 0..state.len() {
        if idx & cmask != 0 && idx & tmask == 0 {
            let j = idx | tmask;
            let a = state[idx];
            let b = state[j];
            state[idx] = -i * b;
            state[j] = i * a;
        }
    }
}

fn apply_cz(state: &mut [C], control: u32, target: u32) {
    let cmask = 1usize << control;
    let tmask = 1usize << target;
    for (idx, amp) in state.iter_mut().enumerate() {
        if idx & cmask != 0 && idx & tmask != 0 {
            *amp = -*amp;
        }
    }
}

fn apply_swap(state: &mut [C], a: u32, b: u32) {
    let amask = 1usize << a;
    let bmask = 1usize << b;
    for idx in 0..state.len() {
        if idx & amask != 0 && idx & bmask == 0 {
            state.swap(idx, idx ^ amask ^ bmask);
        }
    }
}

fn measure_qubit<R: Rng + ?Sized>(state: &mut [C], qubit: u32, rng: &mut R) -> Result<bool> {
    let mask = 1usize << qubit;
    let p1: f64 = state
        .iter()
        .enumerate()
        .filter(|&(idx, _)| idx & mask != 0)
        .map(|(_, amp)| amp.norm_sqr())
        .sum();
    let outcome = rng.gen::<f64>() < p1;
    let p = if outcome { p1 } else { 1.0 - p1 };
    if p <= 0.0 {
        return Err(BackendError::Execution(format!(
            "measurement of qubit {} collapsed onto a zero-probability outcome",
            qubit
        )));
    }
    let norm = p.sqrt();
    for (idx, amp) in state.iter_mut().enumerate() {
        if (idx & mask != 0) == outcome {
            *amp /= norm;
        } else {
            *amp = C::new(0.0, 0.0);
        }
    }
    Ok(outcome)
}
