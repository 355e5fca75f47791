//! Execute a small two-experiment batch and print the structured result.
//!
//! Run with: cargo run --example run_batch

use qbatch::{BatchController, StateVectorBackend};
use serde_json::json;
use std::sync::Arc;

fn main() {
    let job = json!({
        "qobj_id": "demo-batch",
        "header": {"origin": "run_batch example"},
        "config": {
            "shots": 1024,
            "seed": 42,
            "max_parallel_threads": 4,
            "noise_model": {
                "errors": [{
                    "operations": ["cx"],
                    "probabilities": [0.01, 0.01, 0.01],
                    "paulis": ["x", "y", "z"]
                }]
            }
        },
        "experiments": [
            {
                "header": {"name": "bell"},
                "config": {"memory_slots": 2},
                "instructions": [
                    {"name": "h", "qubits": [0]},
                    {"name": "cx", "qubits": [0, 1]},
                    {"name": "measure", "qubits": [0, 1], "memory": [0, 1]}
                ]
            },
            {
                "header": {"name": "ghz"},
                "config": {"memory_slots": 3},
                "instructions": [
                    {"name": "h", "qubits": [0]},
                    {"name": "cx", "qubits": [0, 1]},
                    {"name": "cx", "qubits": [1, 2]},
                    {"name": "measure", "qubits": [0, 1, 2], "memory": [0, 1, 2]}
                ]
            }
        ]
    });

    let controller = BatchController::new(Arc::new(StateVectorBackend::new()));
    let result = controller.execute(&job);

    println!("{}", serde_json::to_string_pretty(&result).expect("result serializes"));
}
