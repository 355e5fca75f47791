//! Result containers for experiments and batches
//!
//! An `ExperimentResult` accumulates the data of one experiment; shot-parallel
//! sub-executions each own a private result that is merged into the
//! experiment's by destructive move. `BatchResult` collects the experiment
//! results of one job in input order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Which data channels the user requested
///
/// Parsed from the job config; unset keys keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataConfig {
    /// Return the counts object (default true)
    pub counts: bool,
    /// Return named snapshots (default true)
    pub snapshots: bool,
    /// Return the per-shot memory array (default false)
    pub memory: bool,
    /// Return the per-shot register array (default false)
    pub register: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            counts: true,
            snapshots: true,
            memory: false,
            register: false,
        }
    }
}

impl DataConfig {
    /// Read the channel switches out of a config map
    pub fn from_config(config: &Value) -> Self {
        let mut cfg = Self::default();
        if let Some(b) = config.get("counts").and_then(Value::as_bool) {
            cfg.counts = b;
        }
        if let Some(b) = config.get("snapshots").and_then(Value::as_bool) {
            cfg.snapshots = b;
        }
        if let Some(b) = config.get("memory").and_then(Value::as_bool) {
            cfg.memory = b;
        }
        if let Some(b) = config.get("register").and_then(Value::as_bool) {
            cfg.register = b;
        }
        cfg
    }
}

/// Aggregated output data of one experiment
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExperimentData {
    /// Measurement counts: bitstring -> occurrences
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub counts: HashMap<String, u64>,

    /// Named snapshots, one entry per recording
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub snapshots: HashMap<String, Vec<Value>>,

    /// Per-shot memory bitstrings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub memory: Vec<String>,

    /// Per-shot register bitstrings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub register: Vec<String>,

    #[serde(skip)]
    config: DataConfig,
}

impl ExperimentData {
    /// Record which channels the user requested
    pub fn set_config(&mut self, config: &Value) {
        self.config = DataConfig::from_config(config);
    }

    /// The active channel switches
    pub fn config(&self) -> DataConfig {
        self.config
    }

    /// Count one occurrence of a measured bitstring
    pub fn add_count(&mut self, bitstring: &str) {
        if self.config.counts {
            *self.counts.entry(bitstring.to_string()).or_insert(0) += 1;
        }
    }

    /// Append one per-shot memory bitstring
    pub fn add_memory(&mut self, bitstring: &str) {
        if self.config.memory {
            self.memory.push(bitstring.to_string());
        }
    }

    /// Append one per-shot register bitstring
    pub fn add_register(&mut self, bitstring: &str) {
        if self.config.register {
            self.register.push(bitstring.to_string());
        }
    }

    /// Append one snapshot under the given label
    pub fn add_snapshot(&mut self, label: &str, value: Value) {
        if self.config.snapshots {
            self.snapshots.entry(label.to_string()).or_default().push(value);
        }
    }

    /// Merge another data payload into this one
    ///
    /// Counts add, snapshot lists and the per-shot arrays extend. Takes
    /// `other` by value so no payload outlives the merge.
    pub fn combine(&mut self, other: ExperimentData) {
        for (bitstring, count) in other.counts {
            *self.counts.entry(bitstring).or_insert(0) += count;
        }
        for (label, mut values) in other.snapshots {
            self.snapshots.entry(label).or_default().append(&mut values);
        }
        self.memory.extend(other.memory);
        self.register.extend(other.register);
    }
}

/// Completion state of a single experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Not yet executed
    New,
    /// Executed to completion
    Completed,
    /// Execution failed; the message field carries the cause
    Error,
}

/// Result of one experiment on this process
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResult {
    /// Completion state
    pub status: ExperimentStatus,

    /// Aggregated output data
    pub data: ExperimentData,

    /// Shots actually executed on this process
    pub shots: u64,

    /// Base seed the experiment ran with
    pub seed: u64,

    /// Wall-clock execution time in seconds
    pub time_taken: f64,

    /// Circuit header passthrough
    #[serde(skip_serializing_if = "Value::is_null")]
    pub header: Value,

    /// Execution metadata (parallelism, distribution, transpilation)
    pub metadata: Map<String, Value>,

    /// Error message when status is `Error`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl ExperimentResult {
    /// Create an empty result awaiting execution
    pub fn new() -> Self {
        Self {
            status: ExperimentStatus::New,
            data: ExperimentData::default(),
            shots: 0,
            seed: 0,
            time_taken: 0.0,
            header: Value::Null,
            metadata: Map::new(),
            message: String::new(),
        }
    }

    /// Merge a shot-parallel bucket into this result by destructive move
    pub fn combine(&mut self, other: ExperimentResult) {
        self.data.combine(other.data);
    }
}

impl Default for ExperimentResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion state of a whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every experiment completed
    Completed,
    /// Some experiments completed, some errored
    PartialCompleted,
    /// No experiment completed, or the batch failed before execution
    Error,
}

/// Structured outcome of one batch job on this process
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Reduced status over all experiments
    pub status: BatchStatus,

    /// Experiment results in input order, restricted to the local range
    pub results: Vec<ExperimentResult>,

    /// Batch-level metadata
    pub metadata: Map<String, Value>,

    /// Job identifier passthrough
    pub qobj_id: String,

    /// Job header passthrough
    #[serde(skip_serializing_if = "Value::is_null")]
    pub header: Value,

    /// Accumulated error messages
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl BatchResult {
    /// Create a result sized for the given number of local experiments
    pub fn new(num_experiments: usize) -> Self {
        Self {
            status: BatchStatus::Completed,
            results: (0..num_experiments).map(|_| ExperimentResult::new()).collect(),
            metadata: Map::new(),
            qobj_id: String::new(),
            header: Value::Null,
            message: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data_with_counts(pairs: &[(&str, u64)]) -> ExperimentData {
        let mut data = ExperimentData::default();
        data.set_config(&json!({}));
        for (bits, n) in pairs {
            for _ in 0..*n {
                data.add_count(bits);
            }
        }
        data
    }

    #[test]
    fn test_data_config_defaults() {
        let cfg = DataConfig::from_config(&json!({}));
        assert!(cfg.counts);
        assert!(cfg.snapshots);
        assert!(!cfg.memory);
        assert!(!cfg.register);
    }

    #[test]
    fn test_data_config_overrides() {
        let cfg = DataConfig::from_config(&json!({"counts": false, "memory": true}));
        assert!(!cfg.counts);
        assert!(cfg.memory);
    }

    #[test]
    fn test_channels_respect_config() {
        let mut data = ExperimentData::default();
        data.set_config(&json!({"counts": false, "memory": true}));
        data.add_count("01");
        data.add_memory("01");
        assert!(data.counts.is_empty());
        assert_eq!(data.memory, vec!["01"]);
    }

    #[test]
    fn test_combine_adds_counts() {
        let mut a = data_with_counts(&[("00", 3), ("11", 1)]);
        let b = data_with_counts(&[("11", 2), ("01", 4)]);
        a.combine(b);
        assert_eq!(a.counts["00"], 3);
        assert_eq!(a.counts["11"], 3);
        assert_eq!(a.counts["01"], 4);
    }

    #[test]
    fn test_combine_is_associative() {
        let parts = [
            data_with_counts(&[("0", 1), ("1", 2)]),
            data_with_counts(&[("1", 5)]),
            data_with_counts(&[("0", 7), ("1", 1)]),
        ];

        // (a + b) + c
        let mut left = parts[0].clone();
        left.combine(parts[1].clone());
        left.combine(parts[2].clone());

        // a + (b + c)
        let mut tail = parts[1].clone();
        tail.combine(parts[2].clone());
        let mut right = parts[0].clone();
        right.combine(tail);

        // c + b + a
        let mut reversed = parts[2].clone();
        reversed.combine(parts[1].clone());
        reversed.combine(parts[0].clone());

        assert_eq!(left.counts, right.counts);
        assert_eq!(left.counts, reversed.counts);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(BatchStatus::PartialCompleted).unwrap(),
            json!("partial_completed")
        );
        assert_eq!(
            serde_json::to_value(ExperimentStatus::Completed).unwrap(),
            json!("completed")
        );
        assert_eq!(serde_json::to_value(BatchStatus::Error).unwrap(), json!("error"));
    }

    #[test]
    fn test_batch_result_sizing() {
        let result = BatchResult::new(3);
        assert_eq!(result.results.len(), 3);
        assert!(result
            .results
            .iter()
            .all(|r| r.status == ExperimentStatus::New));
    }
}
