//! Batch job document parsing

use crate::circuit::Circuit;
use crate::error::{CoreError, Result};
use serde_json::Value;

/// A decoded batch job: identifier, header, config map and circuits
#[derive(Debug, Clone)]
pub struct Job {
    /// Job identifier, forwarded onto the result as `qobj_id`
    pub id: String,

    /// Opaque header payload forwarded onto the result
    pub header: Value,

    /// Free-form configuration map shared by all experiments
    pub config: Value,

    /// Circuits in input order
    pub experiments: Vec<Circuit>,
}

impl Job {
    /// Decode a job document
    ///
    /// # Errors
    ///
    /// Returns an error if the `experiments` array is missing or any
    /// experiment fails to parse.
    pub fn from_value(value: &Value) -> Result<Self> {
        let id = value
            .get("qobj_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let header = value.get("header").cloned().unwrap_or(Value::Null);
        let config = value
            .get("config")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        let experiments = value
            .get("experiments")
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::Parse("job has no experiments array".to_string()))?
            .iter()
            .map(|exp| Circuit::from_experiment(exp, &config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id,
            header,
            config,
            experiments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_job() {
        let job = Job::from_value(&json!({
            "qobj_id": "job-1",
            "header": {"backend_name": "statevector"},
            "config": {"shots": 10, "seed": 5},
            "experiments": [
                {"instructions": [{"name": "h", "qubits": [0]}]},
                {"instructions": [{"name": "x", "qubits": [0]}]}
            ]
        }))
        .unwrap();
        assert_eq!(job.id, "job-1");
        assert_eq!(job.experiments.len(), 2);
        assert_eq!(job.experiments[0].shots, 10);
        assert_eq!(job.experiments[1].seed, 5);
    }

    #[test]
    fn test_missing_experiments_is_parse_error() {
        let err = Job::from_value(&json!({"qobj_id": "x"})).unwrap_err();
        assert!(matches!(err, CoreError::Parse(_)));
    }

    #[test]
    fn test_bad_experiment_propagates() {
        let result = Job::from_value(&json!({
            "experiments": [{"config": {"shots": 0}, "instructions": []}]
        }));
        assert!(result.is_err());
    }
}
