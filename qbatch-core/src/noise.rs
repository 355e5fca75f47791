//! Pauli-channel noise model attached to batch jobs
//!
//! The controller treats the model as opaque: it clones it once per
//! experiment so the backend may mutate its private copy, and it reads the
//! op-set fingerprint for validation. The sampling hook is used by
//! trajectory backends to inject errors after matching gates.

use crate::error::{CoreError, Result};
use crate::op::OpSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A noise model built from gate-attached Pauli error channels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseModel {
    /// Error channels, each attached to a set of gate names
    #[serde(default)]
    pub errors: Vec<PauliError>,
}

/// One Pauli error channel
///
/// After any gate whose name appears in `operations`, outcome `i` is drawn
/// with probability `probabilities[i]` and the Pauli `paulis[i]` is applied
/// to each qubit of the gate. Leftover probability mass is the identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PauliError {
    /// Gate names this channel attaches to
    #[serde(default)]
    pub operations: Vec<String>,

    /// Outcome probabilities, each in [0, 1], summing to at most 1
    #[serde(default)]
    pub probabilities: Vec<f64>,

    /// Pauli labels ("id", "x", "y", "z"), one per outcome
    #[serde(default)]
    pub paulis: Vec<String>,
}

impl NoiseModel {
    /// Parse the model out of a job config map
    ///
    /// A missing or null `noise_model` key means ideal execution.
    pub fn from_config(config: &Value) -> Result<Self> {
        match config.get("noise_model") {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => {
                let model: NoiseModel = serde_json::from_value(value.clone())?;
                model.validate()?;
                Ok(model)
            }
        }
    }

    /// Check probability and label consistency of every channel
    pub fn validate(&self) -> Result<()> {
        for error in &self.errors {
            if error.probabilities.len() != error.paulis.len() {
                return Err(CoreError::Validation(format!(
                    "noise channel has {} probabilities but {} paulis",
                    error.probabilities.len(),
                    error.paulis.len()
                )));
            }
            let mut total = 0.0;
            for &p in &error.probabilities {
                if !(0.0..=1.0).contains(&p) {
                    return Err(CoreError::Validation(format!(
                        "noise probability must be in [0,1], got {}",
                        p
                    )));
                }
                total += p;
            }
            if total > 1.0 + 1e-9 {
                return Err(CoreError::Validation(format!(
                    "noise probabilities sum to {}, expected at most 1",
                    total
                )));
            }
        }
        Ok(())
    }

    /// True when the model introduces no errors
    pub fn is_ideal(&self) -> bool {
        self.errors.is_empty()
    }

    /// Op-set fingerprint: the instructions this model can inject
    pub fn opset(&self) -> OpSet {
        self.errors
            .iter()
            .flat_map(|e| e.paulis.iter())
            .map(|label| normalize_label(label))
            .collect()
    }

    /// Channels attached to the named gate
    pub fn errors_for<'a>(&'a self, gate: &'a str) -> impl Iterator<Item = &'a PauliError> {
        self.errors
            .iter()
            .filter(move |e| e.operations.iter().any(|op| op.as_str() == gate))
    }
}

impl PauliError {
    /// Sample one outcome; `None` means no error (identity)
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        let r: f64 = rng.gen();
        let mut acc = 0.0;
        for (p, label) in self.probabilities.iter().zip(&self.paulis) {
            acc += p;
            if r < acc {
                let label = normalize_label(label);
                return if label == "id" { None } else { Some(label) };
            }
        }
        None
    }
}

fn normalize_label(label: &str) -> &str {
    match label {
        "i" | "I" | "id" => "id",
        "X" => "x",
        "Y" => "y",
        "Z" => "z",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn depolarizing(ops: &[&str], p: f64) -> PauliError {
        PauliError {
            operations: ops.iter().map(|s| s.to_string()).collect(),
            probabilities: vec![p / 3.0; 3],
            paulis: vec!["x".into(), "y".into(), "z".into()],
        }
    }

    #[test]
    fn test_ideal_when_absent() {
        let model = NoiseModel::from_config(&json!({})).unwrap();
        assert!(model.is_ideal());
        assert!(model.opset().is_empty());
    }

    #[test]
    fn test_parse_from_config() {
        let config = json!({
            "noise_model": {
                "errors": [{
                    "operations": ["x", "h"],
                    "probabilities": [0.1],
                    "paulis": ["z"]
                }]
            }
        });
        let model = NoiseModel::from_config(&config).unwrap();
        assert!(!model.is_ideal());
        assert!(model.opset().contains_op("z"));
        assert_eq!(model.errors_for("x").count(), 1);
        assert_eq!(model.errors_for("cx").count(), 0);
    }

    #[test]
    fn test_validate_rejects_bad_probabilities() {
        let model = NoiseModel {
            errors: vec![PauliError {
                operations: vec!["x".into()],
                probabilities: vec![0.8, 0.4],
                paulis: vec!["x".into(), "z".into()],
            }],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_length_mismatch() {
        let model = NoiseModel {
            errors: vec![PauliError {
                operations: vec!["x".into()],
                probabilities: vec![0.1],
                paulis: vec![],
            }],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_sample_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        let never = depolarizing(&["x"], 0.0);
        assert_eq!(never.sample(&mut rng), None);

        let always = PauliError {
            operations: vec!["x".into()],
            probabilities: vec![1.0],
            paulis: vec!["z".into()],
        };
        for _ in 0..16 {
            assert_eq!(always.sample(&mut rng), Some("z"));
        }
    }

    #[test]
    fn test_identity_outcome_is_none() {
        let mut rng = StdRng::seed_from_u64(1);
        let channel = PauliError {
            operations: vec!["h".into()],
            probabilities: vec![1.0],
            paulis: vec!["id".into()],
        };
        assert_eq!(channel.sample(&mut rng), None);
    }
}
