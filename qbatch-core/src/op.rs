//! Circuit operations and op-set fingerprints

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;

/// A single operation in a circuit
///
/// Operations are identified by name ("h", "cx", "measure", ...). The
/// controller never interprets gate semantics; it only needs the name for
/// op-set fingerprinting and the kind for transpilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
    /// Operation name, lowercase
    pub name: String,

    /// Qubits the operation acts on
    #[serde(default)]
    pub qubits: SmallVec<[u32; 2]>,

    /// Real-valued parameters (rotation angles etc.)
    #[serde(default)]
    pub params: Vec<f64>,

    /// Classical memory slots written by measurements
    #[serde(default)]
    pub memory: SmallVec<[u32; 2]>,

    /// String parameters (snapshot labels etc.)
    #[serde(default)]
    pub string_params: Vec<String>,
}

impl Op {
    /// Create a named operation on the given qubits
    pub fn new(name: impl Into<String>, qubits: &[u32]) -> Self {
        Self {
            name: name.into(),
            qubits: SmallVec::from_slice(qubits),
            params: Vec::new(),
            memory: SmallVec::new(),
            string_params: Vec::new(),
        }
    }

    /// Classify the operation for transpilation and execution
    pub fn kind(&self) -> OpKind {
        match self.name.as_str() {
            "barrier" => OpKind::Barrier,
            "measure" => OpKind::Measure,
            "reset" => OpKind::Reset,
            "snapshot" => OpKind::Snapshot,
            _ => OpKind::Gate,
        }
    }
}

/// Structural classification of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Scheduling barrier, removed before execution
    Barrier,
    /// Projective measurement into a classical memory slot
    Measure,
    /// Reset a qubit to |0>
    Reset,
    /// Record a named snapshot of simulator data
    Snapshot,
    /// Any unitary gate
    Gate,
}

/// Set of operation names a circuit contains or a backend supports
///
/// Used as a cheap compatibility fingerprint: a circuit is executable on a
/// backend iff the backend's op-set contains the circuit's op-set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpSet {
    ops: HashSet<String>,
}

impl OpSet {
    /// Create an empty op-set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an operation name
    pub fn insert(&mut self, name: impl Into<String>) {
        self.ops.insert(name.into());
    }

    /// Check if a single operation name is a member
    pub fn contains_op(&self, name: &str) -> bool {
        self.ops.contains(name)
    }

    /// Check if every member of `other` is also a member of this set
    pub fn contains(&self, other: &OpSet) -> bool {
        other.ops.iter().all(|op| self.ops.contains(op))
    }

    /// Return the members of `other` that are missing from this set
    ///
    /// The result is what makes `other` invalid for a backend whose op-set
    /// is `self`; it is empty exactly when `self.contains(other)`.
    pub fn difference(&self, other: &OpSet) -> OpSet {
        OpSet {
            ops: other
                .ops
                .iter()
                .filter(|op| !self.ops.contains(*op))
                .cloned()
                .collect(),
        }
    }

    /// Number of operation names in the set
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterate over the operation names
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().map(String::as_str)
    }
}

impl FromIterator<String> for OpSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for OpSet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self {
            ops: iter.into_iter().map(str::to_string).collect(),
        }
    }
}

impl fmt::Display for OpSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Sorted so error messages are stable
        let mut names: Vec<&str> = self.ops.iter().map(String::as_str).collect();
        names.sort_unstable();
        write!(f, "{{{}}}", names.join(", "))
    }
}
