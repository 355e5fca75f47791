//! Static work partitioning across processes
//!
//! Before any execution begins, the circuits of a batch are split across
//! process groups. A group is the set of ranks cooperating on one or more
//! experiments; when there are more groups than circuits, the surplus
//! groups contribute parallel shots to existing experiments instead.

use log::warn;
use qbatch_core::Circuit;

/// Where this rank sits in the partitioned batch
///
/// Derived once per job and read-only during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionState {
    /// Number of participating processes
    pub num_processes: usize,

    /// Rank of this process
    pub my_rank: usize,

    /// Processes cooperating on a single experiment
    pub num_process_per_experiment: usize,

    /// Number of experiment-groups
    pub distributed_experiments: usize,

    /// Group this rank belongs to
    pub group_id: usize,

    /// Rank of this process within its group
    pub rank_in_group: usize,

    /// First experiment index this group owns
    pub experiments_begin: usize,

    /// One past the last experiment index this group owns
    pub experiments_end: usize,

    /// Number of shot-slices the owned experiment is split into
    pub distributed_shots: usize,

    /// Which shot-slice this group owns
    pub distributed_shots_rank: usize,
}

impl DistributionState {
    /// The trivial partition of a single-process run
    pub fn single_process(num_circuits: usize) -> Self {
        Self {
            num_processes: 1,
            my_rank: 0,
            num_process_per_experiment: 1,
            distributed_experiments: 1,
            group_id: 0,
            rank_in_group: 0,
            experiments_begin: 0,
            experiments_end: num_circuits,
            distributed_shots: 1,
            distributed_shots_rank: 0,
        }
    }

    /// Partition `circuits` across `num_processes` ranks
    ///
    /// A circuit whose memory estimate exceeds the budget raises the
    /// process-per-experiment factor to the ceiling of the ratio, so that
    /// enough ranks share each state. When groups outnumber circuits, each
    /// group owns exactly one circuit and the surplus becomes shot
    /// parallelism; `distributed_experiments` is then clamped to the
    /// circuit count, but shot-ranks keep the pre-clamp quotient.
    pub fn plan<F>(
        circuits: &[Circuit],
        my_rank: usize,
        num_processes: usize,
        max_memory_mb: u64,
        required_memory_mb: F,
    ) -> Self
    where
        F: Fn(&Circuit) -> u64,
    {
        let mut state = Self::single_process(circuits.len());
        state.num_processes = num_processes.max(1);
        state.my_rank = my_rank;
        if circuits.is_empty() {
            state.experiments_end = 0;
            return state;
        }

        let mut nppe = 1usize;
        if max_memory_mb > 0 {
            for circ in circuits {
                let mb = required_memory_mb(circ);
                if mb > max_memory_mb {
                    let needed = ((mb + max_memory_mb - 1) / max_memory_mb) as usize;
                    nppe = nppe.max(needed);
                }
            }
        }
        if nppe > state.num_processes {
            warn!(
                "a circuit wants {} cooperating processes but only {} exist",
                nppe, state.num_processes
            );
            nppe = state.num_processes;
        }
        state.num_process_per_experiment = nppe;

        let mut distributed_experiments = state.num_processes / nppe;
        state.group_id = my_rank / nppe;
        state.rank_in_group = my_rank % nppe;

        if circuits.len() < distributed_experiments {
            state.experiments_begin = state.group_id % circuits.len();
            state.experiments_end = state.experiments_begin + 1;
            let mut shots = distributed_experiments / circuits.len();
            if state.group_id % circuits.len() < distributed_experiments % circuits.len() {
                shots += 1;
            }
            state.distributed_shots = shots;
            state.distributed_shots_rank = state.group_id / circuits.len();
            distributed_experiments = circuits.len();
        } else {
            // Leftover ranks outside any full group get an empty range
            state.experiments_begin =
                (circuits.len() * state.group_id / distributed_experiments).min(circuits.len());
            state.experiments_end =
                (circuits.len() * (state.group_id + 1) / distributed_experiments)
                    .min(circuits.len());
            if state.experiments_begin > state.experiments_end {
                state.experiments_begin = state.experiments_end;
            }
            state.distributed_shots = 1;
            state.distributed_shots_rank = 0;
        }
        state.distributed_experiments = distributed_experiments;
        state
    }

    /// Range of experiment indices this group owns
    pub fn local_range(&self) -> std::ops::Range<usize> {
        self.experiments_begin..self.experiments_end
    }

    /// Number of experiments this group owns
    pub fn num_local(&self) -> usize {
        self.experiments_end - self.experiments_begin
    }

    /// Shots of this rank's slice out of `shots` total
    ///
    /// With `D` slices and slice index `r`, the count is
    /// `floor(S(r+1)/D) - floor(Sr/D)`, so the slices sum to `S` exactly.
    pub fn local_shots(&self, shots: u64) -> u64 {
        let d = self.distributed_shots as u64;
        let r = self.distributed_shots_rank as u64;
        shots * (r + 1) / d - shots * r / d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn circuits(n: usize) -> Vec<Circuit> {
        (0..n)
            .map(|i| Circuit {
                num_qubits: 2,
                ops: Vec::new(),
                shots: 100,
                seed: i as u64,
                memory_slots: 0,
                header: Value::Null,
            })
            .collect()
    }

    #[test]
    fn test_single_process_owns_everything() {
        let circs = circuits(5);
        let state = DistributionState::plan(&circs, 0, 1, 1000, |_| 10);
        assert_eq!(state.local_range(), 0..5);
        assert_eq!(state.num_process_per_experiment, 1);
        assert_eq!(state.distributed_shots, 1);
    }

    #[test]
    fn test_oversized_circuit_raises_process_factor() {
        // 1500 MiB against a 1000 MiB budget needs two cooperating ranks
        let circs = circuits(1);
        for rank in 0..2 {
            let state = DistributionState::plan(&circs, rank, 2, 1000, |_| 1500);
            assert_eq!(state.num_process_per_experiment, 2);
            assert_eq!(state.distributed_experiments, 1);
            assert_eq!(state.group_id, 0);
            assert_eq!(state.rank_in_group, rank);
            assert_eq!(state.local_range(), 0..1);
            assert_eq!(state.distributed_shots, 1);
        }
    }

    #[test]
    fn test_more_groups_than_circuits_distributes_shots() {
        // Four single-rank groups over two circuits: each group owns one
        // circuit, two shot-slices per circuit
        let circs = circuits(2);
        for rank in 0..4 {
            let state = DistributionState::plan(&circs, rank, 4, 1000, |_| 10);
            assert_eq!(state.experiments_begin, rank % 2);
            assert_eq!(state.num_local(), 1);
            assert_eq!(state.distributed_shots, 2);
            assert_eq!(state.distributed_shots_rank, rank / 2);
            // Clamped to the circuit count after shot-ranks were derived
            assert_eq!(state.distributed_experiments, 2);
        }
    }

    #[test]
    fn test_six_processes_two_circuits() {
        let circs = circuits(2);
        let mut totals = [0u64; 2];
        for rank in 0..6 {
            let state = DistributionState::plan(&circs, rank, 6, 1000, |_| 10);
            assert_eq!(state.distributed_shots, 3);
            assert_eq!(state.distributed_experiments, 2);
            let slice = state.local_shots(100);
            assert!(slice == 33 || slice == 34);
            totals[state.experiments_begin] += slice;
        }
        // Three slices per circuit, summing to the declared shots
        assert_eq!(totals, [100, 100]);
    }

    #[test]
    fn test_even_split_without_shot_distribution() {
        // Four groups over eight circuits: contiguous two-circuit ranges
        let circs = circuits(8);
        let mut covered = Vec::new();
        for rank in 0..4 {
            let state = DistributionState::plan(&circs, rank, 4, 1000, |_| 10);
            assert_eq!(state.distributed_shots, 1);
            assert_eq!(state.num_local(), 2);
            covered.extend(state.local_range());
        }
        assert_eq!(covered, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_uneven_split_covers_all_circuits() {
        let circs = circuits(5);
        let mut covered = Vec::new();
        for rank in 0..3 {
            let state = DistributionState::plan(&circs, rank, 3, 1000, |_| 10);
            covered.extend(state.local_range());
        }
        covered.sort_unstable();
        assert_eq!(covered, (0..5).collect::<Vec<_>>());
    }

    #[test]
    fn test_local_shots_formula() {
        let mut state = DistributionState::single_process(1);
        state.distributed_shots = 3;
        let counts: Vec<u64> = (0..3)
            .map(|r| {
                state.distributed_shots_rank = r;
                state.local_shots(100)
            })
            .collect();
        assert_eq!(counts.iter().sum::<u64>(), 100);
        assert_eq!(counts, vec![33, 33, 34]);
    }

    #[test]
    fn test_extra_shot_slices_for_low_groups() {
        // Five single-rank groups over two circuits: 5/2 = 2 slices each,
        // plus one extra for the group whose id mod 2 is below 5 mod 2
        let circs = circuits(2);
        let state0 = DistributionState::plan(&circs, 0, 5, 1000, |_| 10);
        let state1 = DistributionState::plan(&circs, 1, 5, 1000, |_| 10);
        assert_eq!(state0.distributed_shots, 3);
        assert_eq!(state1.distributed_shots, 2);
    }
}
