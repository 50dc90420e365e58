//! Step Profiling
//!
//! Deterministic per-stage counters for the simulation pipeline. Counters,
//! not wall-clock timers: numbers are reproducible across runs and
//! platforms, which keeps profiling output diffable in replay tests.

/// Work counters for a single simulation step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Candidate pairs reported by the broadphase
    pub pairs: usize,
    /// Manifolds produced by the narrowphase
    pub manifolds: usize,
    /// Contact points handed to the solver
    pub contacts: usize,
    /// Solver sweeps executed
    pub solver_iterations: usize,
    /// BVH leaves re-inserted after escaping their fat AABB
    pub reinserted_leaves: usize,
}

/// Accumulates [`StepStats`] across frames.
#[derive(Clone, Debug, Default)]
pub struct PhysicsProfiler {
    /// Last recorded step
    pub last: StepStats,
    /// Component-wise peak over all recorded steps
    pub peak: StepStats,
    /// Number of recorded steps
    pub frames: u64,
    total_pairs: u64,
    total_contacts: u64,
}

impl PhysicsProfiler {
    /// Create an empty profiler
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one step's counters.
    pub fn record(&mut self, stats: StepStats) {
        self.last = stats;
        self.peak.pairs = self.peak.pairs.max(stats.pairs);
        self.peak.manifolds = self.peak.manifolds.max(stats.manifolds);
        self.peak.contacts = self.peak.contacts.max(stats.contacts);
        self.peak.solver_iterations = self.peak.solver_iterations.max(stats.solver_iterations);
        self.peak.reinserted_leaves = self.peak.reinserted_leaves.max(stats.reinserted_leaves);
        self.frames += 1;
        self.total_pairs += stats.pairs as u64;
        self.total_contacts += stats.contacts as u64;
    }

    /// Mean broadphase pairs per recorded step
    pub fn average_pairs(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.total_pairs as f64 / self.frames as f64
        }
    }

    /// Mean contact points per recorded step
    pub fn average_contacts(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.total_contacts as f64 / self.frames as f64
        }
    }

    /// Forget everything recorded so far
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_peak_and_average() {
        let mut profiler = PhysicsProfiler::new();
        profiler.record(StepStats {
            pairs: 4,
            contacts: 8,
            ..Default::default()
        });
        profiler.record(StepStats {
            pairs: 10,
            contacts: 2,
            ..Default::default()
        });

        assert_eq!(profiler.frames, 2);
        assert_eq!(profiler.peak.pairs, 10);
        assert_eq!(profiler.peak.contacts, 8);
        assert!((profiler.average_pairs() - 7.0).abs() < 1e-9);
        assert!((profiler.average_contacts() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset() {
        let mut profiler = PhysicsProfiler::new();
        profiler.record(StepStats {
            pairs: 3,
            ..Default::default()
        });
        profiler.reset();
        assert_eq!(profiler.frames, 0);
        assert_eq!(profiler.peak, StepStats::default());
    }
}
