use std::collections::BTreeMap;

use cdt_core::MoveKind;
use serde::{Deserialize, Serialize};

/// Per-kind attempted and successful move counters.
///
/// Counters only grow, and `attempted[kind] >= successful[kind]` holds after
/// every recorded attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStatistics {
    attempted: [u64; 5],
    successful: [u64; 5],
}

impl MoveStatistics {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one attempt of `kind`.
    pub fn record(&mut self, kind: MoveKind, accepted: bool) {
        self.attempted[kind.index()] += 1;
        if accepted {
            self.successful[kind.index()] += 1;
        }
    }

    /// Attempts recorded for `kind`.
    pub fn attempted(&self, kind: MoveKind) -> u64 {
        self.attempted[kind.index()]
    }

    /// Successful attempts recorded for `kind`.
    pub fn successful(&self, kind: MoveKind) -> u64 {
        self.successful[kind.index()]
    }

    /// Sum of attempts over all kinds.
    pub fn total_attempted(&self) -> u64 {
        self.attempted.iter().sum()
    }

    /// Sum of successes over all kinds.
    pub fn total_successful(&self) -> u64 {
        self.successful.iter().sum()
    }

    /// Fraction of successful attempts for `kind`, zero when never attempted.
    pub fn acceptance_rate(&self, kind: MoveKind) -> f64 {
        let attempted = self.attempted(kind);
        if attempted == 0 {
            0.0
        } else {
            self.successful(kind) as f64 / attempted as f64
        }
    }

    /// Serialisable per-kind view keyed by move label.
    pub fn by_kind(&self) -> BTreeMap<String, KindStatistics> {
        MoveKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.label().to_string(),
                    KindStatistics {
                        attempted: self.attempted(*kind),
                        successful: self.successful(*kind),
                        acceptance_rate: self.acceptance_rate(*kind),
                    },
                )
            })
            .collect()
    }
}

/// Counters and rate for a single move kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindStatistics {
    /// Attempts recorded.
    pub attempted: u64,
    /// Accepted attempts.
    pub successful: u64,
    /// `successful / attempted`.
    pub acceptance_rate: f64,
}
