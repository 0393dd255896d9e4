//! Pachner move kinds and their fixed effect on the tracked counts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Foliation-preserving Pachner move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveKind {
    /// (2,3) move: two tetrahedra sharing a face become three.
    TwoThree,
    /// (3,2) move: inverse of the (2,3) move.
    ThreeTwo,
    /// (2,6) move: inserts a vertex into a spacelike triangle.
    TwoSix,
    /// (6,2) move: removes a vertex of degree six from a time slice.
    SixTwo,
    /// (4,4) move: flips a spacelike edge shared by four tetrahedra.
    FourFour,
}

impl MoveKind {
    /// Every move kind in canonical order.
    pub const ALL: [MoveKind; 5] = [
        MoveKind::TwoThree,
        MoveKind::ThreeTwo,
        MoveKind::TwoSix,
        MoveKind::SixTwo,
        MoveKind::FourFour,
    ];

    /// Kinds attempted once, unconditionally, before the main loop starts.
    pub const SEEDED: [MoveKind; 3] = [MoveKind::TwoThree, MoveKind::ThreeTwo, MoveKind::TwoSix];

    /// Position of the kind within [`MoveKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            MoveKind::TwoThree => 0,
            MoveKind::ThreeTwo => 1,
            MoveKind::TwoSix => 2,
            MoveKind::SixTwo => 3,
            MoveKind::FourFour => 4,
        }
    }

    /// Conventional `(a,b)` label used in logs and reports.
    pub fn label(self) -> &'static str {
        match self {
            MoveKind::TwoThree => "(2,3)",
            MoveKind::ThreeTwo => "(3,2)",
            MoveKind::TwoSix => "(2,6)",
            MoveKind::SixTwo => "(6,2)",
            MoveKind::FourFour => "(4,4)",
        }
    }

    /// Change applied to the tracked counts when a move of this kind is accepted.
    pub fn delta(self) -> CountDelta {
        MOVE_DELTAS[self.index()]
    }

    /// Move that undoes this one.
    pub fn inverse(self) -> MoveKind {
        match self {
            MoveKind::TwoThree => MoveKind::ThreeTwo,
            MoveKind::ThreeTwo => MoveKind::TwoThree,
            MoveKind::TwoSix => MoveKind::SixTwo,
            MoveKind::SixTwo => MoveKind::TwoSix,
            MoveKind::FourFour => MoveKind::FourFour,
        }
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Signed change to the configuration counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountDelta {
    /// Change in timelike edges (N1_TL).
    pub timelike_edges: i64,
    /// Change in (3,1) plus (1,3) simplices (N3_31).
    pub three_one: i64,
    /// Change in (2,2) simplices (N3_22).
    pub two_two: i64,
}

impl CountDelta {
    /// Delta that leaves every count untouched.
    pub const ZERO: CountDelta = CountDelta {
        timelike_edges: 0,
        three_one: 0,
        two_two: 0,
    };

    /// Whether applying the delta changes nothing.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Negated delta.
    pub fn reversed(&self) -> CountDelta {
        CountDelta {
            timelike_edges: -self.timelike_edges,
            three_one: -self.three_one,
            two_two: -self.two_two,
        }
    }
}

/// Per-kind count deltas, indexed by [`MoveKind::index`].
///
/// Both the dynamical ratio and the commit path read this one table.
pub const MOVE_DELTAS: [CountDelta; 5] = [
    CountDelta {
        timelike_edges: 1,
        three_one: 0,
        two_two: 1,
    },
    CountDelta {
        timelike_edges: -1,
        three_one: 0,
        two_two: -1,
    },
    CountDelta {
        timelike_edges: 2,
        three_one: 4,
        two_two: 0,
    },
    CountDelta {
        timelike_edges: -2,
        three_one: -4,
        two_two: 0,
    },
    CountDelta::ZERO,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_moves_cancel() {
        for kind in MoveKind::ALL {
            assert_eq!(kind.delta(), kind.inverse().delta().reversed());
            assert_eq!(kind.inverse().inverse(), kind);
        }
    }

    #[test]
    fn index_matches_canonical_order() {
        for (position, kind) in MoveKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), position);
        }
    }

    #[test]
    fn only_four_four_is_neutral() {
        let neutral: Vec<_> = MoveKind::ALL
            .iter()
            .filter(|kind| kind.delta().is_zero())
            .collect();
        assert_eq!(neutral, vec![&MoveKind::FourFour]);
    }
}
