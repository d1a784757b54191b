use serde::{Deserialize, Serialize};

use crate::robot::{JointParams, Pose};
use crate::store::Detection;

mod sequencer;

pub use sequencer::MotionSequencer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MotionState {
    Disconnected,
    Homed,
    Approaching,
    Picking,
    Transiting,
    Dropping,
    Retracted,
}

impl MotionState {
    /// The only state reachable from this one
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Disconnected => Some(Self::Homed),
            Self::Homed => Some(Self::Approaching),
            Self::Approaching => Some(Self::Picking),
            Self::Picking => Some(Self::Transiting),
            Self::Transiting => Some(Self::Dropping),
            Self::Dropping => Some(Self::Retracted),
            Self::Retracted => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MotionStep {
    /// Linear move; rotation comes from the pose read before motion starts
    MoveTo { x: f64, y: f64, z: f64 },
    EndEffector(bool),
}

impl MotionStep {
    fn move_to(x: f64, y: f64, z: f64) -> Self {
        Self::MoveTo { x, y, z }
    }
}

/// Where a motion run ended up: its final state and the last commanded pose
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MotionReport {
    pub state: MotionState,
    pub pose: Option<Pose>,
}

/// Steps that take the arm into `state`
#[derive(Clone, Debug, PartialEq)]
pub struct Phase {
    pub state: MotionState,
    pub steps: Vec<MotionStep>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    pub home: Pose,
    pub joint: JointParams,
    pub velocity_ratio: f64,
    pub acceleration_ratio: f64,
    /// Blocking wait after starting the queue, for homing to finish
    pub settle_ms: u64,
    pub hover_z: f64,
    pub grasp_z: f64,
    pub release_z: f64,
    pub drop_x: f64,
    pub drop_y: f64,
    pub retract: Pose,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            home: Pose::new(159.9386, -3.1038, -23.3520, -2.0209),
            joint: JointParams {
                velocity: [100.0; 4],
                acceleration: [100.0; 4],
            },
            velocity_ratio: 100.0,
            acceleration_ratio: 100.0,
            settle_ms: 5000,
            hover_z: -5.0959,
            grasp_z: -42.7519,
            release_z: -38.7919,
            drop_x: 235.6014,
            drop_y: -194.2816,
            retract: Pose::new(160.0321, -3.1056, -23.3732, 0.0),
        }
    }
}

/// Motion after homing: approach, pick, carry to the drop bin, release, retract
pub fn plan(detection: &Detection, settings: &MotionSettings) -> Vec<Phase> {
    let (x, y) = (detection.x, detection.y);
    let (dx, dy) = (settings.drop_x, settings.drop_y);
    vec![
        Phase {
            state: MotionState::Approaching,
            steps: vec![MotionStep::move_to(x, y, detection.z)],
        },
        Phase {
            state: MotionState::Picking,
            steps: vec![
                MotionStep::move_to(x, y, settings.hover_z),
                MotionStep::EndEffector(true),
                MotionStep::move_to(x, y, settings.grasp_z),
                // Re-assert after the descent
                MotionStep::EndEffector(true),
            ],
        },
        Phase {
            state: MotionState::Transiting,
            steps: vec![MotionStep::move_to(dx, dy, settings.hover_z)],
        },
        Phase {
            state: MotionState::Dropping,
            steps: vec![
                MotionStep::move_to(dx, dy, settings.release_z),
                MotionStep::EndEffector(false),
                MotionStep::move_to(dx, dy, settings.hover_z),
            ],
        },
        Phase {
            state: MotionState::Retracted,
            steps: vec![MotionStep::move_to(
                settings.retract.x,
                settings.retract.y,
                settings.retract.z,
            )],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(d: &Detection) -> Vec<MotionStep> {
        plan(d, &MotionSettings::default())
            .into_iter()
            .flat_map(|p| p.steps)
            .collect()
    }

    #[test]
    fn phases_follow_state_order() {
        let phases = plan(&Detection::new(100.0, 50.0, -26.0, 0.0), &MotionSettings::default());
        let mut state = MotionState::Homed;
        for phase in &phases {
            assert_eq!(state.next(), Some(phase.state));
            state = phase.state;
        }
        assert_eq!(state, MotionState::Retracted);
        assert_eq!(state.next(), None);
    }

    #[test]
    fn pick_then_drop_then_retract() {
        let s = MotionSettings::default();
        let all = steps(&Detection::new(100.0, 50.0, -26.0, 0.0));
        let moves: Vec<(f64, f64)> = all
            .iter()
            .filter_map(|s| match s {
                MotionStep::MoveTo { x, y, .. } => Some((*x, *y)),
                _ => None,
            })
            .collect();

        let first_pick = moves.iter().position(|m| *m == (100.0, 50.0)).unwrap();
        let first_drop = moves.iter().position(|m| *m == (s.drop_x, s.drop_y)).unwrap();
        let retract = moves
            .iter()
            .position(|m| *m == (s.retract.x, s.retract.y))
            .unwrap();
        assert!(first_pick < first_drop && first_drop < retract);
        assert_eq!(retract, moves.len() - 1);
        assert!(moves[first_pick..first_drop].iter().all(|m| *m == (100.0, 50.0)));
    }

    #[test]
    fn one_engage_before_grasp_and_one_release_after_drop() {
        let s = MotionSettings::default();
        let all = steps(&Detection::new(100.0, 50.0, -26.0, 0.0));
        let grasp = all
            .iter()
            .position(|m| *m == MotionStep::move_to(100.0, 50.0, s.grasp_z))
            .unwrap();
        let engages_before = all[..grasp]
            .iter()
            .filter(|m| **m == MotionStep::EndEffector(true))
            .count();
        assert_eq!(engages_before, 1);

        let release = all
            .iter()
            .position(|m| *m == MotionStep::move_to(s.drop_x, s.drop_y, s.release_z))
            .unwrap();
        let releases: Vec<usize> = all
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == MotionStep::EndEffector(false))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(releases, vec![release + 1]);
    }
}
