use serde::{Deserialize, Serialize};

use crate::app::{LinkConfig, PickError};

mod dobot;
mod dry_run;
pub mod protocol;

pub use dobot::DobotLink;
pub use dry_run::DryRunLink;

/// Cartesian pose in the arm's base frame (mm, degrees)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub r: f64,
}

impl Pose {
    pub const fn new(x: f64, y: f64, z: f64, r: f64) -> Self {
        Self { x, y, z, r }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointParams {
    pub velocity: [f64; 4],
    pub acceleration: [f64; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectStatus {
    NoError,
    NotFound,
    Occupied,
}

/// Every command a link accepts, as seen by the arm
#[derive(Clone, Debug, PartialEq)]
pub enum LinkCommand {
    ClearQueue,
    HomeParams(Pose),
    JointParams(JointParams),
    CommonParams(f64, f64),
    StartQueue,
    Move(Pose),
    Suction(bool),
    GetPose,
    Disconnect,
}

impl LinkCommand {
    pub fn is_motion(&self) -> bool {
        matches!(self, Self::Move(_) | Self::Suction(_))
    }
}

pub trait RobotLink {
    fn connect(&mut self) -> ConnectStatus;

    fn clear_queue(&mut self) -> Result<(), PickError>;

    fn set_home_params(&mut self, home: &Pose) -> Result<(), PickError>;

    fn set_ptp_joint_params(&mut self, params: &JointParams) -> Result<(), PickError>;

    fn set_ptp_common_params(
        &mut self,
        velocity_ratio: f64,
        acceleration_ratio: f64,
    ) -> Result<(), PickError>;

    fn start_queue(&mut self) -> Result<(), PickError>;

    /// Linear move; returns once the arm has reached the target
    fn move_to(&mut self, target: &Pose) -> Result<(), PickError>;

    /// Suction cup on or off; returns once the arm has applied it
    fn set_suction(&mut self, on: bool) -> Result<(), PickError>;

    fn pose(&mut self) -> Result<Pose, PickError>;

    fn disconnect(&mut self);
}

pub fn build_link(config: &LinkConfig) -> Box<dyn RobotLink> {
    match config {
        LinkConfig::Dobot(path) => Box::new(DobotLink::new(path.clone())),
        LinkConfig::DryRun => Box::new(DryRunLink::new()),
    }
}
