use crate::{
    app::PickError,
    robot::{ConnectStatus, JointParams, LinkCommand, Pose, RobotLink},
};

/// Logs and records commands instead of driving an arm
pub struct DryRunLink {
    status: ConnectStatus,
    connected: bool,
    pose: Pose,
    history: Vec<LinkCommand>,
}

impl DryRunLink {
    const PARKED: Pose = Pose::new(160.0321, -3.1056, -23.3732, 0.0);

    pub fn new() -> Self {
        log::info!("Creating DryRunLink");
        Self::with_status(ConnectStatus::NoError)
    }

    /// A link whose connect attempt reports `status`
    pub fn with_status(status: ConnectStatus) -> Self {
        Self {
            status,
            connected: false,
            pose: Self::PARKED,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[LinkCommand] {
        &self.history
    }

    fn record(&mut self, command: LinkCommand) -> Result<(), PickError> {
        if !self.connected {
            return Err(PickError::Link(format!("{:?} while disconnected", command)));
        }
        log::info!("Robot command: {:?}", command);
        self.history.push(command);
        Ok(())
    }
}

impl Default for DryRunLink {
    fn default() -> Self {
        DryRunLink::new()
    }
}

impl RobotLink for DryRunLink {
    fn connect(&mut self) -> ConnectStatus {
        self.connected = self.status == ConnectStatus::NoError;
        self.status
    }

    fn clear_queue(&mut self) -> Result<(), PickError> {
        self.record(LinkCommand::ClearQueue)
    }

    fn set_home_params(&mut self, home: &Pose) -> Result<(), PickError> {
        self.record(LinkCommand::HomeParams(*home))
    }

    fn set_ptp_joint_params(&mut self, params: &JointParams) -> Result<(), PickError> {
        self.record(LinkCommand::JointParams(params.clone()))
    }

    fn set_ptp_common_params(
        &mut self,
        velocity_ratio: f64,
        acceleration_ratio: f64,
    ) -> Result<(), PickError> {
        self.record(LinkCommand::CommonParams(velocity_ratio, acceleration_ratio))
    }

    fn start_queue(&mut self) -> Result<(), PickError> {
        self.record(LinkCommand::StartQueue)
    }

    fn move_to(&mut self, target: &Pose) -> Result<(), PickError> {
        self.record(LinkCommand::Move(*target))?;
        self.pose = *target;
        Ok(())
    }

    fn set_suction(&mut self, on: bool) -> Result<(), PickError> {
        self.record(LinkCommand::Suction(on))
    }

    fn pose(&mut self) -> Result<Pose, PickError> {
        self.record(LinkCommand::GetPose)?;
        Ok(self.pose)
    }

    fn disconnect(&mut self) {
        if self.connected {
            log::info!("Robot command: {:?}", LinkCommand::Disconnect);
            self.history.push(LinkCommand::Disconnect);
            self.connected = false;
        }
    }
}
