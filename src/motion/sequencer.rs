use std::time::Duration;

use crate::{
    app::PickError,
    motion::{MotionReport, MotionSettings, MotionState, MotionStep, plan},
    robot::{ConnectStatus, Pose, RobotLink},
    store::Detection,
};

pub struct MotionSequencer<'a> {
    link: &'a mut dyn RobotLink,
    settings: MotionSettings,
    state: MotionState,
    last_pose: Option<Pose>,
}

impl<'a> MotionSequencer<'a> {
    pub fn new(link: &'a mut dyn RobotLink, settings: MotionSettings) -> Self {
        Self {
            link,
            settings,
            state: MotionState::Disconnected,
            last_pose: None,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn report(&self) -> MotionReport {
        MotionReport {
            state: self.state,
            pose: self.last_pose,
        }
    }

    /// Run the whole pick-and-place for one detection. Nothing is sent to the
    /// arm unless the connection comes up cleanly, and the link is always
    /// disconnected afterwards.
    pub fn run(&mut self, detection: &Detection) -> Result<MotionReport, PickError> {
        let status = self.link.connect();
        log::info!("Connect status: {:?}", status);
        if status != ConnectStatus::NoError {
            return Err(PickError::DeviceUnavailable(format!(
                "Robot link: {:?}",
                status
            )));
        }

        let result = self.execute(detection);
        self.link.disconnect();
        match &result {
            Ok(_) => log::info!("Motion complete in state {:?}", self.state),
            Err(e) => log::error!("Motion aborted in state {:?}: {}", self.state, e),
        }
        result.map(|_| self.report())
    }

    fn execute(&mut self, detection: &Detection) -> Result<(), PickError> {
        self.home()?;
        self.advance(MotionState::Homed)?;

        let rotation = self.link.pose()?.r;
        log::info!("Moving to {:?}", detection);
        for phase in plan(detection, &self.settings) {
            for step in &phase.steps {
                self.apply(step, rotation)?;
            }
            self.advance(phase.state)?;
        }
        Ok(())
    }

    fn home(&mut self) -> Result<(), PickError> {
        self.link.clear_queue()?;
        self.link.set_home_params(&self.settings.home)?;
        self.link.set_ptp_joint_params(&self.settings.joint)?;
        self.link
            .set_ptp_common_params(self.settings.velocity_ratio, self.settings.acceleration_ratio)?;
        self.link.start_queue()?;

        let settle = Duration::from_millis(self.settings.settle_ms);
        log::debug!("Waiting {:?} for homing", settle);
        std::thread::sleep(settle);
        Ok(())
    }

    fn apply(&mut self, step: &MotionStep, rotation: f64) -> Result<(), PickError> {
        match step {
            MotionStep::MoveTo { x, y, z } => {
                let target = Pose::new(*x, *y, *z, rotation);
                self.link.move_to(&target)?;
                self.last_pose = Some(target);
                Ok(())
            }
            MotionStep::EndEffector(on) => self.link.set_suction(*on),
        }
    }

    fn advance(&mut self, next: MotionState) -> Result<(), PickError> {
        if self.state.next() != Some(next) {
            return Err(PickError::Link(format!(
                "Illegal motion transition {:?} -> {:?}",
                self.state, next
            )));
        }
        log::debug!("State: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::{DryRunLink, LinkCommand};

    fn quick() -> MotionSettings {
        MotionSettings {
            settle_ms: 0,
            ..MotionSettings::default()
        }
    }

    #[test]
    fn full_sequence() {
        let mut link = DryRunLink::new();
        let report = MotionSequencer::new(&mut link, quick())
            .run(&Detection::new(100.0, 50.0, -26.0, 0.0))
            .unwrap();
        let s = quick();
        assert_eq!(report.state, MotionState::Retracted);
        assert_eq!(
            report.pose,
            Some(Pose::new(s.retract.x, s.retract.y, s.retract.z, 0.0))
        );

        let history = link.history();
        assert_eq!(
            &history[..5],
            &[
                LinkCommand::ClearQueue,
                LinkCommand::HomeParams(s.home),
                LinkCommand::JointParams(s.joint.clone()),
                LinkCommand::CommonParams(100.0, 100.0),
                LinkCommand::StartQueue,
            ]
        );
        assert_eq!(history[5], LinkCommand::GetPose);
        assert_eq!(history.last(), Some(&LinkCommand::Disconnect));

        let r = 0.0;
        let motion: Vec<&LinkCommand> = history.iter().filter(|c| c.is_motion()).collect();
        assert_eq!(
            motion,
            vec![
                &LinkCommand::Move(Pose::new(100.0, 50.0, -26.0, r)),
                &LinkCommand::Move(Pose::new(100.0, 50.0, s.hover_z, r)),
                &LinkCommand::Suction(true),
                &LinkCommand::Move(Pose::new(100.0, 50.0, s.grasp_z, r)),
                &LinkCommand::Suction(true),
                &LinkCommand::Move(Pose::new(s.drop_x, s.drop_y, s.hover_z, r)),
                &LinkCommand::Move(Pose::new(s.drop_x, s.drop_y, s.release_z, r)),
                &LinkCommand::Suction(false),
                &LinkCommand::Move(Pose::new(s.drop_x, s.drop_y, s.hover_z, r)),
                &LinkCommand::Move(Pose::new(s.retract.x, s.retract.y, s.retract.z, r)),
            ]
        );
    }

    #[test]
    fn failed_connect_sends_nothing() {
        for status in [ConnectStatus::NotFound, ConnectStatus::Occupied] {
            let mut link = DryRunLink::with_status(status);
            let mut seq = MotionSequencer::new(&mut link, quick());
            let res = seq.run(&Detection::new(100.0, 50.0, -26.0, 0.0));
            assert!(matches!(res, Err(PickError::DeviceUnavailable(_))));
            assert_eq!(seq.state(), MotionState::Disconnected);
            assert!(link.history().is_empty());
        }
    }
}
