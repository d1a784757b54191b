use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::{
    app::{PickError, SerialPath},
    robot::{
        ConnectStatus, JointParams, Pose, RobotLink,
        protocol::{self, Packet},
    },
};

pub struct DobotLink {
    path: SerialPath,
    port: Option<Box<dyn SerialPort>>,
}

/// Retries reads that hit the port timeout, so an idle arm blocks the caller
/// instead of failing it
struct Patient<'a> {
    port: &'a mut Box<dyn SerialPort>,
}

impl Read for Patient<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            match self.port.read(buf) {
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    log::trace!("Waiting for arm");
                }
                other => return other,
            }
        }
    }
}

impl DobotLink {
    const READ_TIMEOUT: Duration = Duration::from_millis(500);
    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(path: SerialPath) -> Self {
        log::info!("Creating DobotLink");
        Self { path, port: None }
    }

    pub fn status_for(e: &serialport::Error) -> ConnectStatus {
        match e.kind() {
            serialport::ErrorKind::NoDevice => ConnectStatus::NotFound,
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => ConnectStatus::NotFound,
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                ConnectStatus::Occupied
            }
            serialport::ErrorKind::Io(std::io::ErrorKind::AddrInUse) => ConnectStatus::Occupied,
            _ => ConnectStatus::NotFound,
        }
    }

    fn transact(&mut self, packet: Packet) -> Result<Packet, PickError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| PickError::Link("Not connected".to_string()))?;
        port.write_all(&packet.encode())
            .and_then(|_| port.flush())
            .map_err(|e| PickError::Link(e.to_string()))?;

        let reply = Packet::read_from(&mut Patient { port })?;
        if reply.id != packet.id {
            return Err(PickError::Link(format!(
                "Sent command {} but got reply to {}",
                packet.id, reply.id
            )));
        }
        Ok(reply)
    }

    fn queued(&mut self, packet: Packet) -> Result<u64, PickError> {
        self.transact(packet)?.u64_at(0)
    }

    fn current_index(&mut self) -> Result<u64, PickError> {
        self.transact(Packet::query(protocol::ID_QUEUE_CURRENT_INDEX))?
            .u64_at(0)
    }

    /// Block until the arm has executed the queued command at `index`
    fn wait_for(&mut self, index: u64) -> Result<(), PickError> {
        while self.current_index()? < index {
            std::thread::sleep(Self::POLL_INTERVAL);
        }
        Ok(())
    }
}

impl RobotLink for DobotLink {
    fn connect(&mut self) -> ConnectStatus {
        log::info!("Connecting to {} @ {}", self.path.port, self.path.baud);
        match serialport::new(&self.path.port, self.path.baud)
            .timeout(Self::READ_TIMEOUT)
            .open()
        {
            Ok(port) => {
                self.port = Some(port);
                ConnectStatus::NoError
            }
            Err(e) => {
                log::error!("Unable to open {}: {}", self.path.port, e);
                Self::status_for(&e)
            }
        }
    }

    fn clear_queue(&mut self) -> Result<(), PickError> {
        self.transact(protocol::queue_clear()).map(|_| ())
    }

    fn set_home_params(&mut self, home: &Pose) -> Result<(), PickError> {
        self.queued(protocol::home_params(home)).map(|_| ())
    }

    fn set_ptp_joint_params(&mut self, params: &JointParams) -> Result<(), PickError> {
        self.queued(protocol::ptp_joint_params(
            &params.velocity,
            &params.acceleration,
        ))
        .map(|_| ())
    }

    fn set_ptp_common_params(
        &mut self,
        velocity_ratio: f64,
        acceleration_ratio: f64,
    ) -> Result<(), PickError> {
        self.queued(protocol::ptp_common_params(velocity_ratio, acceleration_ratio))
            .map(|_| ())
    }

    fn start_queue(&mut self) -> Result<(), PickError> {
        self.transact(protocol::queue_start()).map(|_| ())
    }

    fn move_to(&mut self, target: &Pose) -> Result<(), PickError> {
        let index = self.queued(protocol::ptp_move(target))?;
        self.wait_for(index)
    }

    fn set_suction(&mut self, on: bool) -> Result<(), PickError> {
        let index = self.queued(protocol::suction_cup(on))?;
        self.wait_for(index)
    }

    fn pose(&mut self) -> Result<Pose, PickError> {
        let reply = self.transact(Packet::query(protocol::ID_GET_POSE))?;
        protocol::parse_pose(&reply)
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            log::info!("Disconnected from {}", self.path.port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_port_is_not_found() {
        let mut link = DobotLink::new(SerialPath::new(
            "/dev/cubepick-no-such-port".to_string(),
            115200,
        ));
        assert_ne!(link.connect(), ConnectStatus::NoError);
        assert!(matches!(link.pose(), Err(PickError::Link(_))));
    }

    #[test]
    fn error_kinds_map_to_status() {
        let busy = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "busy",
        );
        assert_eq!(DobotLink::status_for(&busy), ConnectStatus::Occupied);
        let gone = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert_eq!(DobotLink::status_for(&gone), ConnectStatus::NotFound);
    }
}
