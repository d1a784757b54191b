//! Dobot serial framing.
//!
//! `AA AA | len | id | ctrl | params... | checksum` where `len` counts id,
//! ctrl and params, and the checksum makes the byte sum of id, ctrl and
//! params zero modulo 256.

use std::io::Read;

use crate::{app::PickError, robot::Pose};

pub const HEADER: u8 = 0xAA;

pub const CTRL_WRITE: u8 = 0x01;
pub const CTRL_QUEUED: u8 = 0x02;

pub const ID_GET_POSE: u8 = 10;
pub const ID_HOME_PARAMS: u8 = 30;
pub const ID_SUCTION_CUP: u8 = 62;
pub const ID_PTP_JOINT_PARAMS: u8 = 80;
pub const ID_PTP_COMMON_PARAMS: u8 = 83;
pub const ID_PTP_CMD: u8 = 84;
pub const ID_QUEUE_START: u8 = 240;
pub const ID_QUEUE_CLEAR: u8 = 245;
pub const ID_QUEUE_CURRENT_INDEX: u8 = 246;

/// Straight-line move in cartesian space
pub const PTP_MOVL_XYZ: u8 = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub id: u8,
    pub ctrl: u8,
    pub params: Vec<u8>,
}

impl Packet {
    pub fn new(id: u8, ctrl: u8, params: Vec<u8>) -> Self {
        Self { id, ctrl, params }
    }

    pub fn query(id: u8) -> Self {
        Self::new(id, 0, Vec::new())
    }

    pub fn checksum(id: u8, ctrl: u8, params: &[u8]) -> u8 {
        let sum = params
            .iter()
            .fold(id.wrapping_add(ctrl), |acc, b| acc.wrapping_add(*b));
        0u8.wrapping_sub(sum)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.params.len() + 6);
        buf.extend_from_slice(&[HEADER, HEADER, (self.params.len() + 2) as u8]);
        buf.push(self.id);
        buf.push(self.ctrl);
        buf.extend_from_slice(&self.params);
        buf.push(Self::checksum(self.id, self.ctrl, &self.params));
        buf
    }

    /// Read one frame, skipping any bytes before the header
    pub fn read_from(reader: &mut impl Read) -> Result<Self, PickError> {
        let mut byte = [0u8; 1];
        let mut headers = 0;
        while headers < 2 {
            reader.read_exact(&mut byte).map_err(io_err)?;
            headers = if byte[0] == HEADER { headers + 1 } else { 0 };
        }
        reader.read_exact(&mut byte).map_err(io_err)?;
        let len = byte[0] as usize;
        if len < 2 {
            return Err(PickError::Link(format!("Frame length {} too short", len)));
        }
        let mut payload = vec![0u8; len + 1];
        reader.read_exact(&mut payload).map_err(io_err)?;

        let checksum = payload.pop().unwrap_or_default();
        let (id, ctrl, params) = (payload[0], payload[1], payload[2..].to_vec());
        if Self::checksum(id, ctrl, &params) != checksum {
            return Err(PickError::Link(format!("Bad checksum on reply to {}", id)));
        }
        Ok(Self { id, ctrl, params })
    }

    pub fn f32_at(&self, index: usize) -> Result<f32, PickError> {
        let start = index * 4;
        self.params
            .get(start..start + 4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| self.short())
    }

    pub fn u64_at(&self, start: usize) -> Result<u64, PickError> {
        self.params
            .get(start..start + 8)
            .map(|b| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                u64::from_le_bytes(raw)
            })
            .ok_or_else(|| self.short())
    }

    fn short(&self) -> PickError {
        PickError::Link(format!(
            "Reply to {} too short ({} bytes)",
            self.id,
            self.params.len()
        ))
    }
}

fn io_err(e: std::io::Error) -> PickError {
    PickError::Link(e.to_string())
}

fn push_f32s(buf: &mut Vec<u8>, values: &[f64]) {
    for v in values {
        buf.extend_from_slice(&(*v as f32).to_le_bytes());
    }
}

pub fn home_params(home: &Pose) -> Packet {
    let mut params = Vec::with_capacity(16);
    push_f32s(&mut params, &[home.x, home.y, home.z, home.r]);
    Packet::new(ID_HOME_PARAMS, CTRL_WRITE | CTRL_QUEUED, params)
}

pub fn ptp_joint_params(velocity: &[f64; 4], acceleration: &[f64; 4]) -> Packet {
    let mut params = Vec::with_capacity(32);
    push_f32s(&mut params, velocity);
    push_f32s(&mut params, acceleration);
    Packet::new(ID_PTP_JOINT_PARAMS, CTRL_WRITE | CTRL_QUEUED, params)
}

pub fn ptp_common_params(velocity_ratio: f64, acceleration_ratio: f64) -> Packet {
    let mut params = Vec::with_capacity(8);
    push_f32s(&mut params, &[velocity_ratio, acceleration_ratio]);
    Packet::new(ID_PTP_COMMON_PARAMS, CTRL_WRITE | CTRL_QUEUED, params)
}

pub fn ptp_move(target: &Pose) -> Packet {
    let mut params = vec![PTP_MOVL_XYZ];
    push_f32s(&mut params, &[target.x, target.y, target.z, target.r]);
    Packet::new(ID_PTP_CMD, CTRL_WRITE | CTRL_QUEUED, params)
}

pub fn suction_cup(on: bool) -> Packet {
    Packet::new(
        ID_SUCTION_CUP,
        CTRL_WRITE | CTRL_QUEUED,
        vec![1, u8::from(on)],
    )
}

pub fn queue_start() -> Packet {
    Packet::new(ID_QUEUE_START, CTRL_WRITE, Vec::new())
}

pub fn queue_clear() -> Packet {
    Packet::new(ID_QUEUE_CLEAR, CTRL_WRITE, Vec::new())
}

pub fn parse_pose(reply: &Packet) -> Result<Pose, PickError> {
    Ok(Pose::new(
        reply.f32_at(0)?.into(),
        reply.f32_at(1)?.into(),
        reply.f32_at(2)?.into(),
        reply.f32_at(3)?.into(),
    ))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn get_pose_frame() {
        assert_eq!(
            Packet::query(ID_GET_POSE).encode(),
            vec![0xAA, 0xAA, 0x02, 0x0A, 0x00, 0xF6]
        );
    }

    #[test]
    fn queue_clear_frame() {
        assert_eq!(queue_clear().encode(), vec![0xAA, 0xAA, 0x02, 0xF5, 0x01, 0x0A]);
    }

    #[test]
    fn suction_frame() {
        // 62 + 3 + 1 + 1 = 67 -> 256 - 67 = 189
        assert_eq!(
            suction_cup(true).encode(),
            vec![0xAA, 0xAA, 0x04, 62, 0x03, 0x01, 0x01, 189]
        );
        assert_eq!(suction_cup(false).params, vec![1, 0]);
    }

    #[test]
    fn move_layout() {
        let p = ptp_move(&Pose::new(100.0, 50.0, -26.0, 0.0));
        assert_eq!(p.params.len(), 17);
        assert_eq!(p.params[0], PTP_MOVL_XYZ);
        assert_eq!(p.encode()[2], 19);
        let shifted = Packet::new(p.id, p.ctrl, p.params[1..].to_vec());
        assert_eq!(parse_pose(&shifted).unwrap(), Pose::new(100.0, 50.0, -26.0, 0.0));
    }

    #[test]
    fn reads_after_noise() {
        let mut bytes = vec![0x00, 0xAA, 0x13];
        bytes.extend(home_params(&Pose::new(1.0, 2.0, 3.0, 4.0)).encode());
        let packet = Packet::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(packet.id, ID_HOME_PARAMS);
        assert_eq!(packet.f32_at(3).unwrap(), 4.0);
    }

    #[test]
    fn reads_queue_index() {
        let reply = Packet::new(ID_PTP_CMD, CTRL_WRITE | CTRL_QUEUED, 42u64.to_le_bytes().to_vec());
        let read = Packet::read_from(&mut Cursor::new(reply.encode())).unwrap();
        assert_eq!(read.u64_at(0).unwrap(), 42);
        assert!(read.f32_at(2).is_err());
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut bytes = Packet::query(ID_GET_POSE).encode();
        *bytes.last_mut().unwrap() ^= 0xFF;
        assert!(matches!(
            Packet::read_from(&mut Cursor::new(bytes)),
            Err(PickError::Link(_))
        ));
    }

    #[test]
    fn truncated_frame_is_error() {
        let bytes = vec![0xAA, 0xAA, 0x06, 0x0A, 0x00];
        assert!(Packet::read_from(&mut Cursor::new(bytes)).is_err());
    }
}
