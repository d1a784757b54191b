mod capture;
mod profiles;
mod segment;

pub use capture::{Camera, FrameSource};
pub use profiles::{ColorProfile, HsvRange, ProfileStore};
pub use segment::Segmenter;

/// A qualifying contour for one colour in one frame
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub color: String,
    pub pixel_x: i32,
    pub pixel_y: i32,
    pub area: f64,
}
