use std::fmt::Display;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub enum PickError {
    /// Camera or robot link could not be opened
    DeviceUnavailable(String),
    /// Acquisition loop ended without an accepted candidate
    NoDetection,
    MalformedRecord(String),
    NotFound(PathBuf),
    /// Homogeneous coordinate of zero, or a singular matrix
    DegenerateTransform,
    Config(String),
    /// Robot link failed after a successful connect
    Link(String),
    Processing(String),
}

impl PickError {
    /// Everything except an operator quit ends the run with a failure status
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NoDetection)
    }
}

impl Display for PickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceUnavailable(dev) => write!(f, "Device Unavailable: {}", dev),
            Self::NoDetection => write!(f, "No Detection"),
            Self::MalformedRecord(msg) => write!(f, "Malformed Record: {}", msg),
            Self::NotFound(path) => write!(f, "Not Found: {}", path.display()),
            Self::DegenerateTransform => write!(f, "Degenerate Transform"),
            Self::Config(msg) => write!(f, "Configuration Error: {}", msg),
            Self::Link(msg) => write!(f, "Robot Link Error: {}", msg),
            Self::Processing(msg) => write!(f, "Processing Error: {}", msg),
        }
    }
}

impl std::error::Error for PickError {}

impl From<opencv::Error> for PickError {
    fn from(e: opencv::Error) -> Self {
        Self::Processing(e.to_string())
    }
}

impl From<serialport::Error> for PickError {
    fn from(e: serialport::Error) -> Self {
        Self::Link(e.to_string())
    }
}
