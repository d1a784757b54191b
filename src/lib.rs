pub mod app;
pub mod motion;
pub mod robot;
pub mod store;
pub mod transform;
pub mod vision;
