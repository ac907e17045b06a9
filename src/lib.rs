pub mod animation;
pub mod camera_rig;
pub mod cli;
pub mod config;
pub mod controls;
pub mod core;
pub mod engine;
pub mod error;
pub mod frame;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod solar_system;
pub mod texture;

pub use camera_rig::{CameraRig, CameraSelection};
pub use config::AppConfig;
pub use error::{ConfigError, RenderError, SceneError};
pub use frame::{FrameContext, FrameLoop, FramePacket, RenderBackend, Submission, Viewport};
pub use scene::{NodeId, SceneGraph};
pub use solar_system::SolarSystem;
