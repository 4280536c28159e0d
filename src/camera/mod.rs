pub mod controller;
pub mod device;
pub mod environment;
pub mod ffmpeg;
pub mod frame;
pub mod sampler;
pub mod state;

pub use controller::{CameraController, StartOutcome};
pub use device::{DeviceConstraints, FacingMode, RawFrame, TrackStatus, VideoSource, VideoTrack};
pub use environment::{Environment, EnvironmentSignal};
pub use ffmpeg::FfmpegSource;
pub use frame::CapturedFrame;
pub use state::{CameraSnapshot, CameraStatus};
