// Core conversion engine - independent of UI

pub mod cancel;
pub mod ffmpeg;
pub mod lifecycle;
pub mod log;
pub mod pipeline;
pub mod probe;

pub use cancel::CancelController;
pub use ffmpeg::{FfmpegEngine, ProgressParser};
pub use lifecycle::{Engine, EngineConfig, EngineError, EngineManager, EngineState, PidRegistry};
pub use pipeline::{TranscodeError, transcode};
