//! ffconvert: single-file video container conversion.
//!
//! The library half is the transcode orchestration core: an explicitly
//! lifecycled conversion-engine handle ([`engine::EngineManager`]), the
//! staged transcode sequence ([`engine::transcode`]), observable progress
//! ([`progress::ProgressReporter`]), and best-effort cancellation
//! ([`engine::CancelController`]). The binary in `main.rs` is a thin CLI
//! front end over it.

pub mod artifact;
pub mod config;
pub mod engine;
pub mod format;
pub mod progress;
pub mod sink;
