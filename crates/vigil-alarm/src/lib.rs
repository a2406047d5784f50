//! vigil-alarm — Debounced audio alarm for the watch pipeline.
//!
//! A two-state controller (Idle, Sounding) starts a fixed beep sequence on
//! a dedicated playback thread when an alert verdict arrives; alerts that
//! land while a sequence is audible coalesce into it instead of stacking.

pub mod controller;
pub mod sink;
pub mod tone;

pub use controller::AlarmController;
pub use sink::{AudioSink, CpalSink, NullSink, PlaybackError};
