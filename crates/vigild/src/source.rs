//! Built-in frame sources and extractor stand-ins.
//!
//! Real capture and real detection/encoding are external collaborators.
//! These implementations cover bring-up, scripted end-to-end runs, and
//! integration tests without either collaborator attached.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use vigil_core::{DetectedFace, Embedding, ExtractorError, FaceBox, FaceExtractor, Frame};

use crate::config::Config;
use crate::pipeline::FrameSource;

/// Frame size the synthetic source produces.
const SOURCE_WIDTH: u32 = 640;
const SOURCE_HEIGHT: u32 = 480;

/// Flat gray frames at a fixed pace, optionally ending after a cap.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    interval: Duration,
    remaining: Option<u64>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, interval: Duration, cap: Option<u64>) -> Self {
        Self {
            width,
            height,
            interval,
            remaining: cap,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        Some(Frame::new(
            vec![128u8; (self.width * self.height) as usize],
            self.width,
            self.height,
        ))
    }
}

/// Extractor that never reports a face.
pub struct NullExtractor;

impl FaceExtractor for NullExtractor {
    fn detect_and_encode(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, ExtractorError> {
        Ok(Vec::new())
    }
}

/// One scripted detection: box in detector coordinates plus an embedding.
#[derive(Debug, Clone, Deserialize)]
struct ScriptedFace {
    /// top, right, bottom, left
    #[serde(rename = "box")]
    bounds: [i32; 4],
    embedding: Vec<f32>,
}

/// Replays per-frame face lists from a JSON script, cycling when the
/// stream outlives the script.
pub struct ReplayExtractor {
    frames: Vec<Vec<ScriptedFace>>,
    cursor: usize,
}

impl ReplayExtractor {
    /// Load a script: a JSON array of frames, each an array of faces.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay script {}", path.display()))?;
        let frames: Vec<Vec<ScriptedFace>> = serde_json::from_str(&raw)
            .with_context(|| format!("malformed replay script {}", path.display()))?;
        tracing::info!(path = %path.display(), frames = frames.len(), "replay script loaded");
        Ok(Self { frames, cursor: 0 })
    }
}

impl FaceExtractor for ReplayExtractor {
    fn detect_and_encode(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, ExtractorError> {
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        let scripted = &self.frames[self.cursor % self.frames.len()];
        self.cursor += 1;
        Ok(scripted
            .iter()
            .map(|f| DetectedFace {
                bounds: FaceBox::new(f.bounds[0], f.bounds[1], f.bounds[2], f.bounds[3]),
                embedding: Embedding::new(f.embedding.clone()),
            })
            .collect())
    }
}

/// Build the configured source and extractor pair.
pub fn build(
    config: &Config,
) -> anyhow::Result<(Box<dyn FrameSource + Send>, Box<dyn FaceExtractor + Send>)> {
    let cap = (config.synthetic_frames > 0).then_some(config.synthetic_frames);
    let source = SyntheticSource::new(
        SOURCE_WIDTH,
        SOURCE_HEIGHT,
        Duration::from_millis(config.synthetic_interval_ms),
        cap,
    );

    match config.source.as_str() {
        "synthetic" => Ok((Box::new(source), Box::new(NullExtractor))),
        replay if replay.starts_with("replay:") => {
            let path = Path::new(&replay["replay:".len()..]);
            let extractor = ReplayExtractor::load(path)?;
            Ok((Box::new(source), Box::new(extractor)))
        }
        other => anyhow::bail!(
            "unknown frame source '{other}' (expected 'synthetic' or 'replay:<script.json>')"
        ),
    }
}
