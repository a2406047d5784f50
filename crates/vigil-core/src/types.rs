use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity reported when no gallery signature is accepted.
pub const UNKNOWN_IDENTITY: &str = "Unknown";

/// Face embedding vector produced by the external encoder.
///
/// The dimension is fixed for the lifetime of the process by whichever
/// encoder produced the gallery; probes that disagree are rejected at
/// classification time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Face bounding box in pixel coordinates, in the order the detection
/// stage reports them: top, right, bottom, left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Map a box detected on a downscaled frame back to full resolution.
    pub fn scaled(&self, factor: u32) -> FaceBox {
        let f = factor as i32;
        FaceBox {
            top: self.top * f,
            right: self.right * f,
            bottom: self.bottom * f,
            left: self.left * f,
        }
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }
}

/// A grayscale frame handed in by the capture stage.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            data,
            width,
            height,
        }
    }

    /// Extract the face region, clamped to the frame bounds.
    ///
    /// Returns None when the clamped region is empty.
    pub fn crop(&self, face: &FaceBox) -> Option<Frame> {
        let top = face.top.max(0) as u32;
        let left = face.left.max(0) as u32;
        let bottom = (face.bottom.max(0) as u32).min(self.height);
        let right = (face.right.max(0) as u32).min(self.width);
        if right <= left || bottom <= top {
            return None;
        }

        let width = right - left;
        let height = bottom - top;
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in top..bottom {
            let row = (y * self.width + left) as usize;
            data.extend_from_slice(&self.data[row..row + width as usize]);
        }
        Some(Frame {
            data,
            width,
            height,
        })
    }

    /// Downscale by integer box averaging. The detection stage runs on the
    /// reduced copy; boxes it reports must be mapped back with
    /// [`FaceBox::scaled`].
    pub fn downscale(&self, factor: u32) -> Frame {
        if factor <= 1 {
            return self.clone();
        }
        let width = self.width / factor;
        let height = self.height / factor;
        let block = factor * factor;

        let mut data = Vec::with_capacity((width * height) as usize);
        for by in 0..height {
            for bx in 0..width {
                let mut sum = 0u32;
                for dy in 0..factor {
                    for dx in 0..factor {
                        let x = bx * factor + dx;
                        let y = by * factor + dy;
                        sum += self.data[(y * self.width + x) as usize] as u32;
                    }
                }
                data.push((sum / block) as u8);
            }
        }
        Frame {
            data,
            width,
            height,
        }
    }
}

/// Three-way classification outcome. Drives alarm and persistence behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Best signature within the match tolerance; identity accepted.
    Recognized,
    /// No accepted match and nobody close enough to be actionable.
    UnknownWeak,
    /// No accepted match, but within the alert radius of a known face.
    Alert,
}

/// Classification verdict for one detected face.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Accepted identity, or [`UNKNOWN_IDENTITY`].
    pub identity: String,
    /// Closest gallery label regardless of acceptance. Display only.
    pub nearest: String,
    /// Percent confidence derived from the minimum distance. Deliberately
    /// not clamped to [0, 100] so degenerate encoder output stays visible.
    pub confidence: f32,
    pub tier: Tier,
    /// Full-resolution bounds, carried through for cropping and annotation.
    pub face: FaceBox,
}

/// One face reported by the detection/encoding stage.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bounds: FaceBox,
    pub embedding: Embedding,
}

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("detection backend unavailable: {0}")]
    Unavailable(String),
}

/// Contract for the external face detection and embedding extraction stage.
///
/// An empty result is a normal frame with no faces. An error means the
/// backend is gone; callers treat it as fatal for the stream.
pub trait FaceExtractor {
    fn detect_and_encode(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, ExtractorError>;
}
