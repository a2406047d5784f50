//! vigil-core — Signature gallery and verdict classification.
//!
//! Holds the fixed set of known face signatures, classifies probe
//! embeddings into recognition tiers by Euclidean distance, and defines
//! the contract for the external detection/encoding stage.

pub mod gallery;
pub mod matcher;
pub mod types;

pub use gallery::{GalleryError, Signature, SignatureGallery};
pub use matcher::{GalleryMatcher, MatchError};
pub use types::{
    DetectedFace, Embedding, ExtractorError, FaceBox, FaceExtractor, Frame, Tier, Verdict,
    UNKNOWN_IDENTITY,
};
