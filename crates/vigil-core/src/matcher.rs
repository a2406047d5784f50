//! Nearest-signature classification under the Euclidean metric.

use thiserror::Error;

use crate::gallery::SignatureGallery;
use crate::types::{Embedding, FaceBox, Tier, Verdict, UNKNOWN_IDENTITY};

/// Match tolerance: a signature within this distance is an accepted identity.
pub const MATCH_TOLERANCE: f32 = 0.5;

/// Alert radius: an unmatched face strictly closer than this to some
/// signature is treated as an intruder rather than background noise.
pub const ALERT_RADIUS: f32 = 0.7;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("probe embedding has dimension {actual}, gallery expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Classifies probe embeddings against the signature gallery.
///
/// The two radii are independent decisions: the tolerance guards against
/// accepting the wrong identity, while the looser alert radius catches
/// near-misses worth sounding the alarm for.
pub struct GalleryMatcher {
    gallery: SignatureGallery,
    tolerance: f32,
    alert_radius: f32,
}

impl GalleryMatcher {
    pub fn new(gallery: SignatureGallery) -> Self {
        Self::with_thresholds(gallery, MATCH_TOLERANCE, ALERT_RADIUS)
    }

    /// Override the calibrated radii (configuration and tests).
    pub fn with_thresholds(gallery: SignatureGallery, tolerance: f32, alert_radius: f32) -> Self {
        Self {
            gallery,
            tolerance,
            alert_radius,
        }
    }

    pub fn gallery(&self) -> &SignatureGallery {
        &self.gallery
    }

    /// Classify one probe embedding into a verdict.
    ///
    /// Every gallery entry is scanned; ties in minimum distance resolve to
    /// the first index. Acceptance is inclusive of the tolerance, the alert
    /// radius is exclusive.
    pub fn classify(&self, probe: &Embedding, face: FaceBox) -> Result<Verdict, MatchError> {
        let expected = self.gallery.dimension();
        if probe.dim() != expected {
            return Err(MatchError::DimensionMismatch {
                expected,
                actual: probe.dim(),
            });
        }

        // Strict `<` keeps the earliest index on ties.
        let mut min_distance = f32::INFINITY;
        let mut best = 0usize;
        for (i, sig) in self.gallery.entries().iter().enumerate() {
            let distance = probe.euclidean_distance(&sig.embedding);
            if distance < min_distance {
                min_distance = distance;
                best = i;
            }
        }

        let nearest = self.gallery.entries()[best].identity.clone();
        // Not clamped: distances past 1.0 surface as negative confidence
        // instead of silently clipping to zero.
        let confidence = (1.0 - min_distance) * 100.0;

        let (identity, tier) = if min_distance <= self.tolerance {
            (nearest.clone(), Tier::Recognized)
        } else if min_distance < self.alert_radius {
            (UNKNOWN_IDENTITY.to_string(), Tier::Alert)
        } else {
            (UNKNOWN_IDENTITY.to_string(), Tier::UnknownWeak)
        };

        Ok(Verdict {
            identity,
            nearest,
            confidence,
            tier,
            face,
        })
    }
}
