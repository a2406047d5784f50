//! Signature gallery — the fixed set of known identities.
//!
//! Loaded once at startup from a JSON signatures file and never mutated
//! afterwards. Emptiness, blank labels, and dimension disagreements are
//! rejected here so the matcher can assume a well-formed gallery.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Embedding;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("signature file not found: {0}")]
    FileNotFound(String),
    #[error("failed to read signature file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed signature file {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("gallery is empty; refusing to watch with zero known signatures")]
    Empty,
    #[error("signature '{0}' has an empty embedding")]
    EmptyEmbedding(String),
    #[error("signature '{identity}' has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        identity: String,
        expected: usize,
        actual: usize,
    },
    #[error("signature at index {0} has a blank identity label")]
    BlankIdentity(usize),
}

/// One enrolled identity with its reference embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub identity: String,
    pub embedding: Embedding,
}

/// Immutable, index-aligned set of known signatures.
#[derive(Debug, Clone)]
pub struct SignatureGallery {
    entries: Vec<Signature>,
    dimension: usize,
}

impl SignatureGallery {
    /// Validate and seal a list of signatures. The first entry fixes the
    /// embedding dimension for the whole gallery.
    pub fn from_entries(entries: Vec<Signature>) -> Result<Self, GalleryError> {
        let first = entries.first().ok_or(GalleryError::Empty)?;
        let dimension = first.embedding.dim();
        if dimension == 0 {
            return Err(GalleryError::EmptyEmbedding(first.identity.clone()));
        }

        for (i, sig) in entries.iter().enumerate() {
            if sig.identity.trim().is_empty() {
                return Err(GalleryError::BlankIdentity(i));
            }
            if sig.embedding.dim() != dimension {
                return Err(GalleryError::DimensionMismatch {
                    identity: sig.identity.clone(),
                    expected: dimension,
                    actual: sig.embedding.dim(),
                });
            }
        }

        Ok(Self { entries, dimension })
    }

    /// Load a gallery from a JSON signatures file: an array of
    /// `{"identity": ..., "embedding": [...]}` objects.
    pub fn load(path: &Path) -> Result<Self, GalleryError> {
        if !path.exists() {
            return Err(GalleryError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| GalleryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let entries: Vec<Signature> =
            serde_json::from_str(&raw).map_err(|source| GalleryError::Malformed {
                path: path.display().to_string(),
                source,
            })?;

        let gallery = Self::from_entries(entries)?;
        tracing::info!(
            path = %path.display(),
            signatures = gallery.len(),
            dimension = gallery.dimension(),
            "signature gallery loaded"
        );
        Ok(gallery)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension every entry shares.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn entries(&self) -> &[Signature] {
        &self.entries
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|s| s.identity.as_str())
    }
}
