//! Turns verdicts into persisted event records.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use vigil_core::{Frame, Verdict};

use crate::record::EventRecord;
use crate::store::{EventStore, StorageError};

/// JPEG quality for persisted face crops.
const CROP_JPEG_QUALITY: u8 = 90;

/// Emits one event per verdict to the storage collaborator.
///
/// Crop loss is non-fatal and degrades to a record without an image path.
/// Record loss is returned as an error for the caller to surface; the
/// emitter itself stays usable afterwards.
pub struct EventEmitter<S: EventStore> {
    store: S,
}

impl<S: EventStore> EventEmitter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist one verdict, with its face crop when one is available.
    pub fn emit(
        &mut self,
        verdict: &Verdict,
        crop: Option<&Frame>,
    ) -> Result<EventRecord, StorageError> {
        let mut record = EventRecord::for_verdict(verdict);

        if let Some(crop) = crop {
            match encode_jpeg(crop) {
                Ok(bytes) => match self.store.store_crop(&bytes) {
                    Ok(path) => record.image_path = Some(path.display().to_string()),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            identity = %record.identity,
                            "crop persistence failed; recording event without image"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "crop encoding failed; recording event without image");
                }
            }
        }

        let id = self.store.append_event(&record)?;
        record.id = Some(id);
        tracing::debug!(
            id,
            identity = %record.identity,
            detail = %record.detail,
            "detection event recorded"
        );
        Ok(record)
    }
}

/// Encode a grayscale crop as JPEG.
fn encode_jpeg(crop: &Frame) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, CROP_JPEG_QUALITY);
    encoder.write_image(&crop.data, crop.width, crop.height, ExtendedColorType::L8)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEventStore;
    use std::path::PathBuf;
    use vigil_core::{FaceBox, Tier};

    fn verdict(tier: Tier) -> Verdict {
        Verdict {
            identity: "Alice".to_string(),
            nearest: "Alice".to_string(),
            confidence: 87.3,
            tier,
            face: FaceBox::new(0, 8, 8, 0),
        }
    }

    fn gray_frame() -> Frame {
        Frame::new(vec![120u8; 64], 8, 8)
    }

    #[test]
    fn test_emit_without_crop() {
        let mut emitter = EventEmitter::new(MemoryEventStore::new());
        let record = emitter.emit(&verdict(Tier::Recognized), None).unwrap();
        assert_eq!(record.id, Some(1));
        assert_eq!(record.detail, "Recognized (87.3%)");
        assert!(record.image_path.is_none());
        assert_eq!(emitter.store().events.len(), 1);
    }

    #[test]
    fn test_emit_with_crop_links_image() {
        let mut emitter = EventEmitter::new(MemoryEventStore::new());
        let frame = gray_frame();
        let record = emitter.emit(&verdict(Tier::Alert), Some(&frame)).unwrap();
        assert!(record.image_path.is_some());
        assert_eq!(emitter.store().crops.len(), 1);
        // JPEG magic bytes
        assert_eq!(&emitter.store().crops[0][..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_crop_failure_still_records_event() {
        /// Accepts events, refuses crops.
        struct NoCropStore {
            inner: MemoryEventStore,
        }

        impl EventStore for NoCropStore {
            fn append_event(&mut self, record: &EventRecord) -> Result<i64, StorageError> {
                self.inner.append_event(record)
            }

            fn store_crop(&mut self, _jpeg: &[u8]) -> Result<PathBuf, StorageError> {
                Err(StorageError::ImageWrite {
                    path: "crops".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                })
            }
        }

        let mut emitter = EventEmitter::new(NoCropStore {
            inner: MemoryEventStore::new(),
        });
        let frame = gray_frame();
        let record = emitter.emit(&verdict(Tier::Alert), Some(&frame)).unwrap();
        assert!(record.image_path.is_none());
        assert_eq!(emitter.store().inner.events.len(), 1);
    }

    #[test]
    fn test_append_failure_surfaces_error() {
        struct RefusingStore;

        impl EventStore for RefusingStore {
            fn append_event(&mut self, _record: &EventRecord) -> Result<i64, StorageError> {
                Err(StorageError::Database(rusqlite::Error::QueryReturnedNoRows))
            }

            fn store_crop(&mut self, _jpeg: &[u8]) -> Result<PathBuf, StorageError> {
                Ok(PathBuf::from("unused"))
            }
        }

        let mut emitter = EventEmitter::new(RefusingStore);
        assert!(emitter.emit(&verdict(Tier::Recognized), None).is_err());
    }
}
