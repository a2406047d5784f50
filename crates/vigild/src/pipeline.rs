//! The per-frame watch loop.
//!
//! Pulls frames from the source, hands a downscaled copy to the external
//! detection/encoding stage, classifies every reported face, feeds the
//! alarm controller and the event emitter, and produces annotation
//! instructions for the display sink. Frames are processed strictly one
//! at a time; the only concurrency is the alarm playback thread.

use thiserror::Error;

use vigil_alarm::AlarmController;
use vigil_core::{ExtractorError, FaceExtractor, Frame, GalleryMatcher, MatchError};
use vigil_events::{detection_detail, EventEmitter, EventStore};

use crate::annotate::{Annotation, DisplaySink};

/// Frame acquisition contract: a lazy, possibly unbounded sequence that
/// ends at the first failed read and is not restartable.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("face extraction failed: {0}")]
    Extractor(#[from] ExtractorError),
}

/// Per-frame orchestration across matcher, alarm, and emitter.
pub struct Pipeline<S: EventStore> {
    matcher: GalleryMatcher,
    alarm: AlarmController,
    emitter: EventEmitter<S>,
    detect_scale: u32,
}

impl<S: EventStore> Pipeline<S> {
    pub fn new(
        matcher: GalleryMatcher,
        alarm: AlarmController,
        emitter: EventEmitter<S>,
        detect_scale: u32,
    ) -> Self {
        Self {
            matcher,
            alarm,
            emitter,
            detect_scale: detect_scale.max(1),
        }
    }

    pub fn alarm(&self) -> &AlarmController {
        &self.alarm
    }

    pub fn events(&self) -> &S {
        self.emitter.store()
    }

    /// Process one frame and return the annotations for the display layer.
    ///
    /// A malformed embedding skips that face only. A failed event append is
    /// logged and the stream continues. Only extractor loss is fatal.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        extractor: &mut dyn FaceExtractor,
    ) -> Result<Vec<Annotation>, PipelineError> {
        let reduced = frame.downscale(self.detect_scale);
        let faces = extractor.detect_and_encode(&reduced)?;

        let mut annotations = Vec::with_capacity(faces.len());
        for detected in faces {
            let bounds = detected.bounds.scaled(self.detect_scale);
            let verdict = match self.matcher.classify(&detected.embedding, bounds) {
                Ok(v) => v,
                Err(e @ MatchError::DimensionMismatch { .. }) => {
                    tracing::warn!(error = %e, "skipping face with malformed embedding");
                    continue;
                }
            };

            self.alarm.observe(&verdict);

            let detail = detection_detail(&verdict);
            let crop = frame.crop(&bounds);
            if let Err(e) = self.emitter.emit(&verdict, crop.as_ref()) {
                tracing::error!(
                    error = %e,
                    identity = %verdict.identity,
                    "failed to persist detection event; continuing"
                );
            }

            annotations.push(Annotation::for_verdict(&verdict, &detail));
        }

        Ok(annotations)
    }

    /// Consume the source until it ends or the extractor fails. Returns
    /// the number of frames processed on a clean end of stream.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        extractor: &mut dyn FaceExtractor,
        display: &mut dyn DisplaySink,
    ) -> Result<u64, PipelineError> {
        let mut frames = 0u64;
        while let Some(frame) = source.next_frame() {
            let annotations = self.process_frame(&frame, extractor)?;
            display.show(&frame, &annotations);
            frames += 1;
        }
        tracing::info!(frames, "frame source ended");
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::LabelColor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use vigil_alarm::{AudioSink, PlaybackError};
    use vigil_core::{
        DetectedFace, Embedding, FaceBox, Signature, SignatureGallery, UNKNOWN_IDENTITY,
    };
    use vigil_events::{EventRecord, MemoryEventStore, StorageError};

    const SCALE: u32 = 4;

    fn gallery() -> SignatureGallery {
        SignatureGallery::from_entries(vec![
            Signature {
                identity: "Alice".to_string(),
                embedding: Embedding::new(vec![0.0, 0.0]),
            },
            Signature {
                identity: "Bob".to_string(),
                embedding: Embedding::new(vec![10.0, 10.0]),
            },
        ])
        .unwrap()
    }

    #[derive(Default)]
    struct CountingSink {
        plays: AtomicUsize,
    }

    impl AudioSink for CountingSink {
        fn play(&self, _samples: &[f32], _sample_rate: u32) -> Result<(), PlaybackError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Returns a fixed list of faces for every frame.
    struct FixedExtractor {
        faces: Vec<DetectedFace>,
        seen_frames: Vec<(u32, u32)>,
    }

    impl FixedExtractor {
        fn new(faces: Vec<DetectedFace>) -> Self {
            Self {
                faces,
                seen_frames: Vec::new(),
            }
        }
    }

    impl FaceExtractor for FixedExtractor {
        fn detect_and_encode(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, ExtractorError> {
            self.seen_frames.push((frame.width, frame.height));
            Ok(self.faces.clone())
        }
    }

    struct FailingExtractor;

    impl FaceExtractor for FailingExtractor {
        fn detect_and_encode(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, ExtractorError> {
            Err(ExtractorError::Unavailable("backend gone".to_string()))
        }
    }

    /// Fixed number of flat frames, no pacing.
    struct TestSource {
        remaining: u32,
    }

    impl FrameSource for TestSource {
        fn next_frame(&mut self) -> Option<Frame> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(Frame::new(vec![128u8; 64 * 48], 64, 48))
        }
    }

    struct NullDisplay;

    impl DisplaySink for NullDisplay {
        fn show(&mut self, _frame: &Frame, _annotations: &[Annotation]) {}
    }

    fn face(embedding: &[f32]) -> DetectedFace {
        DetectedFace {
            bounds: FaceBox::new(2, 10, 8, 4),
            embedding: Embedding::new(embedding.to_vec()),
        }
    }

    fn pipeline_with(
        sink: Arc<CountingSink>,
    ) -> Pipeline<MemoryEventStore> {
        let matcher = GalleryMatcher::new(gallery());
        let alarm = AlarmController::with_cadence(sink, 1, Duration::ZERO);
        let emitter = EventEmitter::new(MemoryEventStore::new());
        Pipeline::new(matcher, alarm, emitter, SCALE)
    }

    fn wait_alarm_idle(pipeline: &Pipeline<MemoryEventStore>) {
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while pipeline.alarm().is_sounding() {
            assert!(std::time::Instant::now() < deadline, "alarm stuck sounding");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_recognized_face_records_event_without_alarm() {
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = pipeline_with(sink.clone());
        let frame = Frame::new(vec![128u8; 64 * 48], 64, 48);
        let mut extractor = FixedExtractor::new(vec![face(&[0.0, 0.0])]);

        let annotations = pipeline.process_frame(&frame, &mut extractor).unwrap();

        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].color, LabelColor::Green);
        assert_eq!(annotations[0].label, "Alice - Recognized (100.0%)");
        assert!(!pipeline.alarm().is_sounding());
        assert_eq!(sink.plays.load(Ordering::SeqCst), 0);

        let events = &pipeline.events().events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].identity, "Alice");
        assert_eq!(events[0].detail, "Recognized (100.0%)");
        assert!(events[0].image_path.is_some());
    }

    #[test]
    fn test_intruder_face_alarms_once_and_records_alert() {
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = pipeline_with(sink.clone());
        let frame = Frame::new(vec![128u8; 64 * 48], 64, 48);
        // Distance 0.6 from Alice: outside tolerance, inside alert radius.
        let mut extractor = FixedExtractor::new(vec![face(&[0.6, 0.0])]);

        let annotations = pipeline.process_frame(&frame, &mut extractor).unwrap();
        wait_alarm_idle(&pipeline);

        assert_eq!(annotations[0].color, LabelColor::Red);
        assert_eq!(annotations[0].label, "Unknown - Alert: Intruder detected!");
        assert_eq!(sink.plays.load(Ordering::SeqCst), 1);

        let events = &pipeline.events().events;
        assert_eq!(events[0].identity, UNKNOWN_IDENTITY);
        assert_eq!(events[0].detail, "Alert: Intruder detected!");
    }

    #[test]
    fn test_weak_unknown_records_resemblance_without_alarm() {
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = pipeline_with(sink.clone());
        let frame = Frame::new(vec![128u8; 64 * 48], 64, 48);
        // Distance 0.8 from Alice: outside the alert radius.
        let mut extractor = FixedExtractor::new(vec![face(&[0.8, 0.0])]);

        pipeline.process_frame(&frame, &mut extractor).unwrap();

        assert_eq!(sink.plays.load(Ordering::SeqCst), 0);
        let events = &pipeline.events().events;
        assert_eq!(events[0].identity, UNKNOWN_IDENTITY);
        assert!(events[0].detail.starts_with("Unknown (resembles Alice at"));
    }

    #[test]
    fn test_extractor_sees_downscaled_frame_and_boxes_map_back() {
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = pipeline_with(sink);
        let frame = Frame::new(vec![128u8; 64 * 48], 64, 48);
        let mut extractor = FixedExtractor::new(vec![face(&[0.0, 0.0])]);

        let annotations = pipeline.process_frame(&frame, &mut extractor).unwrap();

        // Detector ran on the quarter-size copy.
        assert_eq!(extractor.seen_frames, vec![(16, 12)]);
        // Box (2, 10, 8, 4) maps back by the same factor.
        assert_eq!(annotations[0].bounds, FaceBox::new(8, 40, 32, 16));
    }

    #[test]
    fn test_malformed_embedding_skips_face_only() {
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = pipeline_with(sink);
        let frame = Frame::new(vec![128u8; 64 * 48], 64, 48);
        // First face has the wrong dimension; second is a clean match.
        let mut extractor = FixedExtractor::new(vec![
            face(&[0.0, 0.0, 0.0]),
            face(&[0.0, 0.0]),
        ]);

        let annotations = pipeline.process_frame(&frame, &mut extractor).unwrap();

        assert_eq!(annotations.len(), 1);
        assert_eq!(pipeline.events().events.len(), 1);
        assert_eq!(pipeline.events().events[0].identity, "Alice");
    }

    #[test]
    fn test_storage_failure_does_not_stop_the_stream() {
        struct RefusingStore {
            attempts: usize,
        }

        impl EventStore for RefusingStore {
            fn append_event(&mut self, _record: &EventRecord) -> Result<i64, StorageError> {
                self.attempts += 1;
                Err(StorageError::Database(rusqlite::Error::QueryReturnedNoRows))
            }

            fn store_crop(&mut self, _jpeg: &[u8]) -> Result<std::path::PathBuf, StorageError> {
                Err(StorageError::ImageWrite {
                    path: "crops".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "read-only"),
                })
            }
        }

        let matcher = GalleryMatcher::new(gallery());
        let alarm = AlarmController::with_cadence(
            Arc::new(CountingSink::default()),
            1,
            Duration::ZERO,
        );
        let emitter = EventEmitter::new(RefusingStore { attempts: 0 });
        let mut pipeline = Pipeline::new(matcher, alarm, emitter, SCALE);

        let mut source = TestSource { remaining: 3 };
        let mut extractor = FixedExtractor::new(vec![face(&[0.0, 0.0])]);
        let frames = pipeline
            .run(&mut source, &mut extractor, &mut NullDisplay)
            .unwrap();

        assert_eq!(frames, 3);
        assert_eq!(pipeline.events().attempts, 3);
    }

    #[test]
    fn test_extractor_loss_is_fatal() {
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = pipeline_with(sink);
        let mut source = TestSource { remaining: 5 };

        let err = pipeline
            .run(&mut source, &mut FailingExtractor, &mut NullDisplay)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extractor(_)));
    }

    #[test]
    fn test_run_counts_frames_until_source_ends() {
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = pipeline_with(sink);
        let mut source = TestSource { remaining: 4 };
        let mut extractor = FixedExtractor::new(vec![]);

        let frames = pipeline
            .run(&mut source, &mut extractor, &mut NullDisplay)
            .unwrap();
        assert_eq!(frames, 4);
        assert!(pipeline.events().events.is_empty());
    }

    #[test]
    fn test_repeated_intruder_frames_coalesce_into_alarm() {
        // Ten consecutive alert frames while the (instant) sequence keeps
        // finishing: every completed sequence may retrigger, but a frame
        // arriving mid-sequence must not stack. With a single-repetition
        // instant sink the play count can never exceed the frame count,
        // and the alarm must be idle again at the end.
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = pipeline_with(sink.clone());
        let mut source = TestSource { remaining: 10 };
        let mut extractor = FixedExtractor::new(vec![face(&[0.6, 0.0])]);

        pipeline
            .run(&mut source, &mut extractor, &mut NullDisplay)
            .unwrap();
        wait_alarm_idle(&pipeline);

        let plays = sink.plays.load(Ordering::SeqCst);
        assert!(plays >= 1, "at least one sequence must have sounded");
        assert!(plays <= 10, "sequences must never stack beyond triggers");
        assert_eq!(pipeline.events().events.len(), 10);
    }

    #[test]
    fn test_two_faces_one_frame_mixed_verdicts() {
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = pipeline_with(sink.clone());
        let frame = Frame::new(vec![128u8; 64 * 48], 64, 48);
        let mut extractor = FixedExtractor::new(vec![
            face(&[0.0, 0.0]),
            face(&[0.6, 0.0]),
        ]);

        let annotations = pipeline.process_frame(&frame, &mut extractor).unwrap();
        wait_alarm_idle(&pipeline);

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].color, LabelColor::Green);
        assert_eq!(annotations[1].color, LabelColor::Red);
        assert_eq!(pipeline.events().events.len(), 2);
        assert_eq!(sink.plays.load(Ordering::SeqCst), 1);
    }
}
