//! Alarm state machine: Idle or Sounding, nothing else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vigil_core::{Tier, Verdict};

use crate::sink::AudioSink;
use crate::tone;

/// Beep repetitions per alarm sequence.
pub const SEQUENCE_REPEATS: u32 = 3;
/// Pause after each repetition. The sequence stays in Sounding through the
/// trailing pause, so the debounce window covers it.
pub const REPEAT_GAP: Duration = Duration::from_millis(400);
/// Sample rate the alert tone is synthesized at.
pub const TONE_SAMPLE_RATE: u32 = 44_100;

/// Debounced audio alarm.
///
/// The sounding flag has exactly two writers: the winning trigger
/// (compare-exchange) and the sequence guard on the playback thread. The
/// alert latch is a separate concern: it records that an alert fired and
/// is cleared by the next recognized face, independent of playback.
pub struct AlarmController {
    playing: Arc<AtomicBool>,
    alert_latch: AtomicBool,
    sink: Arc<dyn AudioSink>,
    repeats: u32,
    gap: Duration,
}

/// Clears the sounding flag exactly once when the sequence ends, on every
/// exit path out of the playback thread including errors and panics.
struct SequenceGuard {
    playing: Arc<AtomicBool>,
}

impl Drop for SequenceGuard {
    fn drop(&mut self) {
        self.playing.store(false, Ordering::Release);
    }
}

impl AlarmController {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self::with_cadence(sink, SEQUENCE_REPEATS, REPEAT_GAP)
    }

    /// Override the sequence cadence. Tests run with a zero gap.
    pub fn with_cadence(sink: Arc<dyn AudioSink>, repeats: u32, gap: Duration) -> Self {
        Self {
            playing: Arc::new(AtomicBool::new(false)),
            alert_latch: AtomicBool::new(false),
            sink,
            repeats,
            gap,
        }
    }

    /// Route one verdict through the state machine.
    pub fn observe(&self, verdict: &Verdict) {
        match verdict.tier {
            Tier::Alert => self.trigger(),
            Tier::Recognized => self.alert_latch.store(false, Ordering::Release),
            Tier::UnknownWeak => {}
        }
    }

    /// True while a beep sequence is audible.
    pub fn is_sounding(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// True if an alert fired and no recognized face has cleared it since.
    pub fn alert_pending(&self) -> bool {
        self.alert_latch.load(Ordering::Acquire)
    }

    /// Start a beep sequence unless one is already audible.
    ///
    /// The compare-exchange admits at most one winner; alerts that lose
    /// the race or arrive mid-sequence coalesce into the running alarm.
    fn trigger(&self) {
        self.alert_latch.store(true, Ordering::Release);

        if self
            .playing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("alert while alarm already sounding; coalesced");
            return;
        }

        let guard = SequenceGuard {
            playing: Arc::clone(&self.playing),
        };
        let sink = Arc::clone(&self.sink);
        let repeats = self.repeats;
        let gap = self.gap;

        let spawned = thread::Builder::new()
            .name("vigil-alarm".into())
            .spawn(move || {
                let _guard = guard;
                let samples = tone::alert_tone(TONE_SAMPLE_RATE);
                for repetition in 1..=repeats {
                    if let Err(e) = sink.play(&samples, TONE_SAMPLE_RATE) {
                        tracing::warn!(
                            error = %e,
                            repetition,
                            "alarm playback failed; abandoning sequence"
                        );
                        return;
                    }
                    if !gap.is_zero() {
                        thread::sleep(gap);
                    }
                }
                tracing::debug!(repeats, "alarm sequence completed");
            });

        if let Err(e) = spawned {
            // The guard travelled with the dropped closure, so the flag is
            // already clear and the next alert can try again.
            tracing::error!(error = %e, "failed to spawn alarm playback thread");
        }
    }
}
