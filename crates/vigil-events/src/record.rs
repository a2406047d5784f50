//! Event records and detection-detail formatting.

use chrono::Local;
use vigil_core::{Tier, Verdict};

/// One detection event, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Database row id, set once stored.
    pub id: Option<i64>,
    pub identity: String,
    /// Human-readable detection type. The format is load-bearing for the
    /// downstream display layer; see [`detection_detail`].
    pub detail: String,
    /// Local calendar date, `%Y-%m-%d`.
    pub date: String,
    /// Local time of day, `%H:%M:%S`.
    pub time: String,
    pub image_path: Option<String>,
}

impl EventRecord {
    /// Build a record for one verdict, stamped with the local clock.
    pub fn for_verdict(verdict: &Verdict) -> Self {
        let now = Local::now();
        Self {
            id: None,
            identity: verdict.identity.clone(),
            detail: detection_detail(verdict),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            image_path: None,
        }
    }
}

/// Detection-type string for a verdict. Consumed verbatim downstream, so
/// the three shapes must not drift:
///
/// ```text
/// Recognized (87.3%)
/// Unknown (resembles Alice at 42.0%)
/// Alert: Intruder detected!
/// ```
pub fn detection_detail(verdict: &Verdict) -> String {
    match verdict.tier {
        Tier::Recognized => format!("Recognized ({:.1}%)", verdict.confidence),
        Tier::UnknownWeak => format!(
            "Unknown (resembles {} at {:.1}%)",
            verdict.nearest, verdict.confidence
        ),
        Tier::Alert => "Alert: Intruder detected!".to_string(),
    }
}
