//! Annotation instructions for the external display layer.
//!
//! The daemon never draws. It describes what should be drawn for each
//! classified face and hands the instructions to a display sink.

use vigil_core::{FaceBox, Frame, Tier, Verdict};

/// Box color, keyed by tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelColor {
    /// Accepted identity.
    Green,
    /// Unknown face, weak or alerting.
    Red,
}

impl LabelColor {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Recognized => LabelColor::Green,
            Tier::UnknownWeak | Tier::Alert => LabelColor::Red,
        }
    }
}

/// One draw instruction for the display collaborator.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub bounds: FaceBox,
    pub label: String,
    pub color: LabelColor,
}

impl Annotation {
    /// Label text as the display layer renders it under the box: identity
    /// plus the detection detail.
    pub fn for_verdict(verdict: &Verdict, detail: &str) -> Self {
        Self {
            bounds: verdict.face,
            label: format!("{} - {}", verdict.identity, detail),
            color: LabelColor::for_tier(verdict.tier),
        }
    }
}

/// Display collaborator contract. Rendering itself is out of scope here.
pub trait DisplaySink {
    fn show(&mut self, frame: &Frame, annotations: &[Annotation]);
}

/// Logs annotations instead of rendering them.
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn show(&mut self, _frame: &Frame, annotations: &[Annotation]) {
        for a in annotations {
            tracing::info!(
                label = %a.label,
                color = ?a.color,
                top = a.bounds.top,
                left = a.bounds.left,
                "face annotated"
            );
        }
    }
}
