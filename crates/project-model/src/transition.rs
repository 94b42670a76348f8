//! Transition descriptors persisted with the timeline.

use serde::{Deserialize, Serialize};

use crate::timeline::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    Fade,
    Dissolve,
    WipeLeft,
    WipeRight,
    WipeUp,
    WipeDown,
    SlideLeft,
    SlideRight,
    ZoomIn,
    ZoomOut,
    Rotate,
    Circle,
    /// Any kind this build does not know; renders the incoming source as-is.
    #[serde(other)]
    Unknown,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 12] = [
        Self::Fade,
        Self::Dissolve,
        Self::WipeLeft,
        Self::WipeRight,
        Self::WipeUp,
        Self::WipeDown,
        Self::SlideLeft,
        Self::SlideRight,
        Self::ZoomIn,
        Self::ZoomOut,
        Self::Rotate,
        Self::Circle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Dissolve => "dissolve",
            Self::WipeLeft => "wipe-left",
            Self::WipeRight => "wipe-right",
            Self::WipeUp => "wipe-up",
            Self::WipeDown => "wipe-down",
            Self::SlideLeft => "slide-left",
            Self::SlideRight => "slide-right",
            Self::ZoomIn => "zoom-in",
            Self::ZoomOut => "zoom-out",
            Self::Rotate => "rotate",
            Self::Circle => "circle",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a user-supplied name; unrecognised names map to `Unknown`.
    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == name)
            .unwrap_or(Self::Unknown)
    }
}

/// A time-boxed blend from one entity into another.
///
/// The transition plays at the head of `to`: over
/// `[to.start, to.start + duration)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionSpec {
    pub id: EntityId,
    pub kind: TransitionKind,
    pub duration_ms: u32,
    pub from: EntityId,
    pub to: EntityId,
}

impl TransitionSpec {
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    /// Continuous progress in `[0, 1)` at `t` for a transition starting at
    /// `start`, or `None` outside its window.
    pub fn progress_at(&self, start: f64, t: f64) -> Option<f64> {
        let d = self.duration_secs();
        if d <= 0.0 || t < start || t >= start + d {
            return None;
        }
        Some((t - start) / d)
    }

    /// Whether this transition references `id` on either side.
    pub fn references(&self, id: EntityId) -> bool {
        self.from == id || self.to == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(ms: u32) -> TransitionSpec {
        TransitionSpec {
            id: EntityId(9),
            kind: TransitionKind::Fade,
            duration_ms: ms,
            from: EntityId(1),
            to: EntityId(2),
        }
    }

    #[test]
    fn test_progress_window() {
        let t = spec(1000);
        assert_eq!(t.progress_at(5.0, 4.99), None);
        assert_eq!(t.progress_at(5.0, 5.0), Some(0.0));
        assert!((t.progress_at(5.0, 5.5).unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(t.progress_at(5.0, 6.0), None);
    }

    #[test]
    fn test_zero_duration_never_active() {
        assert_eq!(spec(0).progress_at(0.0, 0.0), None);
    }

    #[test]
    fn test_kind_names_round_trip_through_serde() {
        for kind in TransitionKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
            assert_eq!(TransitionKind::parse(kind.name()), kind);
        }
        let unknown: TransitionKind = serde_json::from_str(r#""page-curl""#).unwrap();
        assert_eq!(unknown, TransitionKind::Unknown);
        assert_eq!(TransitionKind::parse("page-curl"), TransitionKind::Unknown);
    }
}
