//! Clips: placed, time-bounded instances of a media asset.

use serde::{Deserialize, Serialize};

use crate::asset::{AssetId, MediaAsset, MediaKind};
use crate::geometry::{FrameSize, Rect};
use crate::timeline::{EntityId, TrackKind};

/// Slowest and fastest decode rate a clip may request.
pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

/// A media asset placed on the timeline.
///
/// `[start, end)` is the clip's span on the virtual timeline, and
/// `[trim_start, trim_end)` is the window of the source it presents.
/// Timeline seconds map one-to-one onto source seconds; `speed` only changes
/// the rate the decode handle plays at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: EntityId,
    pub asset_id: AssetId,
    pub kind: MediaKind,

    pub start: f64,
    pub end: f64,
    pub trim_start: f64,
    pub trim_end: f64,

    /// Duration of the underlying source, copied from the asset at creation.
    pub source_duration: f64,

    pub z_index: i64,

    #[serde(default = "unit")]
    pub volume: f64,
    #[serde(default = "unit")]
    pub speed: f64,

    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub transform: ClipTransform,
    #[serde(default)]
    pub crop: Crop,

    #[serde(default = "visible_default")]
    pub visible: bool,
}

fn unit() -> f64 {
    1.0
}

fn visible_default() -> bool {
    true
}

impl Clip {
    /// Place `asset` at `start` presenting the whole source.
    pub fn from_asset(id: EntityId, asset: &MediaAsset, start: f64, z_index: i64) -> Self {
        let length = asset.duration_seconds.max(0.0);
        Self {
            id,
            asset_id: asset.id,
            kind: asset.kind,
            start,
            end: start + length,
            trim_start: 0.0,
            trim_end: length,
            source_duration: length,
            z_index,
            volume: 1.0,
            speed: 1.0,
            filters: Vec::new(),
            transform: ClipTransform::default(),
            crop: Crop::default(),
            visible: true,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Half-open visibility test: `start <= t < end` and not hidden.
    pub fn is_visible_at(&self, t: f64) -> bool {
        self.visible && self.start <= t && t < self.end
    }

    /// Position inside the source that corresponds to timeline time `t`.
    pub fn local_time(&self, t: f64) -> f64 {
        t - self.start + self.trim_start
    }

    /// Upper bound for `trim_end`. Still images can be held indefinitely.
    pub fn source_limit(&self) -> Option<f64> {
        match self.kind {
            MediaKind::Image => None,
            MediaKind::Video | MediaKind::Audio => Some(self.source_duration),
        }
    }

    pub fn track(&self) -> TrackKind {
        TrackKind::from(self.kind)
    }

    /// Whether this clip needs a decode handle.
    pub fn is_playable(&self) -> bool {
        self.kind.is_playable()
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    }

    /// Where the cropped source lands in the frame before rotation: fitted
    /// inside the frame with its aspect ratio preserved, then translated.
    pub fn placement(&self, src_w: f64, src_h: f64, frame: FrameSize) -> Rect {
        let (_, _, crop_w, crop_h) = self.crop.source_window(src_w, src_h);
        let fit = frame.rect().fit_inside(crop_w, crop_h);
        Rect::new(
            fit.x + self.transform.x,
            fit.y + self.transform.y,
            fit.w,
            fit.h,
        )
    }

    /// Axis-aligned frame bounds including rotation about the frame center.
    pub fn frame_bounds(&self, src_w: f64, src_h: f64, frame: FrameSize) -> Rect {
        self.placement(src_w, src_h, frame)
            .rotated_bounds(self.transform.rotation, frame.rect().center())
    }
}

/// Geometric transform applied about the frame center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ClipTransform {
    /// Clockwise rotation in degrees.
    pub rotation: f64,
    pub flip_h: bool,
    pub flip_v: bool,
    /// Translation in frame pixels.
    pub x: f64,
    pub y: f64,
}

impl ClipTransform {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// Source crop in percent. `width`/`height` select a fraction of the source;
/// `x`/`y` offset that window from the center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Crop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Crop {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        }
    }
}

impl Crop {
    /// Source-pixel window `(x, y, w, h)` this crop selects from a
    /// `src_w x src_h` source, clamped to the source bounds.
    pub fn source_window(&self, src_w: f64, src_h: f64) -> (f64, f64, f64, f64) {
        let w = src_w * (self.width.clamp(1.0, 100.0) / 100.0);
        let h = src_h * (self.height.clamp(1.0, 100.0) / 100.0);
        let cx = src_w / 2.0 + src_w * self.x / 100.0;
        let cy = src_h / 2.0 + src_h * self.y / 100.0;
        let x = (cx - w / 2.0).clamp(0.0, src_w - w);
        let y = (cy - h / 2.0).clamp(0.0, src_h - h);
        (x, y, w, h)
    }
}

/// A single color adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub kind: FilterKind,
    /// Percent for most kinds; degrees for hue-rotate; pixels for blur.
    pub value: f64,
}

impl Filter {
    pub fn new(kind: FilterKind, value: f64) -> Self {
        Self { kind, value }
    }

    /// True when applying this filter leaves pixels unchanged.
    pub fn is_identity(&self) -> bool {
        match self.kind.neutral_value() {
            Some(neutral) => (self.value - neutral).abs() < f64::EPSILON,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    Brightness,
    Contrast,
    Saturation,
    HueRotate,
    Blur,
    Grayscale,
    Sepia,
    #[serde(other)]
    Unknown,
}

impl FilterKind {
    /// Position in the fixed application order. `None` for unknown kinds,
    /// which are dropped.
    pub fn canonical_rank(self) -> Option<u8> {
        match self {
            Self::Brightness => Some(0),
            Self::Contrast => Some(1),
            Self::Saturation => Some(2),
            Self::HueRotate => Some(3),
            Self::Blur => Some(4),
            Self::Grayscale => Some(5),
            Self::Sepia => Some(6),
            Self::Unknown => None,
        }
    }

    pub fn neutral_value(self) -> Option<f64> {
        match self {
            Self::Brightness | Self::Contrast | Self::Saturation => Some(100.0),
            Self::HueRotate | Self::Blur | Self::Grayscale | Self::Sepia => Some(0.0),
            Self::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn video_asset(duration: f64) -> MediaAsset {
        let mut asset = MediaAsset::with_fallback_metadata(
            AssetId(7),
            MediaKind::Video,
            PathBuf::from("a.mp4"),
        );
        asset.duration_seconds = duration;
        asset
    }

    #[test]
    fn test_from_asset_spans_whole_source() {
        let clip = Clip::from_asset(EntityId(1), &video_asset(4.0), 2.0, 3);
        assert_eq!(clip.start, 2.0);
        assert_eq!(clip.end, 6.0);
        assert_eq!(clip.trim_end, 4.0);
        assert_eq!(clip.source_limit(), Some(4.0));
        assert_eq!(clip.track(), TrackKind::Video);
    }

    #[test]
    fn test_visibility_is_half_open() {
        let clip = Clip::from_asset(EntityId(1), &video_asset(5.0), 0.0, 0);
        assert!(clip.is_visible_at(0.0));
        assert!(clip.is_visible_at(4.999));
        assert!(!clip.is_visible_at(5.0));

        let mut hidden = clip.clone();
        hidden.visible = false;
        assert!(!hidden.is_visible_at(1.0));
    }

    #[test]
    fn test_local_time_honors_trim() {
        let mut clip = Clip::from_asset(EntityId(1), &video_asset(10.0), 3.0, 0);
        clip.trim_start = 2.0;
        assert!((clip.local_time(4.5) - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut clip = Clip::from_asset(EntityId(1), &video_asset(1.0), 0.0, 0);
        clip.set_speed(10.0);
        assert_eq!(clip.speed, MAX_SPEED);
        clip.set_speed(0.0);
        assert_eq!(clip.speed, MIN_SPEED);
    }

    #[test]
    fn test_unknown_filter_kind_deserializes() {
        let f: Filter = serde_json::from_str(r#"{"kind":"vignette","value":30}"#).unwrap();
        assert_eq!(f.kind, FilterKind::Unknown);
        assert!(f.kind.canonical_rank().is_none());

        let hue: Filter = serde_json::from_str(r#"{"kind":"hue-rotate","value":90}"#).unwrap();
        assert_eq!(hue.kind, FilterKind::HueRotate);
    }

    #[test]
    fn test_crop_window_is_centered() {
        let crop = Crop {
            width: 50.0,
            height: 50.0,
            ..Crop::default()
        };
        assert_eq!(crop.source_window(200.0, 100.0), (50.0, 25.0, 100.0, 50.0));
        assert_eq!(
            Crop::default().source_window(200.0, 100.0),
            (0.0, 0.0, 200.0, 100.0)
        );
    }

    #[test]
    fn test_placement_fits_and_translates() {
        let mut clip = Clip::from_asset(EntityId(1), &video_asset(1.0), 0.0, 0);
        let frame = FrameSize::new(1920, 1080);
        let fit = clip.placement(800.0, 600.0, frame);
        assert_eq!(fit, Rect::new(240.0, 0.0, 1440.0, 1080.0));

        clip.transform.x = 100.0;
        clip.transform.rotation = 90.0;
        let bounds = clip.frame_bounds(800.0, 600.0, frame);
        assert!((bounds.w - 1080.0).abs() < 1e-6);
        assert!((bounds.h - 1440.0).abs() < 1e-6);
        assert!((bounds.center().y - 540.0 - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_clip_json_uses_camel_case() {
        let clip = Clip::from_asset(EntityId(1), &video_asset(1.0), 0.0, 0);
        let json = serde_json::to_value(&clip).unwrap();
        assert!(json.get("trimStart").is_some());
        assert!(json.get("zIndex").is_some());
        assert_eq!(json["transform"]["flipH"], false);
    }
}
