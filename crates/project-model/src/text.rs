//! Text overlays and their intro animations.

use serde::{Deserialize, Serialize};

use crate::geometry::{FrameSize, Rect};
use crate::timeline::EntityId;

/// Length of every text intro animation, in seconds.
pub const TEXT_INTRO_SECS: f64 = 0.5;

/// Seconds per character revealed by the typewriter animation.
pub const TYPEWRITER_SECS_PER_CHAR: f64 = 0.05;

/// Approximate glyph advance as a fraction of font size.
const CHAR_WIDTH_FACTOR: f64 = 0.6;
const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// A time-bounded text element, independent of any media asset.
///
/// `x`/`y` are percentages (0–100) of the frame. `x` is the anchor selected
/// by `text_align`; `y` is the vertical center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOverlay {
    pub id: EntityId,
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub color: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub text_align: TextAlign,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub animation: TextAnimation,
    pub z_index: i64,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

impl TextOverlay {
    /// A centered white caption.
    pub fn new(id: EntityId, text: impl Into<String>, start: f64, end: f64, z_index: i64) -> Self {
        Self {
            id,
            text: text.into(),
            start,
            end,
            x: 50.0,
            y: 50.0,
            font_size: 48.0,
            color: "#ffffff".to_string(),
            font_family: default_font_family(),
            font_weight: FontWeight::Normal,
            text_align: TextAlign::Center,
            background_color: None,
            opacity: 1.0,
            animation: TextAnimation::None,
            z_index,
            visible: true,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_visible_at(&self, t: f64) -> bool {
        self.visible && self.start <= t && t < self.end
    }

    /// Move the anchor, keeping it inside the frame.
    pub fn set_position(&mut self, x_pct: f64, y_pct: f64) {
        self.x = x_pct.clamp(0.0, 100.0);
        self.y = y_pct.clamp(0.0, 100.0);
    }

    /// Character-count estimate of the rendered box size in frame pixels.
    pub fn estimated_size(&self) -> (f64, f64) {
        let widest = self
            .text
            .lines()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
            .max(1);
        let lines = self.text.lines().count().max(1);
        (
            widest as f64 * self.font_size * CHAR_WIDTH_FACTOR,
            lines as f64 * self.font_size * LINE_HEIGHT_FACTOR,
        )
    }

    /// Approximate bounding box in frame pixels.
    pub fn bounds(&self, frame: FrameSize) -> Rect {
        let anchor = frame.from_percent(self.x, self.y);
        let (w, h) = self.estimated_size();
        let left = match self.text_align {
            TextAlign::Left => anchor.x,
            TextAlign::Center => anchor.x - w / 2.0,
            TextAlign::Right => anchor.x - w,
        };
        Rect::new(left, anchor.y - h / 2.0, w, h)
    }

    /// Animation state at timeline time `t`.
    pub fn animation_at(&self, t: f64) -> AnimationFrame {
        self.animation
            .evaluate(t - self.start, self.text.chars().count(), self.font_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Bold,
    #[default]
    #[serde(other)]
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TextAnimation {
    FadeIn,
    SlideUp,
    Typewriter,
    Pop,
    #[default]
    #[serde(other)]
    None,
}

/// Per-frame modifiers produced by a [`TextAnimation`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    /// Multiplier on the overlay's own opacity.
    pub opacity: f64,
    /// Downward offset in frame pixels.
    pub offset_y: f64,
    pub scale: f64,
    /// Number of characters to draw; `None` draws everything.
    pub visible_chars: Option<usize>,
}

impl AnimationFrame {
    pub const IDENTITY: AnimationFrame = AnimationFrame {
        opacity: 1.0,
        offset_y: 0.0,
        scale: 1.0,
        visible_chars: None,
    };
}

impl TextAnimation {
    /// Pure function of seconds since the overlay started.
    pub fn evaluate(self, elapsed: f64, char_count: usize, font_size: f64) -> AnimationFrame {
        let p = (elapsed / TEXT_INTRO_SECS).clamp(0.0, 1.0);
        match self {
            Self::None => AnimationFrame::IDENTITY,
            Self::FadeIn => AnimationFrame {
                opacity: p,
                ..AnimationFrame::IDENTITY
            },
            Self::SlideUp => AnimationFrame {
                opacity: p,
                offset_y: (1.0 - ease_out_cubic(p)) * font_size,
                ..AnimationFrame::IDENTITY
            },
            Self::Typewriter => {
                let shown = (elapsed.max(0.0) / TYPEWRITER_SECS_PER_CHAR).floor() as usize;
                AnimationFrame {
                    visible_chars: Some(shown.min(char_count)),
                    ..AnimationFrame::IDENTITY
                }
            }
            Self::Pop => AnimationFrame {
                scale: pop_scale(p),
                opacity: (p * 2.0).min(1.0),
                ..AnimationFrame::IDENTITY
            },
        }
    }
}

fn ease_out_cubic(p: f64) -> f64 {
    1.0 - (1.0 - p).powi(3)
}

// Grows to 110% over the first 70% of the intro, then settles at 100%.
fn pop_scale(p: f64) -> f64 {
    if p < 0.7 {
        0.5 + 0.6 * (p / 0.7)
    } else {
        1.1 - 0.1 * ((p - 0.7) / 0.3)
    }
}

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#')?;
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => Some(Self::new(
                nibble(0)? * 17,
                nibble(1)? * 17,
                nibble(2)? * 17,
                255,
            )),
            6 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_follow_alignment() {
        let frame = FrameSize::new(1000, 1000);
        let mut overlay = TextOverlay::new(EntityId(1), "abcd", 0.0, 5.0, 0);
        overlay.font_size = 10.0;
        // 4 chars * 10 * 0.6 = 24 wide, 12 high.
        let centered = overlay.bounds(frame);
        assert!((centered.x - 488.0).abs() < 1e-9);
        assert!((centered.w - 24.0).abs() < 1e-9);
        assert!((centered.y - 494.0).abs() < 1e-9);

        overlay.text_align = TextAlign::Left;
        assert!((overlay.bounds(frame).x - 500.0).abs() < 1e-9);
        overlay.text_align = TextAlign::Right;
        assert!((overlay.bounds(frame).right() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_position_is_clamped() {
        let mut overlay = TextOverlay::new(EntityId(1), "hi", 0.0, 1.0, 0);
        overlay.set_position(-5.0, 140.0);
        assert_eq!((overlay.x, overlay.y), (0.0, 100.0));
    }

    #[test]
    fn test_fade_in_ramps_over_intro() {
        let a = TextAnimation::FadeIn.evaluate(0.25, 5, 40.0);
        assert!((a.opacity - 0.5).abs() < 1e-9);
        let done = TextAnimation::FadeIn.evaluate(3.0, 5, 40.0);
        assert_eq!(done, AnimationFrame::IDENTITY);
    }

    #[test]
    fn test_typewriter_reveals_characters() {
        let a = TextAnimation::Typewriter.evaluate(0.12, 10, 40.0);
        assert_eq!(a.visible_chars, Some(2));
        let all = TextAnimation::Typewriter.evaluate(100.0, 10, 40.0);
        assert_eq!(all.visible_chars, Some(10));
    }

    #[test]
    fn test_pop_settles_at_unit_scale() {
        assert!((TextAnimation::Pop.evaluate(0.0, 1, 1.0).scale - 0.5).abs() < 1e-9);
        assert!((TextAnimation::Pop.evaluate(0.5, 1, 1.0).scale - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_animation_is_none() {
        let a: TextAnimation = serde_json::from_str(r#""bounce""#).unwrap();
        assert_eq!(a, TextAnimation::None);
        let b: TextAnimation = serde_json::from_str(r#""slide-up""#).unwrap();
        assert_eq!(b, TextAnimation::SlideUp);
    }

    #[test]
    fn test_unknown_font_weight_is_normal() {
        let w: FontWeight = serde_json::from_str(r#""black""#).unwrap();
        assert_eq!(w, FontWeight::Normal);
        let b: FontWeight = serde_json::from_str(r#""bold""#).unwrap();
        assert_eq!(b, FontWeight::Bold);

        let overlay: TextOverlay = serde_json::from_str(
            r##"{"id":4,"text":"hi","start":0.0,"end":2.0,"zIndex":1,
                "x":50.0,"y":50.0,"fontSize":32.0,"color":"#ffffff",
                "fontWeight":"heavy","animation":"wobble"}"##,
        )
        .unwrap();
        assert_eq!(overlay.font_weight, FontWeight::Normal);
        assert_eq!(overlay.animation, TextAnimation::None);
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!(Rgba::parse_hex("#fff"), Some(Rgba::WHITE));
        assert_eq!(
            Rgba::parse_hex("#10203040"),
            Some(Rgba::new(0x10, 0x20, 0x30, 0x40))
        );
        assert_eq!(Rgba::parse_hex("#ff0000"), Some(Rgba::new(255, 0, 0, 255)));
        assert_eq!(Rgba::parse_hex("red"), None);
        assert_eq!(Rgba::parse_hex("#12345"), None);
    }
}
