//! Transition Engine.
//!
//! Each transition kind is a pure function from quantised progress to a
//! [`TransitionFrame`] describing how the outgoing and incoming layers are
//! combined. Progress is snapped to a fixed step count, so a transition
//! renders the same sequence of frames no matter how often it is sampled.
//! Unknown kinds present the incoming layer unmodified.

use image::RgbaImage;
use montage_project_model::{FrameSize, Rect, Rgba, TransitionKind, TransitionSpec};

use crate::surface::{MediaPlacement, Surface};

/// Smallest scale a zooming layer is drawn at.
const MIN_SCALE: f64 = 0.01;

/// Snap `progress` down to a multiple of `1 / steps`, within `[0, 1]`.
pub fn quantize(progress: f64, steps: u32) -> f64 {
    let steps = steps.max(1) as f64;
    ((progress.clamp(0.0, 1.0) * steps).floor() / steps).clamp(0.0, 1.0)
}

/// Region of the frame in which the incoming layer is visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reveal {
    Full,
    /// Visible where the normalized coordinate along the axis lies in
    /// `[from, to)`.
    Horizontal { from: f64, to: f64 },
    Vertical { from: f64, to: f64 },
    /// Visible within `radius` (fraction of the half-diagonal) of the center.
    Circle { radius: f64 },
}

impl Reveal {
    fn contains(&self, x: u32, y: u32, frame: FrameSize) -> bool {
        let u = (x as f64 + 0.5) / frame.width.max(1) as f64;
        let v = (y as f64 + 0.5) / frame.height.max(1) as f64;
        match *self {
            Self::Full => true,
            Self::Horizontal { from, to } => u >= from && u < to,
            Self::Vertical { from, to } => v >= from && v < to,
            Self::Circle { radius } => {
                let dx = (u - 0.5) * frame.width as f64;
                let dy = (v - 0.5) * frame.height as f64;
                let half_diag = (frame.width as f64).hypot(frame.height as f64) / 2.0;
                dx.hypot(dy) <= radius * half_diag
            }
        }
    }
}

/// How the two layers combine at one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionFrame {
    pub outgoing_opacity: f32,
    /// Outgoing layer offset as a fraction of the frame size.
    pub outgoing_offset: (f64, f64),
    pub incoming_opacity: f32,
    pub incoming_offset: (f64, f64),
    pub incoming_scale: f64,
    /// Clockwise degrees about the frame center.
    pub incoming_rotation: f64,
    pub reveal: Reveal,
}

impl TransitionFrame {
    /// Incoming layer drawn as-is, outgoing layer hidden.
    pub const PASS_THROUGH: TransitionFrame = TransitionFrame {
        outgoing_opacity: 0.0,
        outgoing_offset: (0.0, 0.0),
        incoming_opacity: 1.0,
        incoming_offset: (0.0, 0.0),
        incoming_scale: 1.0,
        incoming_rotation: 0.0,
        reveal: Reveal::Full,
    };

    /// Both layers drawn untransformed, incoming fully opaque on top.
    fn over_outgoing() -> Self {
        Self {
            outgoing_opacity: 1.0,
            ..Self::PASS_THROUGH
        }
    }

    pub fn for_kind(kind: TransitionKind, progress: f64) -> Self {
        let p = progress.clamp(0.0, 1.0);
        let pf = p as f32;
        match kind {
            // Dip through black: out over the first half, in over the second.
            TransitionKind::Fade => Self {
                outgoing_opacity: (1.0 - 2.0 * pf).max(0.0),
                incoming_opacity: (2.0 * pf - 1.0).max(0.0),
                ..Self::PASS_THROUGH
            },
            TransitionKind::Dissolve => Self {
                incoming_opacity: pf,
                ..Self::over_outgoing()
            },
            TransitionKind::WipeLeft => Self {
                reveal: Reveal::Horizontal {
                    from: 1.0 - p,
                    to: 1.0,
                },
                ..Self::over_outgoing()
            },
            TransitionKind::WipeRight => Self {
                reveal: Reveal::Horizontal { from: 0.0, to: p },
                ..Self::over_outgoing()
            },
            TransitionKind::WipeUp => Self {
                reveal: Reveal::Vertical {
                    from: 1.0 - p,
                    to: 1.0,
                },
                ..Self::over_outgoing()
            },
            TransitionKind::WipeDown => Self {
                reveal: Reveal::Vertical { from: 0.0, to: p },
                ..Self::over_outgoing()
            },
            TransitionKind::SlideLeft => Self {
                outgoing_offset: (-p, 0.0),
                incoming_offset: (1.0 - p, 0.0),
                ..Self::over_outgoing()
            },
            TransitionKind::SlideRight => Self {
                outgoing_offset: (p, 0.0),
                incoming_offset: (p - 1.0, 0.0),
                ..Self::over_outgoing()
            },
            TransitionKind::ZoomIn => Self {
                incoming_opacity: pf,
                incoming_scale: p.max(MIN_SCALE),
                ..Self::over_outgoing()
            },
            TransitionKind::ZoomOut => Self {
                incoming_opacity: pf,
                incoming_scale: 2.0 - p,
                ..Self::over_outgoing()
            },
            TransitionKind::Rotate => Self {
                incoming_opacity: pf,
                incoming_scale: p.max(MIN_SCALE),
                incoming_rotation: (1.0 - p) * -180.0,
                ..Self::over_outgoing()
            },
            TransitionKind::Circle => Self {
                reveal: Reveal::Circle { radius: p },
                ..Self::over_outgoing()
            },
            TransitionKind::Unknown => Self::PASS_THROUGH,
        }
    }
}

/// Renders transitions with a fixed step count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEngine {
    steps: u32,
}

impl TransitionEngine {
    pub fn new(steps: u32) -> Self {
        Self {
            steps: steps.max(1),
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Quantised progress of `spec` at time `t`, where the incoming entity
    /// starts at `start`. `None` outside the transition window.
    pub fn progress(&self, spec: &TransitionSpec, start: f64, t: f64) -> Option<f64> {
        spec.progress_at(start, t)
            .map(|p| quantize(p, self.steps))
    }

    /// Combine two frame-sized layers into one.
    pub fn compose(
        &self,
        frame: &TransitionFrame,
        outgoing: Option<&RgbaImage>,
        incoming: &RgbaImage,
        size: FrameSize,
    ) -> RgbaImage {
        let mut out = Surface::transparent(size);

        if let Some(outgoing) = outgoing {
            if frame.outgoing_opacity > 0.0 {
                let mut placement = MediaPlacement::full_frame(outgoing.width(), outgoing.height(), size);
                placement.dest = offset_rect(size, frame.outgoing_offset, 1.0);
                out.draw_media(outgoing, &placement, frame.outgoing_opacity);
            }
        }

        if frame.incoming_opacity > 0.0 {
            let mut placement = MediaPlacement::full_frame(incoming.width(), incoming.height(), size);
            placement.dest = offset_rect(size, frame.incoming_offset, frame.incoming_scale);
            placement.rotation = frame.incoming_rotation;
            let reveal = frame.reveal;
            out.draw_media_where(incoming, &placement, frame.incoming_opacity, |x, y| {
                reveal.contains(x, y, size)
            });
        }

        out.into_image()
    }

    /// Every step of a transition from `outgoing` to `incoming`, progress
    /// `0, 1/steps, ..., 1`.
    pub fn sequence(
        &self,
        kind: TransitionKind,
        outgoing: Option<&RgbaImage>,
        incoming: &RgbaImage,
        size: FrameSize,
    ) -> Vec<RgbaImage> {
        (0..=self.steps)
            .map(|step| {
                let progress = step as f64 / self.steps as f64;
                self.compose(&TransitionFrame::for_kind(kind, progress), outgoing, incoming, size)
            })
            .collect()
    }
}

fn offset_rect(size: FrameSize, offset: (f64, f64), scale: f64) -> Rect {
    let full = size.rect();
    let center = full.center();
    Rect::centered(
        center.x + offset.0 * full.w,
        center.y + offset.1 * full.h,
        full.w * scale,
        full.h * scale,
    )
}

/// Frame-sized layer of one flat color; used when a side has no picture.
pub fn flat_layer(size: FrameSize, color: Rgba) -> RgbaImage {
    Surface::new(size, color).into_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba as Px;
    use montage_project_model::EntityId;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn layers(size: FrameSize) -> (RgbaImage, RgbaImage) {
        (
            RgbaImage::from_pixel(size.width, size.height, Px(RED)),
            RgbaImage::from_pixel(size.width, size.height, Px(BLUE)),
        )
    }

    #[test]
    fn test_quantize_snaps_down() {
        assert_eq!(quantize(0.0, 30), 0.0);
        assert_eq!(quantize(0.999, 10), 0.9);
        assert_eq!(quantize(1.5, 10), 1.0);
        assert_eq!(quantize(0.55, 1), 0.0);
    }

    #[test]
    fn test_progress_only_inside_window() {
        let engine = TransitionEngine::new(4);
        let spec = TransitionSpec {
            id: EntityId(5),
            kind: TransitionKind::Dissolve,
            duration_ms: 1000,
            from: EntityId(1),
            to: EntityId(2),
        };
        assert_eq!(engine.progress(&spec, 2.0, 1.9), None);
        assert_eq!(engine.progress(&spec, 2.0, 2.3), Some(0.25));
        assert_eq!(engine.progress(&spec, 2.0, 2.49), Some(0.25));
        assert_eq!(engine.progress(&spec, 2.0, 3.0), None);
    }

    #[test]
    fn test_endpoints_show_one_side() {
        let size = FrameSize::new(8, 4);
        let (from, to) = layers(size);
        let engine = TransitionEngine::new(10);
        for kind in TransitionKind::ALL {
            let end = engine.compose(&TransitionFrame::for_kind(kind, 1.0), Some(&from), &to, size);
            assert_eq!(end.get_pixel(4, 2).0, BLUE, "{} at 1.0", kind.name());
        }
        for kind in [TransitionKind::Dissolve, TransitionKind::WipeLeft, TransitionKind::Circle] {
            let start = engine.compose(&TransitionFrame::for_kind(kind, 0.0), Some(&from), &to, size);
            assert_eq!(start.get_pixel(4, 2).0, RED, "{} at 0.0", kind.name());
        }
    }

    #[test]
    fn test_wipe_right_splits_frame() {
        let size = FrameSize::new(10, 2);
        let (from, to) = layers(size);
        let engine = TransitionEngine::new(10);
        let mid = engine.compose(
            &TransitionFrame::for_kind(TransitionKind::WipeRight, 0.5),
            Some(&from),
            &to,
            size,
        );
        assert_eq!(mid.get_pixel(2, 0).0, BLUE);
        assert_eq!(mid.get_pixel(7, 0).0, RED);
    }

    #[test]
    fn test_unknown_kind_passes_incoming_through() {
        let size = FrameSize::new(4, 4);
        let (from, to) = layers(size);
        let engine = TransitionEngine::new(10);
        for p in [0.0, 0.3, 0.9] {
            let frame = TransitionFrame::for_kind(TransitionKind::Unknown, p);
            assert_eq!(frame, TransitionFrame::PASS_THROUGH);
            let out = engine.compose(&frame, Some(&from), &to, size);
            assert_eq!(out, to);
        }
    }

    #[test]
    fn test_sequence_is_repeatable() {
        let size = FrameSize::new(6, 6);
        let (from, to) = layers(size);
        let engine = TransitionEngine::new(5);
        let a = engine.sequence(TransitionKind::Rotate, Some(&from), &to, size);
        let b = engine.sequence(TransitionKind::Rotate, Some(&from), &to, size);
        assert_eq!(a.len(), 6);
        assert_eq!(a, b);
    }
}
