//! CPU render surface over an `image::RgbaImage`.
//!
//! All drawing is straight-alpha "over" compositing. Media is drawn by
//! inverse-mapping every covered destination pixel back into the source and
//! sampling it bilinearly, so rotation, flips, crop and fit are one pass.

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgba as Px, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use montage_common::{MontageError, MontageResult};
use montage_project_model::{
    AnimationFrame, Clip, FontWeight, FrameSize, Point2D, Rect, Rgba, TextAlign, TextOverlay,
};

/// Padding around text when a background box is drawn, as a fraction of
/// the font size.
const TEXT_BOX_PADDING: f64 = 0.25;

/// Fonts tried by [`FontBook::system`], in order.
const SYSTEM_FONT_CANDIDATES: &[(&str, &str)] = &[
    (
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    ),
    (
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    ),
    (
        "C:\\Windows\\Fonts\\arial.ttf",
        "C:\\Windows\\Fonts\\arialbd.ttf",
    ),
];

/// Fonts available to the text renderer.
#[derive(Clone, Default)]
pub struct FontBook {
    regular: Option<FontArc>,
    bold: Option<FontArc>,
}

impl FontBook {
    /// No fonts: text overlays draw their background box only.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> MontageResult<Self> {
        let font = load_font(path)?;
        Ok(Self {
            regular: Some(font),
            bold: None,
        })
    }

    /// First installed system font from a fixed candidate list.
    pub fn system() -> Self {
        for (regular, bold) in SYSTEM_FONT_CANDIDATES {
            let Ok(font) = load_font(Path::new(regular)) else {
                continue;
            };
            tracing::debug!(path = regular, "Loaded system font");
            return Self {
                regular: Some(font),
                bold: load_font(Path::new(bold)).ok(),
            };
        }
        tracing::warn!("No system font found; text overlays render without glyphs");
        Self::empty()
    }

    pub fn has_glyphs(&self) -> bool {
        self.regular.is_some()
    }

    pub fn for_weight(&self, weight: FontWeight) -> Option<&FontArc> {
        match weight {
            FontWeight::Bold => self.bold.as_ref().or(self.regular.as_ref()),
            FontWeight::Normal => self.regular.as_ref(),
        }
    }
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("regular", &self.regular.is_some())
            .field("bold", &self.bold.is_some())
            .finish()
    }
}

fn load_font(path: &Path) -> MontageResult<FontArc> {
    let bytes = std::fs::read(path).map_err(|_| MontageError::FileNotFound {
        path: PathBuf::from(path),
    })?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| MontageError::render(format!("Invalid font {}: {e}", path.display())))
}

/// Where and how a source picture lands on the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaPlacement {
    /// Source window `(x, y, w, h)` in source pixels.
    pub window: (f64, f64, f64, f64),
    /// Unrotated destination rectangle in frame pixels.
    pub dest: Rect,
    /// Clockwise rotation in degrees about `pivot`.
    pub rotation: f64,
    pub pivot: Point2D,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl MediaPlacement {
    pub fn for_clip(clip: &Clip, src_w: u32, src_h: u32, frame: FrameSize) -> Self {
        let (w, h) = (src_w as f64, src_h as f64);
        Self {
            window: clip.crop.source_window(w, h),
            dest: clip.placement(w, h, frame),
            rotation: clip.transform.rotation,
            pivot: frame.rect().center(),
            flip_h: clip.transform.flip_h,
            flip_v: clip.transform.flip_v,
        }
    }

    /// Fill the whole frame with the whole source, stretched.
    pub fn full_frame(src_w: u32, src_h: u32, frame: FrameSize) -> Self {
        Self {
            window: (0.0, 0.0, src_w as f64, src_h as f64),
            dest: frame.rect(),
            rotation: 0.0,
            pivot: frame.rect().center(),
            flip_h: false,
            flip_v: false,
        }
    }

    /// Map a frame point back to source pixel coordinates, or `None` if the
    /// point is outside the placed picture.
    fn source_point(&self, p: Point2D) -> Option<(f64, f64)> {
        let p = if self.rotation == 0.0 {
            p
        } else {
            p.rotate_about(self.pivot, -self.rotation)
        };
        let mut u = (p.x - self.dest.x) / self.dest.w;
        let mut v = (p.y - self.dest.y) / self.dest.h;
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return None;
        }
        if self.flip_h {
            u = 1.0 - u;
        }
        if self.flip_v {
            v = 1.0 - v;
        }
        let (sx, sy, sw, sh) = self.window;
        Some((sx + u * sw, sy + v * sh))
    }
}

/// A frame-sized RGBA canvas.
#[derive(Debug, Clone)]
pub struct Surface {
    image: RgbaImage,
    frame: FrameSize,
}

impl Surface {
    pub fn new(frame: FrameSize, background: Rgba) -> Self {
        let px = Px([background.r, background.g, background.b, background.a]);
        Self {
            image: RgbaImage::from_pixel(frame.width, frame.height, px),
            frame,
        }
    }

    pub fn transparent(frame: FrameSize) -> Self {
        Self::new(frame, Rgba::new(0, 0, 0, 0))
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Composite one straight-alpha pixel over the surface.
    pub fn blend_pixel(&mut self, x: u32, y: u32, src: [u8; 4], opacity: f32) {
        if x >= self.image.width() || y >= self.image.height() {
            return;
        }
        let dst = self.image.get_pixel_mut(x, y);
        dst.0 = over(dst.0, src, opacity);
    }

    /// Fill a frame-space rectangle, clipped to the surface.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba, opacity: f32) {
        let Some((x0, y0, x1, y1)) = self.clip_rect(rect) else {
            return;
        };
        let src = [color.r, color.g, color.b, color.a];
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend_pixel(x, y, src, opacity);
            }
        }
    }

    /// Composite a frame-sized layer over this surface.
    pub fn draw_layer(&mut self, layer: &RgbaImage, opacity: f32) {
        let w = self.image.width().min(layer.width());
        let h = self.image.height().min(layer.height());
        for y in 0..h {
            for x in 0..w {
                let src = layer.get_pixel(x, y).0;
                if src[3] != 0 {
                    self.blend_pixel(x, y, src, opacity);
                }
            }
        }
    }

    /// Draw a source picture according to `placement`.
    pub fn draw_media(&mut self, source: &RgbaImage, placement: &MediaPlacement, opacity: f32) {
        self.draw_media_where(source, placement, opacity, |_, _| true);
    }

    /// Like [`Surface::draw_media`], limited to destination pixels for which
    /// `mask(x, y)` holds.
    pub fn draw_media_where(
        &mut self,
        source: &RgbaImage,
        placement: &MediaPlacement,
        opacity: f32,
        mask: impl Fn(u32, u32) -> bool,
    ) {
        if source.width() == 0 || source.height() == 0 || opacity <= 0.0 {
            return;
        }
        let bounds = placement
            .dest
            .rotated_bounds(placement.rotation, placement.pivot);
        let Some((x0, y0, x1, y1)) = self.clip_rect(bounds) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                if !mask(x, y) {
                    continue;
                }
                let center = Point2D::new(x as f64 + 0.5, y as f64 + 0.5);
                if let Some((sx, sy)) = placement.source_point(center) {
                    let src = sample_bilinear(source, sx, sy);
                    self.blend_pixel(x, y, src, opacity);
                }
            }
        }
    }

    /// Draw a text overlay: optional background box, then glyphs if a font
    /// is available.
    pub fn draw_text(&mut self, overlay: &TextOverlay, anim: &AnimationFrame, fonts: &FontBook) {
        let opacity = (overlay.opacity * anim.opacity).clamp(0.0, 1.0) as f32;
        if opacity <= 0.0 {
            return;
        }
        let text: String = match anim.visible_chars {
            Some(n) => overlay.text.chars().take(n).collect(),
            None => overlay.text.clone(),
        };
        let size = overlay.font_size * anim.scale;
        let bounds = overlay.bounds(self.frame);
        let center = bounds.center();
        let scaled = Rect::centered(
            center.x,
            center.y + anim.offset_y,
            bounds.w * anim.scale,
            bounds.h * anim.scale,
        );

        if let Some(bg) = overlay
            .background_color
            .as_deref()
            .and_then(Rgba::parse_hex)
        {
            let pad = size * TEXT_BOX_PADDING;
            let boxed = Rect::new(
                scaled.x - pad,
                scaled.y - pad,
                scaled.w + 2.0 * pad,
                scaled.h + 2.0 * pad,
            );
            self.fill_rect(boxed, bg, opacity);
        }

        let Some(font) = fonts.for_weight(overlay.font_weight) else {
            return;
        };
        if text.is_empty() || size < 1.0 {
            return;
        }
        let color = Rgba::parse_hex(&overlay.color).unwrap_or(Rgba::WHITE);
        let scale = PxScale::from(size as f32);
        let line_height = size * 1.2;
        let anchor_x = self.frame.from_percent(overlay.x, overlay.y).x;

        for (i, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let (w, h) = text_size(scale, font, line);
            if w == 0 || h == 0 {
                continue;
            }
            let left = match overlay.text_align {
                TextAlign::Left => anchor_x,
                TextAlign::Center => anchor_x - w as f64 / 2.0,
                TextAlign::Right => anchor_x - w as f64,
            };
            let top = scaled.y + i as f64 * line_height + (line_height - size) / 2.0;

            // Render coverage into a mask, then tint it.
            let mut mask = RgbaImage::new(w + 2, (line_height.ceil() as u32).max(h) + 2);
            draw_text_mut(&mut mask, Px([255, 255, 255, 255]), 1, 1, scale, font, line);
            let (ox, oy) = (left.round() as i64 - 1, top.round() as i64 - 1);
            for (mx, my, px) in mask.enumerate_pixels() {
                let coverage = px.0[3];
                if coverage == 0 {
                    continue;
                }
                let (x, y) = (ox + mx as i64, oy + my as i64);
                if x < 0 || y < 0 {
                    continue;
                }
                let a = ((color.a as u16 * coverage as u16) / 255) as u8;
                self.blend_pixel(x as u32, y as u32, [color.r, color.g, color.b, a], opacity);
            }
        }
    }

    fn clip_rect(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.x.floor().max(0.0);
        let y0 = rect.y.floor().max(0.0);
        let x1 = rect.right().ceil().min(self.image.width() as f64);
        let y1 = rect.bottom().ceil().min(self.image.height() as f64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

/// Straight-alpha "over".
pub fn over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let sa = src[3] as f32 / 255.0 * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

/// Bilinear sample at source pixel coordinates (pixel centers at `.5`),
/// interpolating in premultiplied space.
pub fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> [u8; 4] {
    let max_x = src.width() as i64 - 1;
    let max_y = src.height() as i64 - 1;
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = (fx - x0) as f32;
    let ty = (fy - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let fetch = |xi: i64, yi: i64| -> [f32; 4] {
        let p = src
            .get_pixel(xi.clamp(0, max_x) as u32, yi.clamp(0, max_y) as u32)
            .0;
        let a = p[3] as f32 / 255.0;
        [p[0] as f32 * a, p[1] as f32 * a, p[2] as f32 * a, p[3] as f32]
    };
    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut acc = [0f32; 4];
    for c in 0..4 {
        let top = p00[c] + (p10[c] - p00[c]) * tx;
        let bottom = p01[c] + (p11[c] - p01[c]) * tx;
        acc[c] = top + (bottom - top) * ty;
    }
    let a = acc[3];
    if a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let unpremul = 255.0 / a;
    [
        (acc[0] * unpremul).round().clamp(0.0, 255.0) as u8,
        (acc[1] * unpremul).round().clamp(0.0, 255.0) as u8,
        (acc[2] * unpremul).round().clamp(0.0, 255.0) as u8,
        a.round().clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_project_model::EntityId;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Px(px))
    }

    #[test]
    fn test_over_endpoints() {
        let dst = [10, 20, 30, 255];
        assert_eq!(over(dst, [200, 0, 0, 0], 1.0), dst);
        assert_eq!(over(dst, [200, 0, 0, 255], 1.0), [200, 0, 0, 255]);
        assert_eq!(over(dst, [200, 0, 0, 255], 0.0), dst);
        let half = over([0, 0, 0, 255], [255, 255, 255, 255], 0.5);
        assert!((127..=128).contains(&half[0]));
        assert_eq!(half[3], 255);
    }

    #[test]
    fn test_bilinear_on_solid_is_exact() {
        let img = solid(4, 4, [50, 100, 150, 255]);
        assert_eq!(sample_bilinear(&img, 1.3, 2.7), [50, 100, 150, 255]);
        assert_eq!(sample_bilinear(&img, -3.0, 9.0), [50, 100, 150, 255]);
    }

    #[test]
    fn test_draw_media_letterboxes() {
        let frame = FrameSize::new(40, 20);
        let mut surface = Surface::new(frame, Rgba::BLACK);
        // Square source in a 2:1 frame: pillarboxed to the middle 20 columns.
        let src = solid(10, 10, [255, 0, 0, 255]);
        let placement = MediaPlacement {
            window: (0.0, 0.0, 10.0, 10.0),
            dest: frame.rect().fit_inside(10.0, 10.0),
            rotation: 0.0,
            pivot: frame.rect().center(),
            flip_h: false,
            flip_v: false,
        };
        surface.draw_media(&src, &placement, 1.0);
        assert_eq!(surface.pixel(5, 10), [0, 0, 0, 255]);
        assert_eq!(surface.pixel(20, 10), [255, 0, 0, 255]);
        assert_eq!(surface.pixel(35, 10), [0, 0, 0, 255]);
    }

    #[test]
    fn test_flip_mirrors_source() {
        let frame = FrameSize::new(2, 1);
        let mut src = solid(2, 1, [255, 0, 0, 255]);
        src.put_pixel(1, 0, Px([0, 0, 255, 255]));
        let mut placement = MediaPlacement::full_frame(2, 1, frame);

        let mut plain = Surface::new(frame, Rgba::BLACK);
        plain.draw_media(&src, &placement, 1.0);
        placement.flip_h = true;
        let mut flipped = Surface::new(frame, Rgba::BLACK);
        flipped.draw_media(&src, &placement, 1.0);

        assert_eq!(plain.pixel(0, 0), flipped.pixel(1, 0));
        assert_eq!(plain.pixel(1, 0), flipped.pixel(0, 0));
    }

    #[test]
    fn test_rotation_half_turn_swaps_corners() {
        let frame = FrameSize::new(2, 2);
        let mut src = solid(2, 2, [0, 0, 0, 255]);
        src.put_pixel(0, 0, Px([255, 255, 255, 255]));
        let mut placement = MediaPlacement::full_frame(2, 2, frame);
        placement.rotation = 180.0;
        let mut surface = Surface::new(frame, Rgba::BLACK);
        surface.draw_media(&src, &placement, 1.0);
        assert!(surface.pixel(1, 1)[0] > 200);
        assert!(surface.pixel(0, 0)[0] < 50);
    }

    #[test]
    fn test_text_background_without_font() {
        let frame = FrameSize::new(200, 100);
        let mut surface = Surface::new(frame, Rgba::BLACK);
        let mut overlay = TextOverlay::new(EntityId(1), "hi", 0.0, 1.0, 0);
        overlay.font_size = 20.0;
        overlay.background_color = Some("#00ff00".into());
        surface.draw_text(&overlay, &AnimationFrame::IDENTITY, &FontBook::empty());
        assert_eq!(surface.pixel(100, 50), [0, 255, 0, 255]);
        assert_eq!(surface.pixel(5, 5), [0, 0, 0, 255]);
    }

    #[test]
    fn test_zero_opacity_text_draws_nothing() {
        let frame = FrameSize::new(50, 50);
        let mut surface = Surface::new(frame, Rgba::BLACK);
        let mut overlay = TextOverlay::new(EntityId(1), "x", 0.0, 1.0, 0);
        overlay.background_color = Some("#ffffff".into());
        let anim = AnimationFrame {
            opacity: 0.0,
            ..AnimationFrame::IDENTITY
        };
        surface.draw_text(&overlay, &anim, &FontBook::empty());
        assert_eq!(surface.pixel(25, 25), [0, 0, 0, 255]);
    }
}
