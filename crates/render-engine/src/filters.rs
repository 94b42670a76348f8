//! Color filter chain.
//!
//! Filters are applied in a fixed canonical order regardless of the order they
//! are stored in: brightness, contrast, saturation, hue-rotate, blur,
//! grayscale, sepia. Color adjustments use the CSS filter-effects matrices;
//! blur is a Gaussian with the filter value as sigma in source pixels.
//! Every step is a pure function of its input pixels.

use image::RgbaImage;
use imageproc::filter::gaussian_blur_f32;
use montage_project_model::{Filter, FilterKind};

/// A 3x4 color matrix: three rows of `[r, g, b, offset]` on 0..1 channels.
type ColorMatrix = [[f32; 4]; 3];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Matrix(ColorMatrix),
    Blur(f32),
}

/// An ordered, ready-to-apply list of filter stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterChain {
    stages: Vec<Stage>,
}

impl FilterChain {
    /// Canonicalize `filters`: sort by canonical rank (stable for repeated
    /// kinds), drop unknown kinds and identity values.
    pub fn new(filters: &[Filter]) -> Self {
        let mut ranked: Vec<(u8, &Filter)> = filters
            .iter()
            .filter(|f| !f.is_identity() && f.value.is_finite())
            .filter_map(|f| f.kind.canonical_rank().map(|rank| (rank, f)))
            .collect();
        ranked.sort_by_key(|(rank, _)| *rank);

        let stages = ranked
            .into_iter()
            .filter_map(|(_, f)| stage_for(f))
            .collect();
        Self { stages }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Apply every stage in order.
    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let mut out = image.clone();
        for stage in &self.stages {
            match stage {
                Stage::Matrix(m) => apply_matrix(&mut out, m),
                Stage::Blur(sigma) => out = gaussian_blur_f32(&out, *sigma),
            }
        }
        out
    }
}

fn stage_for(filter: &Filter) -> Option<Stage> {
    let v = filter.value as f32;
    let stage = match filter.kind {
        FilterKind::Brightness => Stage::Matrix(brightness(v / 100.0)),
        FilterKind::Contrast => Stage::Matrix(contrast(v / 100.0)),
        FilterKind::Saturation => Stage::Matrix(saturate(v / 100.0)),
        FilterKind::HueRotate => Stage::Matrix(hue_rotate(v)),
        FilterKind::Blur if v > 0.0 => Stage::Blur(v),
        FilterKind::Blur => return None,
        FilterKind::Grayscale => Stage::Matrix(grayscale((v / 100.0).clamp(0.0, 1.0))),
        FilterKind::Sepia => Stage::Matrix(sepia((v / 100.0).clamp(0.0, 1.0))),
        FilterKind::Unknown => return None,
    };
    Some(stage)
}

fn brightness(b: f32) -> ColorMatrix {
    let b = b.max(0.0);
    [[b, 0.0, 0.0, 0.0], [0.0, b, 0.0, 0.0], [0.0, 0.0, b, 0.0]]
}

fn contrast(c: f32) -> ColorMatrix {
    let c = c.max(0.0);
    let o = 0.5 - 0.5 * c;
    [[c, 0.0, 0.0, o], [0.0, c, 0.0, o], [0.0, 0.0, c, o]]
}

fn saturate(s: f32) -> ColorMatrix {
    let s = s.max(0.0);
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s, 0.0],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s, 0.0],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s, 0.0],
    ]
}

fn hue_rotate(degrees: f32) -> ColorMatrix {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
            0.0,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
            0.0,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
            0.0,
        ],
    ]
}

fn grayscale(amount: f32) -> ColorMatrix {
    let k = 1.0 - amount;
    [
        [0.2126 + 0.7874 * k, 0.7152 - 0.7152 * k, 0.0722 - 0.0722 * k, 0.0],
        [0.2126 - 0.2126 * k, 0.7152 + 0.2848 * k, 0.0722 - 0.0722 * k, 0.0],
        [0.2126 - 0.2126 * k, 0.7152 - 0.7152 * k, 0.0722 + 0.9278 * k, 0.0],
    ]
}

fn sepia(amount: f32) -> ColorMatrix {
    let k = 1.0 - amount;
    [
        [0.393 + 0.607 * k, 0.769 - 0.769 * k, 0.189 - 0.189 * k, 0.0],
        [0.349 - 0.349 * k, 0.686 + 0.314 * k, 0.168 - 0.168 * k, 0.0],
        [0.272 - 0.272 * k, 0.534 - 0.534 * k, 0.131 + 0.869 * k, 0.0],
    ]
}

fn apply_matrix(image: &mut RgbaImage, m: &ColorMatrix) {
    for px in image.pixels_mut() {
        let r = px.0[0] as f32 / 255.0;
        let g = px.0[1] as f32 / 255.0;
        let b = px.0[2] as f32 / 255.0;
        for (c, row) in m.iter().enumerate() {
            let v = row[0] * r + row[1] * g + row[2] * b + row[3];
            px.0[c] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn swatch() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| {
            Rgba([(x * 30) as u8, (y * 30) as u8, ((x + y) * 15) as u8, 255])
        })
    }

    #[test]
    fn test_blur_spreads_a_point() {
        let mut img = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 0, 255]));
        img.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let out = FilterChain::new(&[Filter::new(FilterKind::Blur, 1.5)]).apply(&img);
        assert!(out.get_pixel(4, 4)[0] < 255);
        assert!(out.get_pixel(5, 4)[0] > 0);
        assert_eq!(out.get_pixel(5, 4)[0], out.get_pixel(4, 5)[0]);
        assert_eq!(out.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_identity_filters_are_dropped() {
        let chain = FilterChain::new(&[
            Filter::new(FilterKind::Brightness, 100.0),
            Filter::new(FilterKind::Blur, 0.0),
            Filter::new(FilterKind::Unknown, 40.0),
        ]);
        assert!(chain.is_empty());
        assert_eq!(chain.apply(&swatch()), swatch());
    }

    #[test]
    fn test_storage_order_does_not_matter() {
        let a = FilterChain::new(&[
            Filter::new(FilterKind::Sepia, 60.0),
            Filter::new(FilterKind::Brightness, 140.0),
            Filter::new(FilterKind::Contrast, 80.0),
        ]);
        let b = FilterChain::new(&[
            Filter::new(FilterKind::Contrast, 80.0),
            Filter::new(FilterKind::Brightness, 140.0),
            Filter::new(FilterKind::Sepia, 60.0),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.apply(&swatch()), b.apply(&swatch()));
    }

    #[test]
    fn test_grayscale_equalizes_channels() {
        let chain = FilterChain::new(&[Filter::new(FilterKind::Grayscale, 100.0)]);
        let out = chain.apply(&swatch());
        for px in out.pixels() {
            let [r, g, b, a] = px.0;
            assert!(r.abs_diff(g) <= 1 && g.abs_diff(b) <= 1);
            assert_eq!(a, 255);
        }
    }

    #[test]
    fn test_brightness_scales() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([100, 50, 200, 255]));
        let out = FilterChain::new(&[Filter::new(FilterKind::Brightness, 50.0)]).apply(&img);
        assert_eq!(out.get_pixel(0, 0).0, [50, 25, 100, 255]);
    }

    #[test]
    fn test_full_hue_turn_is_near_identity() {
        let img = swatch();
        let out = FilterChain::new(&[Filter::new(FilterKind::HueRotate, 360.0)]).apply(&img);
        for (a, b) in img.pixels().zip(out.pixels()) {
            for c in 0..3 {
                assert!(a.0[c].abs_diff(b.0[c]) <= 1);
            }
        }
    }
}
