//! Colour sampling and gradient rendering

use image::DynamicImage;
use image::imageops::FilterType;
use tiny_skia::{Color, GradientStop, LinearGradient, Paint, Pixmap, Point, Rect, SpreadMode, Transform};

/// Opaque RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Grey used when no colour can be extracted
    pub const NEUTRAL: Rgb = Rgb::new(0xcc, 0xcc, 0xcc);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Add `round(2.55 * percent)` to every channel, clamped to `0..=255`
    pub fn lighten(self, percent: f32) -> Self {
        let amount = (2.55 * percent).round() as i32;
        let shift = |c: u8| (c as i32 + amount).clamp(0, 255) as u8;
        Self::new(shift(self.r), shift(self.g), shift(self.b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_css(self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    fn to_skia(self) -> Color {
        Color::from_rgba8(self.r, self.g, self.b, 255)
    }
}

/// Floor-averaged colour of `img` after shrinking it to `sample`×`sample`
pub fn dominant_color(img: &DynamicImage, sample: u32) -> Rgb {
    let sample = sample.max(1);
    let small = img.resize_exact(sample, sample, FilterType::Nearest).to_rgba8();

    let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
    let mut count = 0u64;
    for pixel in small.pixels() {
        r += pixel[0] as u64;
        g += pixel[1] as u64;
        b += pixel[2] as u64;
        count += 1;
    }

    if count == 0 {
        return Rgb::NEUTRAL;
    }
    Rgb::new((r / count) as u8, (g / count) as u8, (b / count) as u8)
}

/// Render a `size`×`size` diagonal gradient from `from` to `to` as PNG
pub fn render_gradient(from: Rgb, to: Rgb, size: u32) -> Option<Vec<u8>> {
    let mut pixmap = Pixmap::new(size, size)?;
    let extent = size as f32;

    let shader = LinearGradient::new(
        Point::from_xy(0.0, 0.0),
        Point::from_xy(extent, extent),
        vec![GradientStop::new(0.0, from.to_skia()), GradientStop::new(1.0, to.to_skia())],
        SpreadMode::Pad,
        Transform::identity(),
    )?;

    let mut paint = Paint::default();
    paint.shader = shader;
    paint.anti_alias = false;

    let rect = Rect::from_xywh(0.0, 0.0, extent, extent)?;
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);

    match pixmap.encode_png() {
        Ok(png) => Some(png),
        Err(e) => {
            tracing::warn!("gradient encode failed: {}", e);
            None
        }
    }
}
