//! Procedural card textures.
//!
//! Drawing happens in a 512x700 logical space scaled by the pixel ratio.
//! Shapes are anti-aliased from their signed distance; glyphs are blitted
//! from the bitmap font.

use glam::{Vec2, Vec3, Vec4};
use image::{Rgba, RgbaImage};
use rand::Rng;
use terra_config::CardRecord;
use terra_render::{RenderError, TextureImage, parse_css_hex};

use crate::font;

pub const CARD_WIDTH: f32 = 512.0;
pub const CARD_HEIGHT: f32 = 700.0;
pub const MAX_PIXEL_RATIO: f32 = 2.0;

const CORNER_RADIUS: f32 = 40.0;
const GRADIENT_START: Vec4 = Vec4::new(20.0 / 255.0, 30.0 / 255.0, 60.0 / 255.0, 0.9);
const GRADIENT_END: Vec4 = Vec4::new(10.0 / 255.0, 15.0 / 255.0, 30.0 / 255.0, 0.95);
const BORDER: Vec4 = Vec4::new(1.0, 1.0, 1.0, 0.15);
const DOTS_PER_SIDE: usize = 40;
const DOTS_PER_CORNER: usize = 15;
const DOT_SCATTER: f32 = 4.0;
const ICON_CENTER: Vec2 = Vec2::new(256.0, 150.0);
const ICON_RADIUS: f32 = 60.0;
const SUBTITLE_Y: f32 = 280.0;
const TITLE_Y: f32 = 350.0;
const TEXT_Y: f32 = 450.0;
const TEXT_MAX_WIDTH: f32 = 400.0;
const TEXT_LINE_HEIGHT: f32 = 36.0;
const TEXT_COLOR: Vec4 = Vec4::new(0.8, 0.8, 0.8, 1.0);
const FALLBACK_ACCENT: Vec3 = Vec3::new(7.0 / 255.0, 161.0 / 255.0, 1.0);

/// Dot sizes in logical pixels per font.
const SUBTITLE_DOT: f32 = 3.0;
const SUBTITLE_SPACING: u32 = 1;
const TITLE_DOT: f32 = 5.0;
const TEXT_DOT: f32 = 3.0;

/// A straight-alpha RGBA canvas with source-over compositing.
pub struct CardCanvas {
    image: RgbaImage,
    scale: f32,
}

impl CardCanvas {
    /// A transparent canvas for the logical card size at `pixel_ratio`,
    /// clamped to `[1, MAX_PIXEL_RATIO]`.
    pub fn new(pixel_ratio: f32) -> Self {
        let scale = if pixel_ratio.is_finite() {
            pixel_ratio.clamp(1.0, MAX_PIXEL_RATIO)
        } else {
            1.0
        };
        let width = (CARD_WIDTH * scale).round() as u32;
        let height = (CARD_HEIGHT * scale).round() as u32;
        Self {
            image: RgbaImage::new(width, height),
            scale,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Blend `color` into the device pixel at `x`, `y` with `coverage`.
    fn blend(&mut self, x: i64, y: i64, color: Vec4, coverage: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.image.width()) || y >= i64::from(self.image.height())
        {
            return;
        }
        let alpha = (color.w * coverage).clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        let dst = Vec4::from_array(pixel.0.map(|c| f32::from(c) / 255.0));
        let out_a = alpha + dst.w * (1.0 - alpha);
        let rgb = if out_a > 0.0 {
            (color.truncate() * alpha + dst.truncate() * dst.w * (1.0 - alpha)) / out_a
        } else {
            Vec3::ZERO
        };
        let out = rgb.extend(out_a);
        *pixel = Rgba(out.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
    }

    /// Shade every device pixel in the logical box `min..max`. `shade` gets
    /// the logical position and returns a color and its coverage.
    fn fill_with(&mut self, min: Vec2, max: Vec2, mut shade: impl FnMut(Vec2) -> (Vec4, f32)) {
        let x0 = (min.x * self.scale).floor().max(0.0) as i64;
        let y0 = (min.y * self.scale).floor().max(0.0) as i64;
        let x1 = ((max.x * self.scale).ceil() as i64).min(i64::from(self.image.width()));
        let y1 = ((max.y * self.scale).ceil() as i64).min(i64::from(self.image.height()));
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) / self.scale;
                let (color, coverage) = shade(p);
                if coverage > 0.0 {
                    self.blend(x, y, color, coverage);
                }
            }
        }
    }

    /// Rounded rectangle filled with a linear gradient from its top-left to
    /// its bottom-right corner.
    pub fn fill_rounded_rect_gradient(
        &mut self,
        origin: Vec2,
        size: Vec2,
        radius: f32,
        start: Vec4,
        end: Vec4,
    ) {
        let scale = self.scale;
        let diagonal = size.length_squared().max(f32::EPSILON);
        self.fill_with(origin, origin + size, |p| {
            let d = rounded_rect_distance(p, origin, size, radius);
            let t = ((p - origin).dot(size) / diagonal).clamp(0.0, 1.0);
            (start.lerp(end, t), sdf_coverage(d, scale))
        });
    }

    pub fn stroke_rounded_rect(
        &mut self,
        origin: Vec2,
        size: Vec2,
        radius: f32,
        width: f32,
        color: Vec4,
    ) {
        let scale = self.scale;
        let pad = Vec2::splat(width);
        self.fill_with(origin - pad, origin + size + pad, |p| {
            let d = rounded_rect_distance(p, origin, size, radius).abs() - width * 0.5;
            (color, sdf_coverage(d, scale))
        });
    }

    pub fn fill_circle(&mut self, center: Vec2, radius: f32, color: Vec4) {
        let scale = self.scale;
        let r = Vec2::splat(radius + 1.0);
        self.fill_with(center - r, center + r, |p| {
            (color, sdf_coverage(p.distance(center) - radius, scale))
        });
    }

    pub fn stroke_circle(&mut self, center: Vec2, radius: f32, width: f32, color: Vec4) {
        let scale = self.scale;
        let r = Vec2::splat(radius + width + 1.0);
        self.fill_with(center - r, center + r, |p| {
            let d = (p.distance(center) - radius).abs() - width * 0.5;
            (color, sdf_coverage(d, scale))
        });
    }

    /// A line segment with round caps.
    pub fn stroke_segment(&mut self, a: Vec2, b: Vec2, width: f32, color: Vec4) {
        let scale = self.scale;
        let pad = Vec2::splat(width + 1.0);
        self.fill_with(a.min(b) - pad, a.max(b) + pad, |p| {
            let d = segment_distance(p, a, b) - width * 0.5;
            (color, sdf_coverage(d, scale))
        });
    }

    pub fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Vec4) {
        for pair in points.windows(2) {
            self.stroke_segment(pair[0], pair[1], width, color);
        }
    }

    pub fn stroke_rect(&mut self, origin: Vec2, size: Vec2, width: f32, color: Vec4) {
        let corners = [
            origin,
            origin + Vec2::new(size.x, 0.0),
            origin + size,
            origin + Vec2::new(0.0, size.y),
            origin,
        ];
        self.stroke_polyline(&corners, width, color);
    }

    pub fn fill_triangle(&mut self, a: Vec2, b: Vec2, c: Vec2, color: Vec4) {
        let scale = self.scale;
        let min = a.min(b).min(c) - Vec2::ONE;
        let max = a.max(b).max(c) + Vec2::ONE;
        self.fill_with(min, max, |p| {
            let outside = [(a, b), (b, c), (c, a)]
                .iter()
                .map(|&(e0, e1)| segment_distance(p, e0, e1))
                .fold(f32::MAX, f32::min);
            let d = if inside_triangle(p, a, b, c) { -outside } else { outside };
            (color, sdf_coverage(d, scale))
        });
    }

    /// One line of bitmap text centered on `center`. `dot` is the logical
    /// size of one font dot.
    pub fn draw_text(&mut self, text: &str, center: Vec2, dot: f32, spacing: u32, color: Vec4) {
        let width = font::text_width(text, spacing) as f32 * dot;
        let height = font::GLYPH_HEIGHT as f32 * dot;
        let mut x = center.x - width * 0.5;
        let y = center.y - height * 0.5;
        let step = (font::GLYPH_ADVANCE + spacing) as f32 * dot;
        for c in text.chars() {
            if let Some(bits) = font::glyph(c) {
                self.blit_glyph(bits, Vec2::new(x, y), dot, color);
            }
            x += step;
        }
    }

    fn blit_glyph(&mut self, bits: u64, origin: Vec2, dot: f32, color: Vec4) {
        let size = Vec2::new(font::GLYPH_WIDTH as f32, font::GLYPH_HEIGHT as f32) * dot;
        self.fill_with(origin, origin + size, |p| {
            let cell = (p - origin) / dot;
            let on = cell.min_element() >= 0.0 && font::dot(bits, cell.y as u32, cell.x as u32);
            (color, if on { 1.0 } else { 0.0 })
        });
    }
}

/// Coverage of a shape from its signed logical distance.
fn sdf_coverage(distance: f32, scale: f32) -> f32 {
    (0.5 - distance * scale).clamp(0.0, 1.0)
}

fn rounded_rect_distance(p: Vec2, origin: Vec2, size: Vec2, radius: f32) -> f32 {
    let half = size * 0.5;
    let radius = radius.min(half.x).min(half.y).max(0.0);
    let q = (p - origin - half).abs() - (half - Vec2::splat(radius));
    q.max(Vec2::ZERO).length() + q.x.max(q.y).min(0.0) - radius
}

fn segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

fn inside_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let edge = |e0: Vec2, e1: Vec2| (e1 - e0).perp_dot(p - e0);
    let (d0, d1, d2) = (edge(a, b), edge(b, c), edge(c, a));
    let negative = d0 < 0.0 || d1 < 0.0 || d2 < 0.0;
    let positive = d0 > 0.0 || d1 > 0.0 || d2 > 0.0;
    !(negative && positive)
}

/// Accent color of a record; malformed colors fall back to the site blue.
pub fn accent_color(record: &CardRecord) -> Vec3 {
    parse_css_hex(&record.color).unwrap_or_else(|| {
        tracing::warn!("Card {:?} has invalid color {:?}", record.title, record.color);
        FALLBACK_ACCENT
    })
}

/// Paint the full card for `record`. `rng` scatters the border stardust.
pub fn render_card(record: &CardRecord, pixel_ratio: f32, rng: &mut impl Rng) -> RgbaImage {
    let mut canvas = CardCanvas::new(pixel_ratio);
    let size = Vec2::new(CARD_WIDTH, CARD_HEIGHT);
    let accent = accent_color(record).extend(1.0);

    canvas.fill_rounded_rect_gradient(Vec2::ZERO, size, CORNER_RADIUS, GRADIENT_START, GRADIENT_END);
    draw_star_border(&mut canvas, size, rng);
    draw_icon(&mut canvas, &record.icon, accent);

    canvas.draw_text(
        &record.subtitle,
        Vec2::new(CARD_WIDTH * 0.5, SUBTITLE_Y),
        SUBTITLE_DOT,
        SUBTITLE_SPACING,
        accent,
    );
    canvas.draw_text(
        &record.title,
        Vec2::new(CARD_WIDTH * 0.5, TITLE_Y),
        TITLE_DOT,
        0,
        Vec4::ONE,
    );
    let max_dots = (TEXT_MAX_WIDTH / TEXT_DOT) as u32;
    for (i, line) in font::wrap(&record.text, max_dots).iter().enumerate() {
        let y = TEXT_Y + i as f32 * TEXT_LINE_HEIGHT;
        canvas.draw_text(line, Vec2::new(CARD_WIDTH * 0.5, y), TEXT_DOT, 0, TEXT_COLOR);
    }

    canvas.into_image()
}

/// [`render_card`] as an uploadable texture.
pub fn card_texture(
    record: &CardRecord,
    pixel_ratio: f32,
    rng: &mut impl Rng,
) -> Result<TextureImage, RenderError> {
    let image = render_card(record, pixel_ratio, rng);
    let (width, height) = image.dimensions();
    TextureImage::new(width, height, image.into_raw())
}

fn draw_star_border(canvas: &mut CardCanvas, size: Vec2, rng: &mut impl Rng) {
    canvas.stroke_rounded_rect(Vec2::ZERO, size, CORNER_RADIUS, 1.0, BORDER);

    let r = CORNER_RADIUS;
    let mut sample = || rng.random::<f32>();
    let mut dots = Vec::with_capacity(DOTS_PER_SIDE * 4 + DOTS_PER_CORNER * 4);
    for edge in 0..4 {
        for _ in 0..DOTS_PER_SIDE {
            let jitter = (sample() - 0.5) * DOT_SCATTER;
            let dot = match edge {
                0 => Vec2::new(r + sample() * (size.x - 2.0 * r), jitter),
                1 => Vec2::new(r + sample() * (size.x - 2.0 * r), size.y + jitter),
                2 => Vec2::new(jitter, r + sample() * (size.y - 2.0 * r)),
                _ => Vec2::new(size.x + jitter, r + sample() * (size.y - 2.0 * r)),
            };
            dots.push(dot);
        }
    }
    let inset = r * 0.3;
    for _ in 0..DOTS_PER_CORNER {
        dots.push(Vec2::new(inset, inset));
        dots.push(Vec2::new(size.x - inset, inset));
        dots.push(Vec2::new(inset, size.y - inset));
        dots.push(Vec2::new(size.x - inset, size.y - inset));
    }

    for center in dots {
        let radius = sample() * 2.0 + 0.5;
        let tint = if sample() > 0.8 { Vec3::new(0.0, 1.0, 1.0) } else { Vec3::ONE };
        let alpha = sample() * 0.8 + 0.2;
        canvas.fill_circle(center, radius, tint.extend(alpha));
    }
}

fn draw_icon(canvas: &mut CardCanvas, icon: &str, accent: Vec4) {
    let c = ICON_CENTER;
    canvas.fill_circle(c, ICON_RADIUS, Vec4::new(7.0 / 255.0, 161.0 / 255.0, 1.0, 0.1));
    canvas.stroke_circle(c, ICON_RADIUS, 2.0, accent);

    let at = |x: f32, y: f32| c + Vec2::new(x, y);
    let line = 3.0;
    let white = Vec4::ONE;
    match icon {
        "about" => {
            canvas.stroke_rect(at(-22.0, -18.0), Vec2::new(44.0, 32.0), line, white);
            canvas.stroke_segment(at(0.0, 14.0), at(0.0, 22.0), line, white);
            canvas.stroke_segment(at(-10.0, 22.0), at(10.0, 22.0), line, white);
            canvas.stroke_segment(at(-10.0, -5.0), at(-4.0, -5.0), line, white);
            canvas.stroke_segment(at(-10.0, 2.0), at(0.0, 2.0), line, white);
        }
        "projects" => {
            let mut body = quadratic(at(0.0, -25.0), at(12.0, -8.0), at(12.0, 12.0));
            body.extend([at(20.0, 20.0), at(-20.0, 20.0), at(-12.0, 12.0)]);
            body.extend(quadratic(at(-12.0, 12.0), at(-12.0, -8.0), at(0.0, -25.0)));
            canvas.stroke_polyline(&body, line, white);
            canvas.stroke_circle(at(0.0, -5.0), 6.0, line, white);
            canvas.fill_triangle(at(-6.0, 22.0), at(0.0, 32.0), at(6.0, 22.0), accent);
        }
        "photos" => {
            canvas.stroke_rect(at(-24.0, -16.0), Vec2::new(48.0, 32.0), line, white);
            canvas.stroke_rect(at(-8.0, -22.0), Vec2::new(16.0, 6.0), line, white);
            canvas.stroke_circle(c, 10.0, line, white);
            canvas.stroke_segment(at(18.0, -16.0), at(18.0, -20.0), line, white);
        }
        "videos" => {
            canvas.stroke_rect(at(-26.0, -18.0), Vec2::new(52.0, 36.0), line, white);
            canvas.fill_triangle(at(-7.0, -10.0), at(-7.0, 10.0), at(11.0, 0.0), accent);
        }
        "blog" => {
            canvas.stroke_rect(at(-18.0, -24.0), Vec2::new(36.0, 48.0), line, white);
            for y in [-12.0, -2.0, 8.0] {
                canvas.stroke_segment(at(-10.0, y), at(10.0, y), line, white);
            }
        }
        other => {
            tracing::debug!("No icon named {other:?}, drawing a dot");
            canvas.fill_circle(c, 8.0, white);
        }
    }
}

/// Quadratic Bezier from `p0` to `p2` sampled into a polyline.
fn quadratic(p0: Vec2, p1: Vec2, p2: Vec2) -> Vec<Vec2> {
    const STEPS: usize = 12;
    (0..=STEPS)
        .map(|i| {
            let t = i as f32 / STEPS as f32;
            let u = 1.0 - t;
            p0 * (u * u) + p1 * (2.0 * u * t) + p2 * (t * t)
        })
        .collect()
}
