//! Color helpers. Colors are carried as sRGB-encoded `Vec3` in `[0, 1]` and
//! linearized by the GPU backend on upload.

use glam::Vec3;

/// Decode `0xRRGGBB`.
pub fn rgb_from_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

/// Parse `#rrggbb` or `#rgb`.
pub fn parse_css_hex(s: &str) -> Option<Vec3> {
    let digits = s.strip_prefix('#')?;
    match digits.len() {
        6 => u32::from_str_radix(digits, 16).ok().map(rgb_from_hex),
        3 => {
            let short = u32::from_str_radix(digits, 16).ok()?;
            let (r, g, b) = ((short >> 8) & 0xf, (short >> 4) & 0xf, short & 0xf);
            Some(rgb_from_hex((r * 17) << 16 | (g * 17) << 8 | (b * 17)))
        }
        _ => None,
    }
}

/// HSL to RGB. Hue wraps into `[0, 1)`; saturation and lightness are clamped.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Vec3 {
    let h = h.rem_euclid(1.0);
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    if s == 0.0 {
        return Vec3::splat(l);
    }
    let p = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let q = 2.0 * l - p;
    Vec3::new(
        hue_to_channel(q, p, h + 1.0 / 3.0),
        hue_to_channel(q, p, h),
        hue_to_channel(q, p, h - 1.0 / 3.0),
    )
}

fn hue_to_channel(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * 6.0 * (2.0 / 3.0 - t)
    } else {
        p
    }
}

/// sRGB transfer function inverse for one channel.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linearize all three channels.
pub(crate) fn linear(c: Vec3) -> Vec3 {
    Vec3::new(srgb_to_linear(c.x), srgb_to_linear(c.y), srgb_to_linear(c.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-4
    }

    #[test]
    fn test_hex_decoding() {
        assert!(close(rgb_from_hex(0xff8000), Vec3::new(1.0, 128.0 / 255.0, 0.0)));
        assert_eq!(parse_css_hex("#07a1ff"), Some(rgb_from_hex(0x07a1ff)));
        assert_eq!(parse_css_hex("#fff"), Some(Vec3::ONE));
        assert_eq!(parse_css_hex("07a1ff"), None);
        assert_eq!(parse_css_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_hsl_primaries() {
        assert!(close(hsl_to_rgb(0.0, 1.0, 0.5), Vec3::new(1.0, 0.0, 0.0)));
        assert!(close(hsl_to_rgb(1.0 / 3.0, 1.0, 0.5), Vec3::new(0.0, 1.0, 0.0)));
        assert!(close(hsl_to_rgb(2.0 / 3.0, 1.0, 0.5), Vec3::new(0.0, 0.0, 1.0)));
        assert!(close(hsl_to_rgb(0.3, 0.0, 0.25), Vec3::splat(0.25)));
    }

    #[test]
    fn test_hsl_hue_wraps() {
        assert!(close(hsl_to_rgb(1.25, 0.8, 0.6), hsl_to_rgb(0.25, 0.8, 0.6)));
        assert!(close(hsl_to_rgb(-0.75, 0.8, 0.6), hsl_to_rgb(0.25, 0.8, 0.6)));
    }

    #[test]
    fn test_star_palette_is_bright_cyan() {
        // Hues 0.5..0.6 at high lightness land in pale cyan/blue.
        let c = hsl_to_rgb(0.55, 0.8, 0.9);
        assert!(c.min_element() > 0.7);
        assert!(c.z >= c.x);
    }

    #[test]
    fn test_srgb_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert!(srgb_to_linear(0.5) < 0.5);
    }
}
