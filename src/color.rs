//! Pure color arithmetic: luminance, alpha blending and colorspace
//! conversions. All functions take and return plain `f64` channels.
//!
//! RGB channels are in 0..=255 unless stated otherwise; hue, saturation and
//! lightness/value are normalized to 0..=1.

/// Rec. 601 luma, rounded to the nearest integer.
pub fn luminance(r: f64, g: f64, b: f64) -> f64 {
    (0.299 * r + 0.587 * g + 0.114 * b).round()
}

/// Blends `src` over `dst` with an extra `opacity` factor, all in 0..=255.
///
/// Channels are `[r, g, b, a]`. The blend weight is
/// `(src_a / 255) * (opacity / 255)`; each output channel (alpha included)
/// is `round(src_c * a) + round(dst_c * (1 - a))`.
pub fn alpha_blend(src: [f64; 4], dst: [f64; 4], opacity: f64) -> [f64; 4] {
    if src[3] == 255.0 && opacity == 255.0 {
        return src;
    }
    if src[3] == 0.0 && opacity == 255.0 {
        return dst;
    }
    let a = (src[3] / 255.0) * (opacity / 255.0);
    let mut out = [0.0; 4];
    for (i, channel) in out.iter_mut().enumerate() {
        *channel = (src[i] * a).round() + (dst[i] * (1.0 - a)).round();
    }
    out
}

/// HSL (all 0..=1) to RGB 0..=255.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        let v = (l * 255.0).round();
        return (v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);
    ((r * 255.0).round(), (g * 255.0).round(), (b * 255.0).round())
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = if t < 0.0 {
        t + 1.0
    } else if t > 1.0 {
        t - 1.0
    } else {
        t
    };
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// RGB 0..=255 to HSL, all 0..=1.
pub fn rgb_to_hsl(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let r = r / 255.0;
    let g = g / 255.0;
    let b = b / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    } / 6.0;

    (h, s, l)
}

/// HSV (all 0..=1) to RGB 0..=255.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let value = (v * 255.0).round();
    if s == 0.0 {
        return (value, value, value);
    }

    let h = (h - h.floor()) * 6.0;
    let f = h - h.floor();
    let p = (v * (1.0 - s) * 255.0).round();
    let q = (v * (1.0 - s * f) * 255.0).round();
    let t = (v * (1.0 - s * (1.0 - f)) * 255.0).round();

    match h as u32 {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    }
}

/// CMYK 0..=255 to RGB 0..=255.
pub fn cmyk_to_rgb(c: f64, m: f64, y: f64, k: f64) -> (f64, f64, f64) {
    let c = c / 255.0;
    let m = m / 255.0;
    let y = y / 255.0;
    let k = k / 255.0;
    (
        (255.0 * (1.0 - c) * (1.0 - k)).round(),
        (255.0 * (1.0 - m) * (1.0 - k)).round(),
        (255.0 * (1.0 - y) * (1.0 - k)).round(),
    )
}

/// sRGB 0..=255 to CIE XYZ (D65), X/Y/Z scaled to 0..=100.
pub fn rgb_to_xyz(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    fn linearize(c: f64) -> f64 {
        let c = c / 255.0;
        if c > 0.04045 {
            ((c + 0.055) / 1.055).powf(2.4)
        } else {
            c / 12.92
        }
    }
    let r = linearize(r) * 100.0;
    let g = linearize(g) * 100.0;
    let b = linearize(b) * 100.0;
    (
        r * 0.4124 + g * 0.3576 + b * 0.1805,
        r * 0.2126 + g * 0.7152 + b * 0.0722,
        r * 0.0193 + g * 0.1192 + b * 0.9505,
    )
}

/// CIE XYZ (D65, 0..=100) back to sRGB 0..=255.
pub fn xyz_to_rgb(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    fn delinearize(c: f64) -> f64 {
        let c = if c > 0.0031308 {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        } else {
            c * 12.92
        };
        (c * 255.0).clamp(0.0, 255.0).round()
    }
    let x = x / 100.0;
    let y = y / 100.0;
    let z = z / 100.0;
    (
        delinearize(x * 3.2406 + y * -1.5372 + z * -0.4986),
        delinearize(x * -0.9689 + y * 1.8758 + z * 0.0415),
        delinearize(x * 0.0557 + y * -0.2040 + z * 1.0570),
    )
}

/// Reference white used by the Lab conversions (D65).
const LAB_REF_WHITE: (f64, f64, f64) = (95.047, 100.0, 108.883);

/// CIE XYZ (0..=100) to CIE L*a*b*.
pub fn xyz_to_lab(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    fn f(t: f64) -> f64 {
        if t > 0.008856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    }
    let fx = f(x / LAB_REF_WHITE.0);
    let fy = f(y / LAB_REF_WHITE.1);
    let fz = f(z / LAB_REF_WHITE.2);
    (116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

/// CIE L*a*b* to CIE XYZ (0..=100).
pub fn lab_to_xyz(l: f64, a: f64, b: f64) -> (f64, f64, f64) {
    fn f_inv(t: f64) -> f64 {
        let cubed = t * t * t;
        if cubed > 0.008856 {
            cubed
        } else {
            (t - 16.0 / 116.0) / 7.787
        }
    }
    let fy = (l + 16.0) / 116.0;
    let fx = a / 500.0 + fy;
    let fz = fy - b / 200.0;
    (
        f_inv(fx) * LAB_REF_WHITE.0,
        f_inv(fy) * LAB_REF_WHITE.1,
        f_inv(fz) * LAB_REF_WHITE.2,
    )
}

/// sRGB 0..=255 to L*a*b*.
pub fn rgb_to_lab(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let (x, y, z) = rgb_to_xyz(r, g, b);
    xyz_to_lab(x, y, z)
}

/// L*a*b* to sRGB 0..=255.
pub fn lab_to_rgb(l: f64, a: f64, b: f64) -> (f64, f64, f64) {
    let (x, y, z) = lab_to_xyz(l, a, b);
    xyz_to_rgb(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_of_primaries() {
        assert_eq!(luminance(255.0, 0.0, 0.0), 76.0);
        assert_eq!(luminance(0.0, 255.0, 0.0), 150.0);
        assert_eq!(luminance(0.0, 0.0, 255.0), 29.0);
        assert_eq!(luminance(255.0, 255.0, 255.0), 255.0);
    }

    #[test]
    fn blend_short_circuits() {
        let src = [10.0, 20.0, 30.0, 255.0];
        let dst = [1.0, 2.0, 3.0, 255.0];
        assert_eq!(alpha_blend(src, dst, 255.0), src);

        let clear = [10.0, 20.0, 30.0, 0.0];
        assert_eq!(alpha_blend(clear, dst, 255.0), dst);
    }

    #[test]
    fn blend_mixes_half_alpha() {
        let src = [200.0, 0.0, 0.0, 128.0];
        let dst = [0.0, 100.0, 0.0, 255.0];
        let out = alpha_blend(src, dst, 255.0);
        let a: f64 = 128.0 / 255.0;
        assert_eq!(out[0], (200.0 * a).round());
        assert_eq!(out[1], (100.0 * (1.0 - a)).round());
        assert_eq!(out[3], (128.0 * a).round() + (255.0 * (1.0 - a)).round());
    }

    #[test]
    fn hsl_round_trip_within_one() {
        for (r, g, b) in [
            (0.0, 0.0, 0.0),
            (255.0, 255.0, 255.0),
            (255.0, 0.0, 0.0),
            (12.0, 200.0, 97.0),
            (128.0, 128.0, 127.0),
            (1.0, 2.0, 3.0),
        ] {
            let (h, s, l) = rgb_to_hsl(r, g, b);
            let (r2, g2, b2) = hsl_to_rgb(h, s, l);
            assert!((r - r2).abs() <= 1.0, "{r} -> {r2}");
            assert!((g - g2).abs() <= 1.0, "{g} -> {g2}");
            assert!((b - b2).abs() <= 1.0, "{b} -> {b2}");
        }
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), (255.0, 0.0, 0.0));
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), (0.0, 255.0, 0.0));
        assert_eq!(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), (0.0, 0.0, 255.0));
    }

    #[test]
    fn cmyk_black_and_paper_white() {
        assert_eq!(cmyk_to_rgb(0.0, 0.0, 0.0, 255.0), (0.0, 0.0, 0.0));
        assert_eq!(cmyk_to_rgb(0.0, 0.0, 0.0, 0.0), (255.0, 255.0, 255.0));
        assert_eq!(cmyk_to_rgb(255.0, 0.0, 0.0, 0.0), (0.0, 255.0, 255.0));
    }

    #[test]
    fn xyz_of_white_is_reference_white() {
        let (x, y, z) = rgb_to_xyz(255.0, 255.0, 255.0);
        assert!((x - 95.047).abs() < 0.1);
        assert!((y - 100.0).abs() < 0.1);
        assert!((z - 108.883).abs() < 0.2);
    }

    #[test]
    fn lab_round_trip_within_one() {
        for (r, g, b) in [(255.0, 0.0, 0.0), (40.0, 90.0, 200.0), (17.0, 17.0, 17.0)] {
            let (l, a, bb) = rgb_to_lab(r, g, b);
            let (r2, g2, b2) = lab_to_rgb(l, a, bb);
            assert!((r - r2).abs() <= 1.0);
            assert!((g - g2).abs() <= 1.0);
            assert!((b - b2).abs() <= 1.0);
        }
    }
}
