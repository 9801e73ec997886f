//! Geometric transforms over [`Image`]: flips, rotations, resizing,
//! cropping, trimming and EXIF orientation baking.
//!
//! `flip_*` mutate in place; every `copy_*` allocates a fresh image and
//! carries the source's metadata along. Transforms that only permute pixels
//! move raw samples, so palette images stay palette images; interpolating
//! transforms resolve the palette and emit plain color buffers.

use crate::color;
use crate::image::{Image, Interpolation, Pixel, PixelFormat};

/// Mirrors the image left-to-right in place.
pub fn flip_horizontal(image: &mut Image) {
    let (width, height) = (image.width(), image.height());
    for y in 0..height {
        for x in 0..width / 2 {
            let left = image.get_pixel_raw(x, y);
            let right = image.get_pixel_raw(width - 1 - x, y);
            image.set_pixel(x, y, &right);
            image.set_pixel(width - 1 - x, y, &left);
        }
    }
}

/// Mirrors the image top-to-bottom in place.
pub fn flip_vertical(image: &mut Image) {
    let (width, height) = (image.width(), image.height());
    for y in 0..height / 2 {
        for x in 0..width {
            let top = image.get_pixel_raw(x, y);
            let bottom = image.get_pixel_raw(x, height - 1 - y);
            image.set_pixel(x, y, &bottom);
            image.set_pixel(x, height - 1 - y, &top);
        }
    }
}

/// Equivalent to flipping both ways, i.e. a 180 degree rotation in place.
pub fn flip_both(image: &mut Image) {
    flip_horizontal(image);
    flip_vertical(image);
}

fn blank_like(src: &Image, width: u32, height: u32) -> Image {
    let mut out = match src.palette() {
        Some(palette) => Image::with_palette(width, height, src.format(), palette.clone()),
        None => Image::new(width, height, src.format(), src.num_channels()),
    };
    copy_metadata(src, &mut out);
    out
}

fn copy_metadata(src: &Image, dst: &mut Image) {
    dst.exif = src.exif.clone();
    dst.icc_profile = src.icc_profile.clone();
    dst.text_data = src.text_data.clone();
}

/// Rotates by `angle` degrees clockwise into a new image.
///
/// Multiples of 90 transpose raw samples and preserve the pixel format.
/// Any other angle inverse-maps each destination pixel, samples with the
/// requested interpolation, and emits an RGBA image so the uncovered
/// corners stay transparent.
pub fn copy_rotate(src: &Image, angle: f64, interpolation: Interpolation) -> Image {
    let angle = angle.rem_euclid(360.0);
    if angle == 0.0 {
        return src.clone();
    }
    if angle == 90.0 || angle == 180.0 || angle == 270.0 {
        return copy_rotate_orthogonal(src, angle as u32);
    }

    let radians = angle.to_radians();
    let (sin, cos) = radians.sin_cos();
    let src_w = f64::from(src.width());
    let src_h = f64::from(src.height());
    let dst_w = ((src_w * cos).abs() + (src_h * sin).abs()).round().max(1.0) as u32;
    let dst_h = ((src_w * sin).abs() + (src_h * cos).abs()).round().max(1.0) as u32;

    let mut out = Image::new(dst_w, dst_h, src.format(), 4);
    copy_metadata(src, &mut out);
    let max = src.max_channel_value();

    let dst_cx = f64::from(dst_w) / 2.0;
    let dst_cy = f64::from(dst_h) / 2.0;
    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;

    for y in 0..dst_h {
        for x in 0..dst_w {
            let dx = f64::from(x) + 0.5 - dst_cx;
            let dy = f64::from(y) + 0.5 - dst_cy;
            let sx = cos * dx + sin * dy + src_cx - 0.5;
            let sy = -sin * dx + cos * dy + src_cy - 0.5;

            if sx < -0.5 || sy < -0.5 || sx > src_w - 0.5 || sy > src_h - 0.5 {
                continue;
            }
            let pixel = src.get_pixel_interpolate(sx, sy, interpolation);
            let (r, g, b, a) = expand_rgba(&pixel, max);
            out.set_pixel_rgba(x, y, r, g, b, a);
        }
    }
    out
}

fn copy_rotate_orthogonal(src: &Image, angle: u32) -> Image {
    let (w, h) = (src.width(), src.height());
    let mut out = match angle {
        180 => blank_like(src, w, h),
        _ => blank_like(src, h, w),
    };
    for y in 0..h {
        for x in 0..w {
            let pixel = src.get_pixel_raw(x, y);
            match angle {
                90 => out.set_pixel(h - 1 - y, x, &pixel),
                180 => out.set_pixel(w - 1 - x, h - 1 - y, &pixel),
                _ => out.set_pixel(y, w - 1 - x, &pixel),
            }
        }
    }
    out
}

fn expand_rgba(pixel: &Pixel, max: f64) -> (f64, f64, f64, f64) {
    match pixel.num_channels() {
        1 => (pixel.r(), pixel.r(), pixel.r(), max),
        2 => (pixel.r(), pixel.r(), pixel.r(), pixel.g()),
        3 => (pixel.r(), pixel.g(), pixel.b(), max),
        _ => (pixel.r(), pixel.g(), pixel.b(), pixel.a()),
    }
}

/// Resizes to `width x height`; a zero dimension derives from the source's
/// aspect ratio.
///
/// Nearest keeps raw samples (palette images stay indexed); linear and
/// cubic sample at pixel centers; average box-filters the projected source
/// rectangle.
pub fn copy_resize(src: &Image, width: u32, height: u32, filter: Interpolation) -> Image {
    let (width, height) = match (width, height) {
        (0, 0) => (src.width(), src.height()),
        (0, h) => {
            let w = (u64::from(src.width()) * u64::from(h) / u64::from(src.height())).max(1);
            (w as u32, h)
        }
        (w, 0) => {
            let h = (u64::from(src.height()) * u64::from(w) / u64::from(src.width())).max(1);
            (w, h as u32)
        }
        (w, h) => (w, h),
    };

    if width == src.width() && height == src.height() {
        return src.clone();
    }

    let scale_x = f64::from(src.width()) / f64::from(width);
    let scale_y = f64::from(src.height()) / f64::from(height);

    match filter {
        Interpolation::Nearest => {
            let mut out = blank_like(src, width, height);
            for y in 0..height {
                let sy = (u64::from(y) * u64::from(src.height()) / u64::from(height)) as u32;
                for x in 0..width {
                    let sx = (u64::from(x) * u64::from(src.width()) / u64::from(width)) as u32;
                    let pixel = src.get_pixel_raw(sx, sy);
                    out.set_pixel(x, y, &pixel);
                }
            }
            out
        }
        Interpolation::Average => {
            let mut out = resolved_blank(src, width, height);
            for y in 0..height {
                let y0 = (f64::from(y) * scale_y).floor() as u32;
                let y1 = ((f64::from(y + 1) * scale_y).ceil() as u32)
                    .clamp(y0 + 1, src.height());
                for x in 0..width {
                    let x0 = (f64::from(x) * scale_x).floor() as u32;
                    let x1 = ((f64::from(x + 1) * scale_x).ceil() as u32)
                        .clamp(x0 + 1, src.width());

                    let mut sums = [0.0f64; 4];
                    let mut count = 0.0;
                    for sy in y0..y1 {
                        for sx in x0..x1 {
                            let pixel = src.get_pixel(sx, sy);
                            for (c, sum) in sums.iter_mut().enumerate() {
                                *sum += pixel.channel(c);
                            }
                            count += 1.0;
                        }
                    }
                    for c in 0..out.num_channels() {
                        out.set_sample(x, y, c, sums[c as usize] / count);
                    }
                }
            }
            out
        }
        Interpolation::Linear | Interpolation::Cubic => {
            let mut out = resolved_blank(src, width, height);
            for y in 0..height {
                let fy = (f64::from(y) + 0.5) * scale_y - 0.5;
                for x in 0..width {
                    let fx = (f64::from(x) + 0.5) * scale_x - 0.5;
                    let pixel = src.get_pixel_interpolate(fx, fy, filter);
                    out.set_pixel(x, y, &pixel);
                }
            }
            out
        }
    }
}

/// A blank image with the source's palette resolved away, for transforms
/// that synthesize colors rather than move samples.
fn resolved_blank(src: &Image, width: u32, height: u32) -> Image {
    let mut out = match src.palette() {
        Some(palette) => {
            let format = if palette.max_channel_value() <= 255.0 {
                PixelFormat::Uint8
            } else {
                PixelFormat::Uint16
            };
            Image::new(width, height, format, palette.num_channels() as u8)
        }
        None => Image::new(width, height, src.format(), src.num_channels()),
    };
    copy_metadata(src, &mut out);
    out
}

/// Copies the `width x height` rectangle at `(x, y)` into a new image.
///
/// The rectangle is clipped against the source bounds.
pub fn copy_crop(src: &Image, x: u32, y: u32, width: u32, height: u32) -> Image {
    let x = x.min(src.width() - 1);
    let y = y.min(src.height() - 1);
    let width = width.min(src.width() - x).max(1);
    let height = height.min(src.height() - y).max(1);

    let mut out = blank_like(src, width, height);
    for dy in 0..height {
        for dx in 0..width {
            let pixel = src.get_pixel_raw(x + dx, y + dy);
            out.set_pixel(dx, dy, &pixel);
        }
    }
    out
}

/// Draws `src` into `dst` at `(dst_x, dst_y)`.
///
/// With `center` the position is ignored and the source is centered (and
/// clamped at zero) on the destination. With `blend` pixels are
/// alpha-composited in 0..=255 space; otherwise they overwrite.
pub fn copy_into(
    dst: &mut Image,
    src: &Image,
    dst_x: u32,
    dst_y: u32,
    blend: bool,
    center: bool,
) {
    let (dst_x, dst_y) = if center {
        (
            (dst.width().saturating_sub(src.width())) / 2,
            (dst.height().saturating_sub(src.height())) / 2,
        )
    } else {
        (dst_x, dst_y)
    };

    let src_max = src.max_channel_value();
    let dst_max = dst.max_channel_value();

    for y in 0..src.height() {
        let ty = dst_y + y;
        if ty >= dst.height() {
            break;
        }
        for x in 0..src.width() {
            let tx = dst_x + x;
            if tx >= dst.width() {
                break;
            }
            if !blend {
                let pixel = src.get_pixel(x, y);
                dst.set_pixel(tx, ty, &pixel);
                continue;
            }
            // Blend in 0..=255 space, then scale back out.
            let sp = src.get_pixel(x, y);
            let dp = dst.get_pixel(tx, ty);
            let (sr, sg, sb, sa) = expand_rgba(&sp, src_max);
            let (dr, dg, db, da) = expand_rgba(&dp, dst_max);
            let to8 = |v: f64, max: f64| if max > 0.0 { v / max * 255.0 } else { 0.0 };
            let blended = color::alpha_blend(
                [
                    to8(sr, src_max),
                    to8(sg, src_max),
                    to8(sb, src_max),
                    to8(sa, src_max),
                ],
                [
                    to8(dr, dst_max),
                    to8(dg, dst_max),
                    to8(db, dst_max),
                    to8(da, dst_max),
                ],
                255.0,
            );
            let from8 = |v: f64| v / 255.0 * dst_max;
            dst.set_pixel_rgba(
                tx,
                ty,
                from8(blended[0]),
                from8(blended[1]),
                from8(blended[2]),
                from8(blended[3]),
            );
        }
    }
}

/// Which color counts as background when trimming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrimMode {
    /// Fully transparent pixels (alpha 0). Falls back to the top-left color
    /// for images without an alpha channel.
    Transparent,
    TopLeftColor,
    BottomRightColor,
}

/// Bitmask of edges [`trim`] may move inward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrimSides(pub u8);

impl TrimSides {
    pub const TOP: TrimSides = TrimSides(1);
    pub const BOTTOM: TrimSides = TrimSides(2);
    pub const LEFT: TrimSides = TrimSides(4);
    pub const RIGHT: TrimSides = TrimSides(8);
    pub const ALL: TrimSides = TrimSides(15);

    pub fn has(self, side: TrimSides) -> bool {
        self.0 & side.0 != 0
    }
}

impl std::ops::BitOr for TrimSides {
    type Output = TrimSides;

    fn bitor(self, rhs: TrimSides) -> TrimSides {
        TrimSides(self.0 | rhs.0)
    }
}

/// Crops away the background border. Idempotent: trimming a trimmed image
/// returns it unchanged.
pub fn trim(src: &Image, mode: TrimMode, sides: TrimSides) -> Image {
    let has_alpha = matches!(src.num_channels(), 2 | 4) && !src.has_palette();
    let is_background: Box<dyn Fn(&Pixel) -> bool> = match mode {
        TrimMode::Transparent if has_alpha => {
            let alpha_channel = src.num_channels() as usize - 1;
            Box::new(move |p: &Pixel| p.channel(alpha_channel) == 0.0)
        }
        TrimMode::BottomRightColor => {
            let bg = src.get_pixel(src.width() - 1, src.height() - 1);
            Box::new(move |p: &Pixel| *p == bg)
        }
        _ => {
            let bg = src.get_pixel(0, 0);
            Box::new(move |p: &Pixel| *p == bg)
        }
    };

    let mut top = 0;
    let mut bottom = src.height();
    let mut left = 0;
    let mut right = src.width();

    let row_is_background = |y: u32| (0..src.width()).all(|x| is_background(&src.get_pixel(x, y)));
    let col_is_background =
        |x: u32| (0..src.height()).all(|y| is_background(&src.get_pixel(x, y)));

    if sides.has(TrimSides::TOP) {
        while top + 1 < bottom && row_is_background(top) {
            top += 1;
        }
    }
    if sides.has(TrimSides::BOTTOM) {
        while bottom - 1 > top && row_is_background(bottom - 1) {
            bottom -= 1;
        }
    }
    if sides.has(TrimSides::LEFT) {
        while left + 1 < right && col_is_background(left) {
            left += 1;
        }
    }
    if sides.has(TrimSides::RIGHT) {
        while right - 1 > left && col_is_background(right - 1) {
            right -= 1;
        }
    }

    copy_crop(src, left, top, right - left, bottom - top)
}

/// Applies the EXIF orientation (1..=8) as rotations and flips, then drops
/// the orientation tag. Images without one come back unchanged.
pub fn bake_orientation(src: &Image) -> Image {
    let orientation = src.exif.as_ref().and_then(|exif| exif.orientation());
    let mut out = match orientation {
        Some(2) => {
            let mut image = src.clone();
            flip_horizontal(&mut image);
            image
        }
        Some(3) => copy_rotate(src, 180.0, Interpolation::Nearest),
        Some(4) => {
            let mut image = src.clone();
            flip_vertical(&mut image);
            image
        }
        Some(5) => {
            let mut image = copy_rotate(src, 90.0, Interpolation::Nearest);
            flip_horizontal(&mut image);
            image
        }
        Some(6) => copy_rotate(src, 90.0, Interpolation::Nearest),
        Some(7) => {
            let mut image = copy_rotate(src, 270.0, Interpolation::Nearest);
            flip_horizontal(&mut image);
            image
        }
        Some(8) => copy_rotate(src, 270.0, Interpolation::Nearest),
        _ => src.clone(),
    };
    if let Some(exif) = out.exif.as_mut() {
        exif.remove_orientation();
        if exif.is_empty() {
            out.exif = None;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ExifData;

    fn gradient(width: u32, height: u32) -> Image {
        let mut image = Image::new(width, height, PixelFormat::Uint8, 1);
        image.update_pixels(|x, y, p| p.set_channel(0, f64::from(y * width + x)));
        image
    }

    #[test]
    fn double_flip_is_identity() {
        let original = gradient(5, 4);

        let mut image = original.clone();
        flip_horizontal(&mut image);
        flip_horizontal(&mut image);
        assert_eq!(image.data(), original.data());

        let mut image = original.clone();
        flip_vertical(&mut image);
        flip_vertical(&mut image);
        assert_eq!(image.data(), original.data());
    }

    #[test]
    fn orthogonal_rotation_round_trip() {
        let original = gradient(4, 3);
        let rotated = copy_rotate(&original, 90.0, Interpolation::Nearest);
        assert_eq!((rotated.width(), rotated.height()), (3, 4));
        let back = copy_rotate(&rotated, -90.0, Interpolation::Nearest);
        assert_eq!(back.data(), original.data());
    }

    #[test]
    fn rotate_90_moves_origin_to_top_right() {
        let mut image = gradient(2, 3);
        image.set_sample(0, 0, 0, 99.0);
        let rotated = copy_rotate(&image, 90.0, Interpolation::Nearest);
        assert_eq!(rotated.get_sample(2, 0, 0), 99.0);
    }

    #[test]
    fn bilinear_downscale_to_single_pixel() {
        let mut image = Image::new(2, 2, PixelFormat::Uint8, 1);
        image.set_sample(1, 1, 0, 255.0);
        let resized = copy_resize(&image, 1, 1, Interpolation::Linear);
        assert_eq!(resized.get_sample(0, 0, 0), 63.0);
    }

    #[test]
    fn resize_derives_missing_dimension() {
        let image = gradient(8, 4);
        let resized = copy_resize(&image, 4, 0, Interpolation::Nearest);
        assert_eq!((resized.width(), resized.height()), (4, 2));
    }

    #[test]
    fn average_resize_box_filters() {
        let mut image = Image::new(2, 2, PixelFormat::Uint8, 1);
        image.set_sample(0, 0, 0, 10.0);
        image.set_sample(1, 0, 0, 20.0);
        image.set_sample(0, 1, 0, 30.0);
        image.set_sample(1, 1, 0, 40.0);
        let resized = copy_resize(&image, 1, 1, Interpolation::Average);
        assert_eq!(resized.get_sample(0, 0, 0), 25.0);
    }

    #[test]
    fn crop_copies_the_rectangle() {
        let image = gradient(4, 4);
        let cropped = copy_crop(&image, 1, 2, 2, 2);
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert_eq!(cropped.get_sample(0, 0, 0), 9.0);
        assert_eq!(cropped.get_sample(1, 1, 0), 14.0);
    }

    #[test]
    fn copy_into_centers_and_blends() {
        let mut dst = Image::new(4, 4, PixelFormat::Uint8, 4);
        let mut src = Image::new(2, 2, PixelFormat::Uint8, 4);
        src.update_pixels(|_, _, p| {
            p.set_channel(0, 200.0);
            p.set_channel(3, 255.0);
        });
        copy_into(&mut dst, &src, 0, 0, false, true);
        assert_eq!(dst.get_sample(1, 1, 0), 200.0);
        assert_eq!(dst.get_sample(0, 0, 0), 0.0);
    }

    #[test]
    fn trim_is_idempotent() {
        let mut image = Image::new(6, 5, PixelFormat::Uint8, 1);
        image.set_sample(2, 2, 0, 50.0);
        image.set_sample(3, 3, 0, 60.0);

        let trimmed = trim(&image, TrimMode::TopLeftColor, TrimSides::ALL);
        assert_eq!((trimmed.width(), trimmed.height()), (2, 2));
        let again = trim(&trimmed, TrimMode::TopLeftColor, TrimSides::ALL);
        assert_eq!(again.data(), trimmed.data());
    }

    #[test]
    fn trim_respects_side_mask() {
        let mut image = Image::new(4, 4, PixelFormat::Uint8, 1);
        image.set_sample(2, 2, 0, 50.0);
        let trimmed = trim(
            &image,
            TrimMode::TopLeftColor,
            TrimSides::TOP | TrimSides::LEFT,
        );
        assert_eq!((trimmed.width(), trimmed.height()), (2, 2));
        assert_eq!(trimmed.get_sample(0, 0, 0), 50.0);
    }

    #[test]
    fn orientation_six_bakes_to_rotation() {
        let mut image = gradient(2, 3);
        image.set_sample(0, 0, 0, 77.0);
        let mut exif = ExifData::default();
        exif.set_orientation(6);
        image.exif = Some(exif);

        let baked = bake_orientation(&image);
        assert_eq!((baked.width(), baked.height()), (3, 2));
        assert_eq!(baked.get_sample(2, 0, 0), 77.0);
        assert!(baked.exif.is_none());
    }
}
