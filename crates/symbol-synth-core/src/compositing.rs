use image::{GrayImage, Rgba, RgbaImage};

use crate::model::Rect;

/// Blend `src` into `canvas` at destination (dx, dy) using a per-pixel mask.
///
/// - mask: when `Some`, its luma is the blend weight; otherwise the alpha
///   channel of `src` is used
/// - every channel (alpha included) is interpolated as
///   `dst + (src - dst) * m / 255`, so opaque mask pixels replace the
///   destination and transparent ones leave it untouched
/// - pixels falling outside the canvas are clipped
pub fn overlay_masked(
    src: &RgbaImage,
    mask: Option<&GrayImage>,
    canvas: &mut RgbaImage,
    dx: u32,
    dy: u32,
) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    for yy in 0..sh {
        if dy + yy >= ch {
            break;
        }
        for xx in 0..sw {
            if dx + xx >= cw {
                break;
            }
            let s = src.get_pixel(xx, yy);
            let m = match mask {
                Some(mk) if xx < mk.width() && yy < mk.height() => mk.get_pixel(xx, yy)[0],
                Some(_) => 0,
                None => s[3],
            };
            if m == 0 {
                continue;
            }
            let d = canvas.get_pixel_mut(dx + xx, dy + yy);
            if m == 255 {
                *d = *s;
                continue;
            }
            for c in 0..4 {
                d[c] = blend_channel(s[c], d[c], m);
            }
        }
    }
}

fn blend_channel(src: u8, dst: u8, weight: u8) -> u8 {
    let w = weight as u32;
    ((src as u32 * w + dst as u32 * (255 - w) + 127) / 255) as u8
}

/// Composite `src` (through `mask` when given) over an opaque solid `color`
/// backing of the same size.
pub fn matte(src: &RgbaImage, mask: Option<&GrayImage>, color: [u8; 3]) -> RgbaImage {
    let (w, h) = src.dimensions();
    let mut out = RgbaImage::from_pixel(w, h, Rgba([color[0], color[1], color[2], 255]));
    overlay_masked(src, mask, &mut out, 0, 0);
    out
}

/// Draw a 1px outline around `rect` (debug aid for checking boxes visually).
pub fn outline_rect(canvas: &mut RgbaImage, rect: &Rect, color: Rgba<u8>) {
    let (cw, ch) = canvas.dimensions();
    if rect.w == 0 || rect.h == 0 {
        return;
    }
    let right = rect.x + rect.w - 1;
    let bottom = rect.y + rect.h - 1;
    for xx in rect.x..=right {
        if xx >= cw {
            break;
        }
        if rect.y < ch {
            canvas.put_pixel(xx, rect.y, color);
        }
        if bottom < ch {
            canvas.put_pixel(xx, bottom, color);
        }
    }
    for yy in rect.y..=bottom {
        if yy >= ch {
            break;
        }
        if rect.x < cw {
            canvas.put_pixel(rect.x, yy, color);
        }
        if right < cw {
            canvas.put_pixel(right, yy, color);
        }
    }
}
